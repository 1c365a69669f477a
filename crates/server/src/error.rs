//! Job failure taxonomy

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Class of a failed request or job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// Malformed polygon, parameters or DEM reference; rejected before any I/O
    InputError,
    /// Network failure, timeout or non-success response from the DEM source
    DemFetchError,
    /// Empty, malformed, misaligned or all-no-data elevation payload
    DemInvalidError,
    /// No outlet, empty catchment or degenerate terrain
    ComputationError,
    /// Raster, report or summary could not be persisted
    ArtifactError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputError => "InputError",
            Self::DemFetchError => "DemFetchError",
            Self::DemInvalidError => "DemInvalidError",
            Self::ComputationError => "ComputationError",
            Self::ArtifactError => "ArtifactError",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::InputError => "invalid input",
            Self::DemFetchError => "elevation fetch failed",
            Self::DemInvalidError => "elevation data is unusable",
            Self::ComputationError => "terrain computation failed",
            Self::ArtifactError => "could not persist job artifacts",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure, as recorded on the job and returned to the caller
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{}: {message}", .kind.label())]
pub struct JobError {
    pub kind: FailureKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InputError, message)
    }
}
