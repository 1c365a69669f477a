//! Error types for elevation acquisition.

use thiserror::Error;

/// Errors produced while fetching or validating an elevation grid.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("elevation request timed out after {0} s")]
    Timeout(u64),

    #[error("export service returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("export service error: {0}")]
    Service(String),

    #[error("invalid DEM URL: {0}")]
    InvalidUrl(String),

    #[error("cannot read local DEM: {0}")]
    Io(#[from] std::io::Error),

    #[error("elevation payload is empty")]
    EmptyPayload,

    #[error("malformed elevation raster: {0}")]
    MalformedRaster(String),

    #[error("elevation raster contains only no-data")]
    AllNoData,

    #[error("elevation raster does not cover the requested extent: {0}")]
    ExtentNotCovered(String),

    #[error("elevation raster CRS {found} does not match the working CRS {expected}")]
    CrsMismatch { expected: String, found: String },

    #[error("unsupported working CRS: {0}")]
    UnsupportedCrs(String),

    #[error("core error: {0}")]
    Core(#[from] wetland_core::Error),

    #[error("elevation worker failed: {0}")]
    Worker(String),
}

impl CloudError {
    /// True when the failure happened before a payload was obtained
    /// (network, timeout, non-success status, service error, unreadable source).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::Status { .. } | Self::Service(_) | Self::Io(_)
        )
    }

    /// True when the caller supplied something unusable: a bad URL, CRS
    /// choice or acquisition parameter.
    pub fn is_input_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_)
                | Self::UnsupportedCrs(_)
                | Self::Core(wetland_core::Error::InvalidParameter { .. })
                | Self::Core(wetland_core::Error::InvalidGeometry(_))
        )
    }
}

/// Result alias for acquisition operations.
pub type Result<T> = std::result::Result<T, CloudError>;
