//! Durable per-job outputs
//!
//! Each completed job owns `{output_dir}/{job_id}/` holding the benefit
//! raster, the report and a JSON summary. Files are written to a hidden
//! staging directory first and renamed into place, so a job that fails
//! while persisting leaves nothing behind.

use crate::report::ReportRenderer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;
use wetland_algorithms::benefit::BENEFIT_NODATA;
use wetland_algorithms::erosion::ScenarioParameters;
use wetland_algorithms::{BenefitSummary, TerrainSummary};
use wetland_core::io::{write_geotiff, GeoTiffOptions};
use wetland_core::Raster;

pub const RASTER_FILE: &str = "benefits.tif";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode benefit raster: {0}")]
    Raster(#[from] wetland_core::Error),

    #[error("cannot serialise job summary: {0}")]
    Summary(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Contents of `summary.json`
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub job_id: Uuid,
    pub wetland_name: String,
    pub user_name: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub terrain: TerrainSummary,
    pub inputs: ScenarioParameters,
    pub results: BenefitSummary,
}

/// Locations of a completed job's artifacts
#[derive(Debug, Clone, PartialEq)]
pub struct JobArtifacts {
    pub raster: PathBuf,
    pub report: PathBuf,
    pub summary: PathBuf,
    pub report_content_type: &'static str,
}

/// Filesystem artifact store rooted at the output directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, id: Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Write raster, summary and report for `id`.
    ///
    /// Either every artifact is in place or none is.
    pub fn persist(
        &self,
        id: Uuid,
        raster: &Raster<f64>,
        record: &SummaryRecord,
        renderer: &dyn ReportRenderer,
    ) -> Result<JobArtifacts, ArtifactError> {
        let staging = self.root.join(format!(".{id}.partial"));
        let target = self.job_dir(id);

        let written = write_all(&staging, raster, record, renderer)
            .and_then(|()| fs::rename(&staging, &target).map_err(io_err(&target)));
        if let Err(e) = written {
            // Best effort; the staging name is never served
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        Ok(JobArtifacts {
            raster: target.join(RASTER_FILE),
            report: target.join(renderer.file_name()),
            summary: target.join(SUMMARY_FILE),
            report_content_type: renderer.content_type(),
        })
    }
}

fn write_all(
    dir: &Path,
    raster: &Raster<f64>,
    record: &SummaryRecord,
    renderer: &dyn ReportRenderer,
) -> Result<(), ArtifactError> {
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    write_geotiff(
        raster,
        dir.join(RASTER_FILE),
        Some(GeoTiffOptions {
            nodata: Some(BENEFIT_NODATA),
        }),
    )?;

    let summary_path = dir.join(SUMMARY_FILE);
    let json = serde_json::to_vec_pretty(record)?;
    fs::write(&summary_path, json).map_err(io_err(&summary_path))?;

    let report_path = dir.join(renderer.file_name());
    fs::write(&report_path, renderer.render(record)).map_err(io_err(&report_path))?;

    Ok(())
}
