//! # Wetland Server
//!
//! HTTP API, job lifecycle and artifact persistence for the wetland benefit
//! engine. Each `POST /calculate` becomes one job that runs elevation
//! acquisition, terrain analysis, the before/after erosion model and
//! artifact persistence, in that order, and ends `Completed` or `Failed`.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod jobs;
pub mod model;
pub mod pipeline;
pub mod report;

pub use api::router;
pub use config::{Cli, ServerConfig};
pub use error::{FailureKind, JobError};
pub use jobs::{JobId, JobManager, JobRecord, JobRegistry, JobState};
pub use report::{MarkdownReport, ReportRenderer};
