//! Job registry and lifecycle
//!
//! A job moves `Created → Running → Completed` or `Created → Running →
//! Failed`. Its state is one tagged value, so which artifacts may be served
//! always follows from that single field. The registry is the only
//! structure shared between jobs.

use crate::artifacts::{ArtifactStore, JobArtifacts};
use crate::config::ServerConfig;
use crate::error::{FailureKind, JobError};
use crate::model::{raster_url, report_url, CalculationRequest, CalculationResponse, DemTestRequest};
use crate::pipeline::{self, StageError};
use crate::report::ReportRenderer;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use wetland_cloud::{AcquisitionOptions, CloudError, DemSource};

pub type JobId = Uuid;

/// Lifecycle state of one job
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state")]
pub enum JobState {
    Created,
    Running,
    Completed {
        result: Box<CalculationResponse>,
        #[serde(skip)]
        artifacts: JobArtifacts,
    },
    Failed {
        error: JobError,
    },
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Completed { .. } => "Completed",
            Self::Failed { .. } => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Registry entry for one job
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Input snapshot
    pub input: CalculationRequest,
    #[serde(flatten)]
    pub state: JobState,
}

impl JobRecord {
    /// Result and artifacts, only for completed jobs
    pub fn completed(&self) -> Option<(&CalculationResponse, &JobArtifacts)> {
        match &self.state {
            JobState::Completed { result, artifacts } => Some((result, artifacts)),
            _ => None,
        }
    }
}

/// Concurrent id → job map
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<DashMap<JobId, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in `Created` state
    pub fn create(&self, input: CalculationRequest) -> JobId {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.jobs.insert(
            id,
            JobRecord {
                job_id: id,
                created_at: now,
                updated_at: now,
                input,
                state: JobState::Created,
            },
        );
        id
    }

    /// Snapshot of a job
    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Move a job to `next`.
    ///
    /// Only forward transitions are applied; anything else, including a
    /// change to a terminal job, is ignored and reported as `false`.
    fn transition(&self, id: JobId, next: JobState) -> bool {
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return false;
        };
        let allowed = matches!(
            (&entry.state, &next),
            (JobState::Created, JobState::Running)
                | (JobState::Running, JobState::Completed { .. })
                | (JobState::Running, JobState::Failed { .. })
        );
        if allowed {
            entry.state = next;
            entry.updated_at = Utc::now();
        }
        allowed
    }
}

/// Runs the pipeline for each request and owns every job's lifecycle.
///
/// This is the one place where stage failures are classified.
#[derive(Clone)]
pub struct JobManager {
    registry: JobRegistry,
    store: ArtifactStore,
    acquisition: AcquisitionOptions,
    source: Arc<dyn DemSource>,
    renderer: Arc<dyn ReportRenderer>,
}

impl JobManager {
    pub fn new(
        config: &ServerConfig,
        source: Arc<dyn DemSource>,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            registry: JobRegistry::new(),
            store: ArtifactStore::new(&config.output_dir),
            acquisition: config.acquisition.clone(),
            source,
            renderer,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Connectivity probe: payload size for the polygon's extent.
    pub async fn probe(&self, request: &DemTestRequest) -> Result<usize, JobError> {
        let polygon = pipeline::validate_source(&request.dem_url, &request.polygon_geojson)
            .map_err(classify)?;
        wetland_cloud::probe(
            self.source.as_ref(),
            &request.dem_url,
            &polygon,
            &self.acquisition,
        )
        .await
        .map_err(|e| classify(StageError::Acquisition(e)))
    }

    /// Validate, run and persist one calculation.
    ///
    /// Invalid input is rejected before a job exists (no id in the error).
    /// Every later failure leaves a `Failed` job and carries its id.
    pub async fn submit(
        &self,
        request: CalculationRequest,
    ) -> Result<CalculationResponse, (Option<JobId>, JobError)> {
        let validated = pipeline::validate(request).map_err(|e| (None, classify(e)))?;

        let id = self.registry.create(validated.request.clone());
        info!(job_id = %id, wetland = %validated.request.wetland_name, "job Created");

        self.registry.transition(id, JobState::Running);
        info!(job_id = %id, "job Running");

        match self.run(id, validated).await {
            Ok((result, artifacts)) => {
                self.registry.transition(
                    id,
                    JobState::Completed {
                        result: Box::new(result.clone()),
                        artifacts,
                    },
                );
                info!(
                    job_id = %id,
                    sediment_reduction_t = result.summary.sediment_reduction_tonnes,
                    "job Completed"
                );
                Ok(result)
            }
            Err(stage_error) => {
                let job_error = classify(stage_error);
                error!(job_id = %id, kind = %job_error.kind, error = %job_error.message, "job Failed");
                self.registry.transition(
                    id,
                    JobState::Failed {
                        error: job_error.clone(),
                    },
                );
                Err((Some(id), job_error))
            }
        }
    }

    async fn run(
        &self,
        id: JobId,
        validated: pipeline::ValidatedRequest,
    ) -> Result<(CalculationResponse, JobArtifacts), StageError> {
        let pipeline::ValidatedRequest { request, polygon } = validated;

        let grid = pipeline::acquire(
            self.source.as_ref(),
            &request.dem_url,
            &polygon,
            &self.acquisition,
        )
        .await?;

        let request = Arc::new(request);
        let req = Arc::clone(&request);
        let assessment = tokio::task::spawn_blocking(move || pipeline::compute(grid, &req))
            .await
            .map_err(|e| StageError::Worker(e.to_string()))??;

        let assessment = Arc::new(assessment);
        let (store, renderer) = (self.store.clone(), Arc::clone(&self.renderer));
        let (req, done) = (Arc::clone(&request), Arc::clone(&assessment));
        let artifacts = tokio::task::spawn_blocking(move || {
            pipeline::persist(&store, renderer.as_ref(), id, &req, &done)
        })
        .await
        .map_err(|e| StageError::Worker(e.to_string()))??;

        let terrain = &assessment.terrain;
        let result = CalculationResponse {
            job_id: id,
            wetland_name: request.wetland_name.clone(),
            user_name: request.user_name.clone(),
            area_hectares: terrain.area_hectares,
            catchment_hectares: terrain.catchment_hectares,
            average_slope: terrain.average_slope,
            summary: assessment.summary.clone(),
            terrain: terrain.clone(),
            efficiency_settings: request.parameters.efficiencies,
            raster_download_url: raster_url(id),
            report_download_url: report_url(id),
        };
        Ok((result, artifacts))
    }
}

/// Map a stage failure to its user-facing class
fn classify(err: StageError) -> JobError {
    match err {
        StageError::Input(message) => JobError::input(message),
        StageError::Acquisition(CloudError::Worker(message)) => JobError::new(
            FailureKind::ComputationError,
            format!("worker stopped: {message}"),
        ),
        StageError::Acquisition(e) => {
            let kind = if e.is_input_failure() {
                FailureKind::InputError
            } else if e.is_fetch_failure() {
                FailureKind::DemFetchError
            } else {
                FailureKind::DemInvalidError
            };
            JobError::new(kind, e.to_string())
        }
        StageError::Computation(wetland_core::Error::InvalidParameter { name, value, reason }) => {
            JobError::input(format!("{name} = {value}: {reason}"))
        }
        StageError::Computation(e) => JobError::new(FailureKind::ComputationError, e.to_string()),
        StageError::Artifact(e) => JobError::new(FailureKind::ArtifactError, e.to_string()),
        StageError::Worker(message) => JobError::new(
            FailureKind::ComputationError,
            format!("worker stopped: {message}"),
        ),
    }
}
