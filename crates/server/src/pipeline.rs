//! Pipeline stages
//!
//! Each stage returns its own typed error; the job manager decides what
//! kind of failure that is. Nothing here retries or substitutes defaults.

use crate::artifacts::{ArtifactError, ArtifactStore, JobArtifacts, SummaryRecord};
use crate::model::CalculationRequest;
use crate::report::ReportRenderer;
use chrono::Utc;
use uuid::Uuid;
use wetland_algorithms::{assess_benefits, BenefitAssessment, TerrainAnalysis};
use wetland_cloud::{AcquisitionOptions, CloudError, DemLocation, DemSource, ElevationGrid};
use wetland_core::WetlandPolygon;

/// Failure of one stage, before classification
#[derive(Debug)]
pub enum StageError {
    /// Request rejected before any I/O
    Input(String),
    Acquisition(CloudError),
    Computation(wetland_core::Error),
    Artifact(ArtifactError),
    /// A blocking worker panicked or was cancelled
    Worker(String),
}

/// A request whose polygon, parameters and DEM reference passed validation
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub request: CalculationRequest,
    pub polygon: WetlandPolygon,
}

/// Check the polygon and DEM reference of a probe request.
pub fn validate_source(
    dem_url: &str,
    polygon_geojson: &serde_json::Value,
) -> Result<WetlandPolygon, StageError> {
    let polygon = WetlandPolygon::from_geojson(polygon_geojson)
        .map_err(|e| StageError::Input(format!("polygon_geojson: {e}")))?;
    DemLocation::parse(dem_url).map_err(|e| StageError::Input(format!("dem_url: {e}")))?;
    Ok(polygon)
}

/// Reject a calculation request that cannot possibly run.
pub fn validate(request: CalculationRequest) -> Result<ValidatedRequest, StageError> {
    if request.wetland_name.trim().is_empty() {
        return Err(StageError::Input("wetland_name must not be empty".into()));
    }
    let polygon = validate_source(&request.dem_url, &request.polygon_geojson)?;
    request
        .parameters
        .validate()
        .map_err(|e| StageError::Input(e.to_string()))?;

    Ok(ValidatedRequest { request, polygon })
}

/// Fetch and validate the elevation grid.
///
/// The fetch is bounded by the acquisition timeout; decoding runs on the
/// blocking pool.
pub async fn acquire(
    source: &dyn DemSource,
    dem_url: &str,
    polygon: &WetlandPolygon,
    options: &AcquisitionOptions,
) -> Result<ElevationGrid, StageError> {
    wetland_cloud::acquire(source, dem_url, polygon, options)
        .await
        .map_err(StageError::Acquisition)
}

/// Terrain analysis, both scenarios, aggregation and the benefit raster.
///
/// CPU-bound; run it off the async executor.
pub fn compute(
    grid: ElevationGrid,
    request: &CalculationRequest,
) -> Result<BenefitAssessment, StageError> {
    let ElevationGrid { dem, polygon, .. } = grid;
    let footprint = polygon.footprint(&dem);
    let terrain = TerrainAnalysis::run(dem, footprint).map_err(StageError::Computation)?;
    assess_benefits(&terrain, polygon.area_hectares(), &request.parameters)
        .map_err(StageError::Computation)
}

/// Persist raster, summary and report for a finished computation.
pub fn persist(
    store: &ArtifactStore,
    renderer: &dyn ReportRenderer,
    id: Uuid,
    request: &CalculationRequest,
    assessment: &BenefitAssessment,
) -> Result<JobArtifacts, StageError> {
    let record = SummaryRecord {
        job_id: id,
        wetland_name: request.wetland_name.clone(),
        user_name: request.user_name.clone(),
        generated_at: Utc::now(),
        terrain: assessment.terrain.clone(),
        inputs: request.parameters.clone(),
        results: assessment.summary.clone(),
    };
    store
        .persist(id, &assessment.benefit_raster, &record, renderer)
        .map_err(StageError::Artifact)
}
