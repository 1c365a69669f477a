//! HTTP surface

use crate::error::{FailureKind, JobError};
use crate::jobs::{JobId, JobManager, JobRecord};
use crate::model::{CalculationRequest, CalculationResponse, DemTestRequest, DemTestResponse, Health};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

type AppState = Arc<JobManager>;

/// Build the application router around a job manager
pub fn router(manager: JobManager) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/dem/test", post(dem_test))
        .route("/calculate", post(calculate))
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/export", post(export_job))
        .route("/raster/:job_id", get(download_raster))
        .route("/report/:job_id", get(download_report))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(manager))
}

/// HTTP status for each failure class
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::InputError => StatusCode::BAD_REQUEST,
        FailureKind::DemFetchError | FailureKind::DemInvalidError => StatusCode::BAD_GATEWAY,
        FailureKind::ComputationError => StatusCode::UNPROCESSABLE_ENTITY,
        FailureKind::ArtifactError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error reply: `{"detail", "kind", "job_id"}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    kind: &'static str,
    job_id: Option<JobId>,
}

impl ApiError {
    fn job(job_id: Option<JobId>, error: &JobError) -> Self {
        Self {
            status: status_for(error.kind),
            body: ErrorBody {
                detail: error.to_string(),
                kind: error.kind.as_str(),
                job_id,
            },
        }
    }

    fn not_found(detail: impl Into<String>, job_id: Option<JobId>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                detail: detail.into(),
                kind: "NotFound",
                job_id,
            },
        }
    }

    fn bad_body(rejection: JsonRejection) -> Self {
        Self::job(None, &JobError::input(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn health(State(manager): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        message: "Wetland Benefit Calculator backend is running",
        available_jobs: manager.registry().len(),
    })
}

async fn dem_test(
    State(manager): State<AppState>,
    payload: Result<Json<DemTestRequest>, JsonRejection>,
) -> Result<Json<DemTestResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::bad_body)?;
    let bytes = manager.probe(&request).await.map_err(|e| {
        warn!(kind = %e.kind, error = %e.message, "DEM test failed");
        ApiError::job(None, &e)
    })?;

    Ok(Json(DemTestResponse {
        status: "ok".into(),
        message: "DEM export succeeded".into(),
        bytes,
    }))
}

async fn calculate(
    State(manager): State<AppState>,
    payload: Result<Json<CalculationRequest>, JsonRejection>,
) -> Result<Json<CalculationResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::bad_body)?;
    manager
        .submit(request)
        .await
        .map(Json)
        .map_err(|(id, e)| ApiError::job(id, &e))
}

fn lookup(manager: &JobManager, raw_id: &str) -> Result<JobRecord, ApiError> {
    raw_id
        .parse::<JobId>()
        .ok()
        .and_then(|id| manager.registry().get(id))
        .ok_or_else(|| ApiError::not_found(format!("job {raw_id} not found"), None))
}

async fn get_job(
    State(manager): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    lookup(&manager, &job_id).map(Json)
}

async fn export_job(
    State(manager): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<CalculationResponse>, ApiError> {
    let record = lookup(&manager, &job_id)?;
    match record.completed() {
        Some((result, _)) => Ok(Json(result.clone())),
        None => Err(ApiError::not_found(
            format!("job is {} and has no result", record.state.name()),
            Some(record.job_id),
        )),
    }
}

async fn download_raster(
    State(manager): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let record = lookup(&manager, &job_id)?;
    let Some((_, artifacts)) = record.completed() else {
        return Err(ApiError::not_found("raster output unavailable", Some(record.job_id)));
    };
    let bytes = tokio::fs::read(&artifacts.raster)
        .await
        .map_err(|_| ApiError::not_found("raster output unavailable", Some(record.job_id)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/tiff".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}_benefits.tif\"", record.job_id),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn download_report(
    State(manager): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let record = lookup(&manager, &job_id)?;
    let Some((_, artifacts)) = record.completed() else {
        return Err(ApiError::not_found("report has not been generated", Some(record.job_id)));
    };
    let bytes = tokio::fs::read(&artifacts.report)
        .await
        .map_err(|_| ApiError::not_found("report has not been generated", Some(record.job_id)))?;

    let file_name = artifacts
        .report
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("report");
    Ok((
        [
            (header::CONTENT_TYPE, artifacts.report_content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}_{file_name}\"", record.job_id),
            ),
        ],
        bytes,
    )
        .into_response())
}
