//! End-to-end API tests against an in-process router and a scripted DEM source.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use wetland_cloud::{CloudError, DemRequest, DemSource};
use wetland_core::io::{read_geotiff_from_buffer, write_geotiff_to_buffer, GeoTiffOptions};
use wetland_core::Raster;
use wetland_server::{router, JobManager, MarkdownReport, ServerConfig};

const DEM_URL: &str = "https://elevation.example.test/arcgis/rest/services/DEM/ImageServer";

enum Mode {
    /// South-falling plane on exactly the requested grid
    Plane,
    Fixed(Vec<u8>),
    Fail,
    NoData,
    /// Never answers within any reasonable deadline
    Stalled,
}

struct ScriptedSource {
    mode: Mode,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn encode(request: &DemRequest, value: impl Fn(usize, usize) -> f64) -> Vec<u8> {
    let mut dem: Raster<f64> = Raster::new(request.rows, request.cols);
    dem.set_transform(request.transform());
    dem.set_crs(Some(request.crs()));
    dem.set_nodata(Some(-9999.0));
    for row in 0..request.rows {
        for col in 0..request.cols {
            dem.set(row, col, value(row, col)).unwrap();
        }
    }
    write_geotiff_to_buffer(&dem, Some(GeoTiffOptions { nodata: Some(-9999.0) })).unwrap()
}

#[async_trait]
impl DemSource for ScriptedSource {
    async fn fetch(&self, _dem_url: &str, request: &DemRequest) -> wetland_cloud::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            Mode::Plane => Ok(encode(request, |row, _| 200.0 - 0.5 * row as f64)),
            Mode::Fixed(bytes) => Ok(bytes.clone()),
            Mode::Fail => Err(CloudError::Status {
                status: 503,
                url: DEM_URL.into(),
            }),
            Mode::NoData => Ok(encode(request, |_, _| -9999.0)),
            Mode::Stalled => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(encode(request, |row, _| 200.0 - 0.5 * row as f64))
            }
        }
    }
}

struct Harness {
    app: Router,
    source: Arc<ScriptedSource>,
    output: TempDir,
}

fn harness(mode: Mode) -> Harness {
    harness_with(mode, |_| {})
}

fn harness_with(mode: Mode, configure: impl FnOnce(&mut ServerConfig)) -> Harness {
    let output = TempDir::new().unwrap();
    let source = ScriptedSource::new(mode);
    let mut config = ServerConfig::with_output_dir(output.path());
    configure(&mut config);
    let manager = JobManager::new(&config, source.clone(), Arc::new(MarkdownReport));
    Harness {
        app: router(manager),
        source,
        output,
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(text) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(text)
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body.map(|v| v.to_string())).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn polygon() -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [172.63, -43.535], [172.64, -43.535], [172.64, -43.53],
            [172.63, -43.53], [172.63, -43.535]
        ]]
    })
}

fn calculation(geometry: Value) -> Value {
    json!({
        "dem_url": DEM_URL,
        "wetland_name": "Lake margin",
        "user_name": "R. Tane",
        "polygon_geojson": geometry,
    })
}

#[tokio::test]
async fn health_reports_running_and_job_count() {
    let h = harness(Mode::Plane);
    let (status, body) = send_json(&h.app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["available_jobs"], 0);
    assert!(body["message"].as_str().unwrap().contains("running"));
}

#[tokio::test]
async fn dem_test_reports_payload_size() {
    let payload = vec![7u8; 4096];
    let h = harness(Mode::Fixed(payload.clone()));
    let (status, body) = send_json(
        &h.app,
        Method::POST,
        "/dem/test",
        Some(json!({"dem_url": DEM_URL, "polygon_geojson": polygon()})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["bytes"], payload.len());
    assert_eq!(h.source.calls(), 1);
}

#[tokio::test]
async fn dem_test_with_empty_payload_is_invalid() {
    let h = harness(Mode::Fixed(Vec::new()));
    let (status, body) = send_json(
        &h.app,
        Method::POST,
        "/dem/test",
        Some(json!({"dem_url": DEM_URL, "polygon_geojson": polygon()})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "DemInvalidError");
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_fetch() {
    let h = harness(Mode::Plane);

    let bowtie = json!({"type": "Polygon", "coordinates": [[
        [172.63, -43.535], [172.64, -43.53], [172.64, -43.535],
        [172.63, -43.53], [172.63, -43.535]
    ]]});
    let two_vertices = json!({"type": "Polygon", "coordinates": [[
        [172.63, -43.535], [172.64, -43.53], [172.63, -43.535]
    ]]});

    for geometry in [bowtie, two_vertices] {
        let (status, body) =
            send_json(&h.app, Method::POST, "/calculate", Some(calculation(geometry))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "InputError");
        assert!(body["job_id"].is_null());
    }

    let (status, bytes) = send(&h.app, Method::POST, "/calculate", Some("{not json".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["kind"], "InputError");
    assert!(body["job_id"].is_null());

    let mut bad_factor = calculation(polygon());
    bad_factor["cover_management_after"] = json!(1.5);
    let (status, body) = send_json(&h.app, Method::POST, "/calculate", Some(bad_factor)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InputError");

    assert_eq!(h.source.calls(), 0);
    let (_, health) = send_json(&h.app, Method::GET, "/", None).await;
    assert_eq!(health["available_jobs"], 0);
}

#[tokio::test]
async fn calculation_produces_downloadable_artifacts() {
    let h = harness(Mode::Plane);
    let (status, body) =
        send_json(&h.app, Method::POST, "/calculate", Some(calculation(polygon()))).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert_eq!(body["wetland_name"], "Lake margin");
    assert_eq!(body["raster_download_url"], format!("/raster/{job_id}"));
    assert_eq!(body["report_download_url"], format!("/report/{job_id}"));
    assert!(body["catchment_hectares"].as_f64().unwrap() >= body["area_hectares"].as_f64().unwrap());
    assert!(body["summary"]["sediment_reduction_tonnes"].as_f64().unwrap() > 0.0);
    assert_eq!(body["terrain"]["crs"], "EPSG:32759");

    let (status, raster) = send(&h.app, Method::GET, &format!("/raster/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let benefits: Raster<f64> = read_geotiff_from_buffer(&raster).unwrap();
    assert_eq!(benefits.crs().and_then(|c| c.epsg()), Some(32759));

    let (status, report) = send(&h.app, Method::GET, &format!("/report/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let report = String::from_utf8(report).unwrap();
    assert!(report.contains("Wetland Benefit Calculator Report"));
    assert!(report.contains("Lake margin"));
    assert!(report.contains(&job_id));

    let (status, record) = send_json(&h.app, Method::GET, &format!("/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["state"], "Completed");

    let (status, exported) =
        send_json(&h.app, Method::POST, &format!("/jobs/{job_id}/export"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exported, body);

    assert!(h.output.path().join(&job_id).join("summary.json").is_file());
}

#[tokio::test]
async fn identical_requests_give_identical_summaries() {
    let h = harness(Mode::Plane);
    let (_, first) =
        send_json(&h.app, Method::POST, "/calculate", Some(calculation(polygon()))).await;
    let (_, second) =
        send_json(&h.app, Method::POST, "/calculate", Some(calculation(polygon()))).await;

    assert_ne!(first["job_id"], second["job_id"]);
    assert_eq!(first["summary"], second["summary"]);
    assert_eq!(first["terrain"], second["terrain"]);
}

#[tokio::test]
async fn fetch_failure_leaves_a_failed_job_without_artifacts() {
    let h = harness(Mode::Fail);
    let (status, body) =
        send_json(&h.app, Method::POST, "/calculate", Some(calculation(polygon()))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "DemFetchError");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, record) = send_json(&h.app, Method::GET, &format!("/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["state"], "Failed");
    assert_eq!(record["error"]["kind"], "DemFetchError");

    let (status, _) = send(&h.app, Method::GET, &format!("/raster/{job_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&h.app, Method::POST, &format!("/jobs/{job_id}/export"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(std::fs::read_dir(h.output.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn stalled_fetch_times_out_as_a_failed_job() {
    let h = harness_with(Mode::Stalled, |config| {
        config.acquisition.timeout = Duration::from_millis(50);
    });
    let (status, body) =
        send_json(&h.app, Method::POST, "/calculate", Some(calculation(polygon()))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "DemFetchError");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (_, record) = send_json(&h.app, Method::GET, &format!("/jobs/{job_id}"), None).await;
    assert_eq!(record["state"], "Failed");
    assert_eq!(record["error"]["kind"], "DemFetchError");
    assert_eq!(h.source.calls(), 1);
    assert_eq!(std::fs::read_dir(h.output.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn unwritable_output_fails_the_job_with_artifact_error() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let root = blocker.path().to_path_buf();
    let h = harness_with(Mode::Plane, |config| config.output_dir = root);

    let (status, body) =
        send_json(&h.app, Method::POST, "/calculate", Some(calculation(polygon()))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "ArtifactError");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, record) = send_json(&h.app, Method::GET, &format!("/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["state"], "Failed");
    assert_eq!(record["error"]["kind"], "ArtifactError");

    for uri in [format!("/raster/{job_id}"), format!("/report/{job_id}")] {
        let (status, _) = send(&h.app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
    assert!(blocker.path().is_file());
}

#[tokio::test]
async fn all_nodata_payload_is_invalid_dem() {
    let h = harness(Mode::NoData);
    let (status, body) =
        send_json(&h.app, Method::POST, "/calculate", Some(calculation(polygon()))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "DemInvalidError");
    assert!(body["job_id"].is_string());
}

#[tokio::test]
async fn unknown_jobs_are_not_found() {
    let h = harness(Mode::Plane);
    for uri in [
        "/jobs/00000000-0000-4000-8000-000000000000".to_string(),
        "/jobs/not-a-uuid".to_string(),
        "/raster/00000000-0000-4000-8000-000000000000".to_string(),
        "/report/not-a-uuid".to_string(),
    ] {
        let (status, bytes) = send(&h.app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], "NotFound");
    }
}
