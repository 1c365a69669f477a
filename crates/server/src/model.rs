//! Request and response payloads

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wetland_algorithms::erosion::{Efficiencies, ScenarioParameters};
use wetland_algorithms::{BenefitSummary, TerrainSummary};

/// Body of `POST /calculate`
///
/// Scenario factors are flattened into the top level and fall back to their
/// defaults when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    /// Export-service URL, `file://` URL or local path of the DEM
    pub dem_url: String,
    pub wetland_name: String,
    #[serde(default)]
    pub user_name: Option<String>,
    /// GeoJSON Polygon, Feature or FeatureCollection in WGS84
    pub polygon_geojson: serde_json::Value,
    #[serde(flatten)]
    pub parameters: ScenarioParameters,
}

/// Body of `POST /dem/test`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemTestRequest {
    pub dem_url: String,
    pub polygon_geojson: serde_json::Value,
}

/// Reply of `POST /dem/test`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemTestResponse {
    pub status: String,
    pub message: String,
    /// Size of the fetched payload
    pub bytes: usize,
}

/// Result of a completed job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationResponse {
    pub job_id: Uuid,
    pub wetland_name: String,
    pub user_name: Option<String>,
    pub area_hectares: f64,
    pub catchment_hectares: f64,
    pub average_slope: f64,
    pub summary: BenefitSummary,
    pub terrain: TerrainSummary,
    pub efficiency_settings: Efficiencies,
    pub raster_download_url: String,
    pub report_download_url: String,
}

/// Reply of `GET /`
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub message: &'static str,
    pub available_jobs: usize,
}

pub fn raster_url(id: Uuid) -> String {
    format!("/raster/{id}")
}

pub fn report_url(id: Uuid) -> String {
    format!("/report/{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_scenario_factors() {
        let request: CalculationRequest = serde_json::from_value(serde_json::json!({
            "dem_url": "https://example.org/ImageServer",
            "wetland_name": "Te Waihora margin",
            "polygon_geojson": {"type": "Polygon", "coordinates": []},
            "rainfall_factor": 800.0,
            "efficiencies": {"sediment": 0.9}
        }))
        .unwrap();

        assert_eq!(request.user_name, None);
        assert_eq!(request.parameters.rainfall_factor, 800.0);
        assert_eq!(request.parameters.soil_erodibility, 0.28);
        assert_eq!(request.parameters.efficiencies.sediment, 0.9);
        assert_eq!(request.parameters.efficiencies.nitrogen, 0.4);
    }

    #[test]
    fn test_request_requires_dem_and_polygon() {
        let missing = serde_json::json!({
            "wetland_name": "x",
            "polygon_geojson": {"type": "Polygon", "coordinates": []}
        });
        assert!(serde_json::from_value::<CalculationRequest>(missing).is_err());
    }
}
