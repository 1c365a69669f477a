//! Benefit aggregation and spatial benefit raster
//!
//! Runs the erosion model twice over one [`TerrainAnalysis`] (before and
//! after restoration), reduces the runs to catchment totals, and maps the
//! per-cell sediment reduction.

mod aggregate;
mod raster;

pub use aggregate::{aggregate, BenefitSummary, ScenarioTotals};
pub use raster::{benefit_raster, BENEFIT_NODATA};

use crate::analysis::{TerrainAnalysis, TerrainSummary};
use crate::erosion::{run_scenario, Scenario, ScenarioParameters};
use wetland_core::raster::Raster;
use wetland_core::Result;

/// Everything a benefit calculation produces for one wetland
#[derive(Debug, Clone)]
pub struct BenefitAssessment {
    pub terrain: TerrainSummary,
    pub summary: BenefitSummary,
    /// Per-cell delivered-sediment reduction (t/yr)
    pub benefit_raster: Raster<f64>,
}

/// Run both scenarios over the catchment and aggregate them.
///
/// Terrain factors come from `terrain` and are identical for both runs.
pub fn assess_benefits(
    terrain: &TerrainAnalysis,
    area_hectares: f64,
    params: &ScenarioParameters,
) -> Result<BenefitAssessment> {
    params.validate()?;

    let terrain_summary = terrain.summary(area_hectares)?;
    let mask = &terrain.catchment.mask;

    let before = run_scenario(&terrain.ls_factor, mask, params, Scenario::Before)?;
    let after = run_scenario(&terrain.ls_factor, mask, params, Scenario::After)?;

    Ok(BenefitAssessment {
        terrain: terrain_summary,
        summary: aggregate(&before, &after, &params.efficiencies),
        benefit_raster: benefit_raster(&before, &after, params)?,
    })
}
