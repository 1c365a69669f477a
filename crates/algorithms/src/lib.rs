//! # Wetland Algorithms
//!
//! Terrain and erosion algorithms for the wetland benefit engine.
//!
//! ## Algorithm Categories
//!
//! - **terrain**: Slope
//! - **hydrology**: D8 flow direction, flow accumulation, catchment delineation
//! - **erosion**: LS factor, RUSLE scenario runs, nutrient export
//! - **benefit**: Before/after aggregation, benefit raster
//!
//! [`TerrainAnalysis`] ties the terrain steps together for one job and
//! [`assess_benefits`] runs the model on top of it.

pub mod analysis;
pub mod benefit;
pub mod erosion;
pub mod hydrology;
pub mod terrain;

mod maybe_rayon;

pub use analysis::{TerrainAnalysis, TerrainSummary};
pub use benefit::{assess_benefits, BenefitAssessment, BenefitSummary, ScenarioTotals};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::analysis::{TerrainAnalysis, TerrainSummary};
    pub use crate::benefit::{
        aggregate, assess_benefits, benefit_raster, BenefitAssessment, BenefitSummary,
        ScenarioTotals, BENEFIT_NODATA,
    };
    pub use crate::erosion::{
        ls_factor, ls_grid, run_scenario, Efficiencies, Scenario, ScenarioLoads,
        ScenarioParameters,
    };
    pub use crate::hydrology::{
        delineate_catchment, find_outlet, flow_accumulation, flow_direction, Catchment,
        FlowAccumulation, FlowDirection, FlowDirectionParams,
    };
    pub use crate::terrain::{slope, Slope, SlopeParams, SlopeUnits};
    pub use wetland_core::prelude::*;
}
