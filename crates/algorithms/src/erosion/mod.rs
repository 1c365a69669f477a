//! Erosion and nutrient export
//!
//! RUSLE soil loss per cell, sediment delivery, and nutrient loads carried
//! by the delivered sediment.

mod params;
mod rusle;

pub use params::{Efficiencies, ManagementFactors, ScenarioParameters};
pub use rusle::{
    ls_factor, ls_grid, run_scenario, Scenario, ScenarioLoads, LS_MAX, NITROGEN_KG_PER_TONNE,
    PHOSPHORUS_KG_PER_TONNE,
};
