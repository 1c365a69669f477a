//! Before/after aggregation with wetland retention

use crate::erosion::{Efficiencies, ScenarioLoads};
use serde::{Deserialize, Serialize};

/// Catchment totals for one scenario
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTotals {
    /// Gross soil loss (t/yr)
    pub soil_loss_tonnes: f64,
    /// Sediment leaving the catchment (t/yr)
    pub delivered_sediment_tonnes: f64,
    /// Nitrogen leaving the catchment (kg/yr)
    pub nitrogen_load_kg: f64,
    /// Phosphorus leaving the catchment (kg/yr)
    pub phosphorus_load_kg: f64,
}

/// Before/after comparison
///
/// `after` delivered sediment and nutrient loads are net of wetland
/// retention; `after.soil_loss_tonnes` is gross, like `before`.
///
/// A reduction is `before − after` and is non-negative whenever the after
/// C and P factors do not exceed the before ones and efficiencies lie in
/// [0, 1]. Other parameter choices can give a negative reduction, which
/// means the scenario increases export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitSummary {
    pub before: ScenarioTotals,
    pub after: ScenarioTotals,
    /// Delivered sediment reduction (t/yr)
    pub sediment_reduction_tonnes: f64,
    pub nitrogen_reduction_kg: f64,
    pub phosphorus_reduction_kg: f64,
    /// Gross soil loss reduction on the hillslopes (t/yr)
    pub soil_loss_reduction_tonnes: f64,
}

/// Combine the two scenario runs into a benefit summary.
///
/// Retention is applied to the after scenario only:
/// `after_net = after_delivered × (1 − efficiency)` per constituent.
pub fn aggregate(
    before: &ScenarioLoads,
    after: &ScenarioLoads,
    efficiencies: &Efficiencies,
) -> BenefitSummary {
    let before_totals = ScenarioTotals {
        soil_loss_tonnes: before.soil_loss_tonnes,
        delivered_sediment_tonnes: before.delivered_sediment_tonnes,
        nitrogen_load_kg: before.nitrogen_load_kg,
        phosphorus_load_kg: before.phosphorus_load_kg,
    };

    let after_totals = ScenarioTotals {
        soil_loss_tonnes: after.soil_loss_tonnes,
        delivered_sediment_tonnes: after.delivered_sediment_tonnes * (1.0 - efficiencies.sediment),
        nitrogen_load_kg: after.nitrogen_load_kg * (1.0 - efficiencies.nitrogen),
        phosphorus_load_kg: after.phosphorus_load_kg * (1.0 - efficiencies.phosphorus),
    };

    BenefitSummary {
        sediment_reduction_tonnes: before_totals.delivered_sediment_tonnes
            - after_totals.delivered_sediment_tonnes,
        nitrogen_reduction_kg: before_totals.nitrogen_load_kg - after_totals.nitrogen_load_kg,
        phosphorus_reduction_kg: before_totals.phosphorus_load_kg
            - after_totals.phosphorus_load_kg,
        soil_loss_reduction_tonnes: before_totals.soil_loss_tonnes
            - after_totals.soil_loss_tonnes,
        before: before_totals,
        after: after_totals,
    }
}
