//! Spatial benefit raster

use crate::erosion::{Efficiencies, ScenarioLoads, ScenarioParameters};
use wetland_core::raster::Raster;
use wetland_core::{Error, Result};

/// No-data value written outside the catchment
pub const BENEFIT_NODATA: f64 = -9999.0;

/// Per-cell delivered-sediment reduction (t/yr).
///
/// Inside the catchment each cell holds
/// `before × SDR − after × SDR × (1 − sediment efficiency)`, where `before`
/// and `after` are the cell's gross soil loss. Summed over the catchment this
/// equals the summary's sediment reduction. Cells outside the catchment hold
/// [`BENEFIT_NODATA`].
pub fn benefit_raster(
    before: &ScenarioLoads,
    after: &ScenarioLoads,
    params: &ScenarioParameters,
) -> Result<Raster<f64>> {
    let before_cells = &before.cell_soil_loss;
    let after_cells = &after.cell_soil_loss;
    if before_cells.shape() != after_cells.shape() {
        let (er, ec) = before_cells.shape();
        let (ar, ac) = after_cells.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let sdr = params.sediment_delivery_ratio;
    let Efficiencies { sediment, .. } = params.efficiencies;
    let retained = 1.0 - sediment;

    let data = ndarray::Zip::from(before_cells.data())
        .and(after_cells.data())
        .map_collect(|&b, &a| {
            // Both runs share one mask, so NaN marks "outside" in both
            if b.is_nan() || a.is_nan() {
                BENEFIT_NODATA
            } else {
                b * sdr - a * sdr * retained
            }
        });

    let mut output = before_cells.with_same_meta::<f64>();
    output.set_nodata(Some(BENEFIT_NODATA));
    output.replace_data(data)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benefit::aggregate;
    use crate::erosion::{run_scenario, Scenario};
    use approx::assert_relative_eq;
    use wetland_core::{GeoTransform, CRS};

    #[test]
    fn test_cells_sum_to_sediment_reduction() {
        let mut ls: Raster<f64> = Raster::new(3, 4);
        ls.set_transform(GeoTransform::new(500_000.0, 5_000_030.0, 10.0, -10.0));
        ls.set_crs(Some(CRS::from_epsg(32760)));
        for row in 0..3 {
            for col in 0..4 {
                ls.set(row, col, 0.5 + (row * 4 + col) as f64 * 0.25).unwrap();
            }
        }
        let mut mask = ls.like(0u8);
        for &(r, c) in &[(0, 1), (1, 1), (1, 2), (2, 2)] {
            mask.set(r, c, 1).unwrap();
        }

        let params = ScenarioParameters::default();
        let before = run_scenario(&ls, &mask, &params, Scenario::Before).unwrap();
        let after = run_scenario(&ls, &mask, &params, Scenario::After).unwrap();
        let raster = benefit_raster(&before, &after, &params).unwrap();
        let summary = aggregate(&before, &after, &params.efficiencies);

        let total: f64 = raster
            .data()
            .iter()
            .filter(|&&v| v != BENEFIT_NODATA)
            .sum();
        assert_relative_eq!(total, summary.sediment_reduction_tonnes, epsilon = 1e-9);

        assert_eq!(raster.get(0, 0).unwrap(), BENEFIT_NODATA);
        assert_eq!(raster.nodata(), Some(BENEFIT_NODATA));
        assert_eq!(raster.crs().and_then(|c| c.epsg()), Some(32760));
        assert_eq!(raster.transform(), ls.transform());
    }
}
