//! End-to-end benefit calculation on a pinned synthetic catchment.
//!
//! Fixture: 12 x 10 grid of 10 m cells in UTM 60S, a plane falling 1 m per
//! row toward the south, and a wetland polygon covering the 2 x 2 block of
//! cells at rows 5-6, columns 4-5.
//!
//! On this surface every cell has slope atan(0.1), flows south, and
//! accumulates `row + 1` cells. The footprint drains into (7, 4) and (7, 5),
//! which tie on elevation and accumulation, so row-major order makes (7, 4)
//! the outlet. The catchment is every cell whose flow passes through the
//! wetland: column 4 down to the outlet (8 cells) and column 5 down to the
//! footprint (7 cells). Reference values below follow from those facts.

use approx::assert_relative_eq;
use geo_types::{LineString, Polygon};
use wetland_algorithms::prelude::*;
use wetland_core::vector::ProjectedPolygon;

const ORIGIN_X: f64 = 500_000.0;
const ORIGIN_Y: f64 = 5_000_120.0;

fn fixture_dem() -> Raster<f64> {
    let mut dem = Raster::new(12, 10);
    dem.set_transform(GeoTransform::new(ORIGIN_X, ORIGIN_Y, 10.0, -10.0));
    dem.set_crs(Some(CRS::from_epsg(32760)));
    dem.set_nodata(Some(-9999.0));
    for row in 0..12 {
        for col in 0..10 {
            dem.set(row, col, 100.0 - row as f64).unwrap();
        }
    }
    dem
}

fn fixture_polygon() -> ProjectedPolygon {
    let (x0, x1) = (ORIGIN_X + 40.5, ORIGIN_X + 59.5);
    let (y0, y1) = (ORIGIN_Y - 69.5, ORIGIN_Y - 50.5);
    let ring = LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]);
    ProjectedPolygon::from_planar(Polygon::new(ring, vec![]), CRS::from_epsg(32760))
}

fn fixture_params() -> ScenarioParameters {
    ScenarioParameters {
        rainfall_factor: 600.0,
        soil_erodibility: 0.28,
        cover_management_before: 0.3,
        cover_management_after: 0.05,
        support_practices_before: 0.5,
        support_practices_after: 0.2,
        sediment_delivery_ratio: 0.6,
        efficiencies: Efficiencies {
            sediment: 0.7,
            nitrogen: 0.4,
            phosphorus: 0.5,
        },
    }
}

fn run(params: &ScenarioParameters) -> BenefitAssessment {
    let dem = fixture_dem();
    let polygon = fixture_polygon();
    let footprint = polygon.footprint(&dem);
    let terrain = TerrainAnalysis::run(dem, footprint).unwrap();
    assess_benefits(&terrain, polygon.area_hectares(), params).unwrap()
}

#[test]
fn fixture_matches_reference_values() {
    let result = run(&fixture_params());
    let s = &result.summary;

    assert_relative_eq!(s.before.soil_loss_tonnes, 5.418693448581285, max_relative = 1e-9);
    assert_relative_eq!(s.after.soil_loss_tonnes, 0.36124622990541916, max_relative = 1e-9);
    assert_relative_eq!(s.sediment_reduction_tonnes, 3.1861917477657955, max_relative = 1e-9);
    assert_relative_eq!(s.nitrogen_reduction_kg, 4.68175113957423, max_relative = 1e-9);
    assert_relative_eq!(s.phosphorus_reduction_kg, 1.2571368800708582, max_relative = 1e-9);

    let t = &result.terrain;
    assert_eq!(t.outlet, (7, 4));
    assert_eq!(t.catchment_cells, 15);
    assert_relative_eq!(t.area_hectares, 0.0361, max_relative = 1e-12);
    assert_relative_eq!(t.catchment_hectares, 0.15, max_relative = 1e-12);
    assert_relative_eq!(t.average_slope, 5.710593137499643, max_relative = 1e-9);
    assert_eq!(t.crs.as_deref(), Some("EPSG:32760"));
}

#[test]
fn fixture_is_bit_identical_across_runs() {
    let a = run(&fixture_params());
    let b = run(&fixture_params());

    assert_eq!(
        serde_json::to_string(&a.summary).unwrap(),
        serde_json::to_string(&b.summary).unwrap()
    );
    assert_eq!(
        a.summary.sediment_reduction_tonnes.to_bits(),
        b.summary.sediment_reduction_tonnes.to_bits()
    );
    assert_eq!(a.benefit_raster.data(), b.benefit_raster.data());
}

#[test]
fn benefit_raster_covers_exactly_the_catchment() {
    let result = run(&fixture_params());
    let raster = &result.benefit_raster;

    let inside: Vec<(usize, usize)> = (0..12)
        .flat_map(|r| (0..10).map(move |c| (r, c)))
        .filter(|&(r, c)| raster.get(r, c).unwrap() != BENEFIT_NODATA)
        .collect();
    assert_eq!(inside.len(), 15);
    assert!(inside.contains(&(0, 4)));
    assert!(inside.contains(&(0, 5)));
    assert!(inside.contains(&(7, 4)));
    assert!(!inside.contains(&(0, 3)));
    assert!(!inside.contains(&(7, 5)));
    assert!(!inside.contains(&(8, 4)));

    let total: f64 = inside.iter().map(|&(r, c)| raster.get(r, c).unwrap()).sum();
    assert_relative_eq!(total, result.summary.sediment_reduction_tonnes, max_relative = 1e-9);
}

#[test]
fn reductions_are_non_negative_for_improving_scenarios() {
    for &(c_after, p_after, eff) in &[
        (0.3, 0.5, 0.0),
        (0.1, 0.5, 0.2),
        (0.05, 0.2, 0.7),
        (0.0, 0.0, 1.0),
    ] {
        let params = ScenarioParameters {
            cover_management_after: c_after,
            support_practices_after: p_after,
            efficiencies: Efficiencies {
                sediment: eff,
                nitrogen: eff,
                phosphorus: eff,
            },
            ..fixture_params()
        };
        let s = run(&params).summary;
        assert!(s.sediment_reduction_tonnes >= 0.0);
        assert!(s.nitrogen_reduction_kg >= 0.0);
        assert!(s.phosphorus_reduction_kg >= 0.0);
    }
}

#[test]
fn catchment_is_never_smaller_than_the_wetland() {
    let result = run(&fixture_params());
    assert!(result.terrain.catchment_hectares >= result.terrain.area_hectares);
    assert!((0.0..=90.0).contains(&result.terrain.average_slope));
}
