//! Per-job terrain analysis context
//!
//! One [`TerrainAnalysis`] owns every grid derived for a single request.
//! Nothing here is shared between jobs.

use crate::erosion::ls_grid;
use crate::hydrology::{
    delineate_catchment, flow_accumulation, flow_direction, Catchment, FlowDirectionParams,
};
use crate::terrain::{slope, SlopeParams};
use serde::{Deserialize, Serialize};
use wetland_core::raster::Raster;
use wetland_core::{Error, Result};

/// Grids derived from one elevation grid and wetland footprint
#[derive(Debug, Clone)]
pub struct TerrainAnalysis {
    pub dem: Raster<f64>,
    /// Slope in degrees
    pub slope: Raster<f64>,
    pub flow_direction: Raster<u8>,
    /// Upstream cells, self included
    pub accumulation: Raster<f64>,
    pub ls_factor: Raster<f64>,
    pub footprint: Raster<u8>,
    pub catchment: Catchment,
}

/// Scalar terrain statistics over the catchment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainSummary {
    /// Wetland polygon area (ha)
    pub area_hectares: f64,
    /// Catchment area (ha)
    pub catchment_hectares: f64,
    /// Mean slope over the catchment (degrees)
    pub average_slope: f64,
    /// Maximum slope over the catchment (degrees)
    pub max_slope: f64,
    /// Mean LS factor over the catchment
    pub mean_ls_factor: f64,
    /// Working cell size (m)
    pub cell_size: f64,
    /// Working CRS identifier, e.g. `EPSG:32760`
    pub crs: Option<String>,
    pub catchment_cells: usize,
    /// Outlet cell as (row, col)
    pub outlet: (usize, usize),
}

impl TerrainAnalysis {
    /// Derive slope, routing, accumulation, LS and the catchment.
    ///
    /// `footprint` must be aligned with `dem` (see
    /// `ProjectedPolygon::footprint`).
    pub fn run(dem: Raster<f64>, footprint: Raster<u8>) -> Result<Self> {
        if dem.shape() != footprint.shape() {
            let (er, ec) = dem.shape();
            let (ar, ac) = footprint.shape();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }

        let slope = slope(&dem, SlopeParams::default())?;
        let flow_direction = flow_direction(&dem, FlowDirectionParams::default())?;
        let accumulation = flow_accumulation(&flow_direction)?;
        let ls_factor = ls_grid(&slope, &accumulation)?;
        let catchment = delineate_catchment(&dem, &flow_direction, &accumulation, &footprint)?;

        Ok(Self {
            dem,
            slope,
            flow_direction,
            accumulation,
            ls_factor,
            footprint,
            catchment,
        })
    }

    /// Catchment statistics; `area_hectares` is the wetland polygon area.
    ///
    /// Fails if no catchment cell has a defined slope.
    pub fn summary(&self, area_hectares: f64) -> Result<TerrainSummary> {
        let mask = &self.catchment.mask;
        let mut slope_sum = 0.0;
        let mut slope_max = f64::NEG_INFINITY;
        let mut slope_count = 0usize;
        let mut ls_sum = 0.0;
        let mut ls_count = 0usize;

        for ((&m, &s), &ls) in mask
            .data()
            .iter()
            .zip(self.slope.data().iter())
            .zip(self.ls_factor.data().iter())
        {
            if m == 0 {
                continue;
            }
            if !s.is_nan() {
                slope_sum += s;
                slope_max = slope_max.max(s);
                slope_count += 1;
            }
            if !ls.is_nan() {
                ls_sum += ls;
                ls_count += 1;
            }
        }

        if slope_count == 0 {
            return Err(Error::Algorithm(
                "degenerate slope field: no catchment cell has a defined slope".into(),
            ));
        }

        Ok(TerrainSummary {
            area_hectares,
            catchment_hectares: self.catchment.area_hectares(),
            average_slope: slope_sum / slope_count as f64,
            max_slope: slope_max,
            mean_ls_factor: if ls_count > 0 { ls_sum / ls_count as f64 } else { 0.0 },
            cell_size: self.dem.cell_size(),
            crs: self.dem.crs().map(|c| c.identifier()),
            catchment_cells: self.catchment.cell_count,
            outlet: self.catchment.outlet,
        })
    }
}
