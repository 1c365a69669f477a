//! Slope calculation from elevation grids
//!
//! Fits a plane through each cell and its valid 8-neighbours by weighted
//! least squares, using Horn (1981) weights (2 for cardinal neighbours, 1 for
//! diagonals). With a complete interior neighbourhood the fit is exactly
//! Horn's method; at grid edges and next to no-data it uses whatever
//! neighbours remain.

use crate::maybe_rayon::*;
use wetland_core::raster::{d8, Raster};
use wetland_core::{Algorithm, Error, Result};

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent rise (0-infinity)
    Percent,
    /// Radians (0-π/2)
    Radians,
}

/// Parameters for slope calculation
#[derive(Debug, Clone, Default)]
pub struct SlopeParams {
    /// Output units
    pub units: SlopeUnits,
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Calculate slope from an elevation grid with a Horn-weighted plane fit"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, params)
    }
}

/// Calculate slope from an elevation grid.
///
/// For each valid cell `e` with valid neighbours `z_k` at planar offsets
/// `(dx_k, dy_k)` and weights `w_k`, solves
///
/// ```text
/// | Σw dx²   Σw dx dy | |p|   | Σw dx dz |
/// | Σw dx dy Σw dy²   | |q| = | Σw dy dz |      dz = z_k - e
/// ```
///
/// and returns `atan(sqrt(p² + q²))`. When the neighbours are collinear with
/// the centre (a one-cell-wide strip) each axis is estimated on its own.
///
/// Cells that are no-data, or that have no valid neighbour, are NaN.
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    let gt = dem.transform();
    let (px, py) = (gt.pixel_width.abs(), gt.pixel_height.abs());
    if !(px > 0.0 && py > 0.0) {
        return Err(Error::Algorithm(format!(
            "slope needs a positive cell size, got {} x {}",
            px, py
        )));
    }

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let e = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(e) {
                    continue;
                }

                let Some(gradient) = plane_gradient(dem, row, col, e, px, py) else {
                    continue;
                };

                let slope_rad = gradient.atan();
                *out = match params.units {
                    SlopeUnits::Degrees => slope_rad.to_degrees(),
                    SlopeUnits::Percent => gradient * 100.0,
                    SlopeUnits::Radians => slope_rad,
                };
            }

            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<f64>();
    output.set_nodata(Some(f64::NAN));
    output.replace_data(
        ndarray::Array2::from_shape_vec((rows, cols), output_data)
            .map_err(|e| Error::Other(e.to_string()))?,
    )?;

    Ok(output)
}

/// Gradient magnitude (rise over run) of the weighted plane at one cell
fn plane_gradient(dem: &Raster<f64>, row: usize, col: usize, e: f64, px: f64, py: f64) -> Option<f64> {
    let (mut sxx, mut sxy, mut syy, mut sxz, mut syz) = (0.0, 0.0, 0.0, 0.0, 0.0);
    let mut valid = 0;

    for code in 1..=8u8 {
        let (dr, dc) = d8::OFFSETS[code as usize];
        let Some((nr, nc)) = dem.offset(row, col, dr, dc) else {
            continue;
        };
        let z = unsafe { dem.get_unchecked(nr, nc) };
        if dem.is_nodata(z) {
            continue;
        }

        let w = if dr == 0 || dc == 0 { 2.0 } else { 1.0 };
        // x grows east, y grows north
        let dx = dc as f64 * px;
        let dy = -(dr as f64) * py;
        let dz = z - e;

        sxx += w * dx * dx;
        sxy += w * dx * dy;
        syy += w * dy * dy;
        sxz += w * dx * dz;
        syz += w * dy * dz;
        valid += 1;
    }

    if valid == 0 {
        return None;
    }

    let det = sxx * syy - sxy * sxy;
    let (p, q) = if det > 1e-12 * sxx * syy {
        ((sxz * syy - syz * sxy) / det, (syz * sxx - sxz * sxy) / det)
    } else {
        let p = if sxx > 0.0 { sxz / sxx } else { 0.0 };
        let q = if syy > 0.0 { syz / syy } else { 0.0 };
        (p, q)
    };

    Some((p * p + q * q).sqrt())
}
