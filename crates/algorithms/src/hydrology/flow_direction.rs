//! D8 flow direction algorithm
//!
//! Routes every cell to its steepest downslope neighbour using the D8
//! (deterministic eight-node) method, then drains flats toward the nearest
//! cell that already has an outlet.
//!
//! Flow direction encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = sink (pit or unresolved flat), 1-8 = direction to the receiving
//! neighbour, 255 = no data.

use crate::maybe_rayon::*;
use ndarray::Array2;
use std::collections::VecDeque;
use wetland_core::raster::{d8, Raster};
use wetland_core::{Algorithm, Error, Result};

/// Parameters for flow direction
#[derive(Debug, Clone)]
pub struct FlowDirectionParams {
    /// Drain flats toward the nearest cell with a downslope outlet
    pub resolve_flats: bool,
}

impl Default for FlowDirectionParams {
    fn default() -> Self {
        Self {
            resolve_flats: true,
        }
    }
}

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = FlowDirectionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "Calculate D8 flow direction with deterministic tie-breaking and flat resolution"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        flow_direction(&input, params)
    }
}

/// Calculate D8 flow direction from an elevation grid.
///
/// Neighbours are examined in [`d8::PRIORITY`] order and a later neighbour
/// only replaces the current choice if its drop is strictly greater, so
/// exact ties always go to the earlier direction. Neighbours that are off
/// the grid or no-data never receive flow.
///
/// With `resolve_flats`, cells that have no lower neighbour are reached by a
/// breadth-first search over equal-elevation neighbours, seeded in row-major
/// order with every cell that already drains. Each flat cell points at the
/// cell it was reached from. Every pointer therefore leads to a cell that
/// drained before it, and the routing graph has no cycles. Flats that touch
/// no draining cell of the same elevation, and true pits, stay [`d8::SINK`].
pub fn flow_direction(dem: &Raster<f64>, params: FlowDirectionParams) -> Result<Raster<u8>> {
    let (rows, cols) = dem.shape();
    let gt = dem.transform();
    let (px, py) = (gt.pixel_width.abs(), gt.pixel_height.abs());

    let mut distances = [0.0f64; 9];
    for code in 1..=8usize {
        let (dr, dc) = d8::OFFSETS[code];
        distances[code] = (dc as f64 * px).hypot(dr as f64 * py);
    }

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![d8::NO_DATA; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let center = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(center) {
                    continue;
                }

                let mut max_drop = 0.0_f64;
                let mut best_dir = d8::SINK;

                for &code in d8::PRIORITY.iter() {
                    let (dr, dc) = d8::OFFSETS[code as usize];
                    let Some((nr, nc)) = dem.offset(row, col, dr, dc) else {
                        continue;
                    };

                    let neighbor = unsafe { dem.get_unchecked(nr, nc) };
                    if dem.is_nodata(neighbor) {
                        continue;
                    }

                    let drop = (center - neighbor) / distances[code as usize];
                    if drop > max_drop {
                        max_drop = drop;
                        best_dir = code;
                    }
                }

                *out = best_dir;
            }

            row_data
        })
        .collect();

    let mut directions = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    if params.resolve_flats {
        resolve_flats(dem, &mut directions);
    }

    let mut output = dem.with_same_meta::<u8>();
    output.set_nodata(Some(d8::NO_DATA));
    output.replace_data(directions)?;

    Ok(output)
}

/// Drain sink cells through equal-elevation neighbours that already drain
fn resolve_flats(dem: &Raster<f64>, directions: &mut Array2<u8>) {
    let (rows, cols) = directions.dim();
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            if d8::is_flowing(directions[(row, col)]) {
                queue.push_back((row, col));
            }
        }
    }

    while let Some((row, col)) = queue.pop_front() {
        let elevation = unsafe { dem.get_unchecked(row, col) };

        for &code in d8::PRIORITY.iter() {
            let (dr, dc) = d8::OFFSETS[code as usize];
            let Some((nr, nc)) = dem.offset(row, col, dr, dc) else {
                continue;
            };

            if directions[(nr, nc)] != d8::SINK {
                continue;
            }
            let neighbor = unsafe { dem.get_unchecked(nr, nc) };
            if neighbor != elevation {
                continue;
            }

            // The flat cell drains back toward the cell that reached it
            directions[(nr, nc)] = d8::opposite(code);
            queue.push_back((nr, nc));
        }
    }
}
