//! Flow accumulation algorithm
//!
//! Counts, for every cell, the cells whose D8 flow path passes through it,
//! the cell itself included. This is the upstream contributing area in cell
//! units.

use ndarray::Array2;
use std::collections::VecDeque;
use wetland_core::raster::{d8, Raster};
use wetland_core::{Algorithm, Error, Result};

/// Flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulation;

impl Algorithm for FlowAccumulation {
    type Input = Raster<u8>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Calculate upstream contributing cells from D8 flow direction"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_accumulation(&input)
    }
}

/// Calculate flow accumulation from a D8 flow direction raster.
///
/// Every valid cell is 1 plus the accumulation of the cells draining into
/// it; headwater cells are 1. Sinks keep their value and pass nothing on.
/// No-data cells ([`d8::NO_DATA`]) are NaN.
///
/// # Algorithm
/// Kahn's topological sort with an explicit FIFO queue:
/// 1. Count incoming flows for each cell (in-degree)
/// 2. Seed the queue, in row-major order, with cells of in-degree 0
/// 3. Pop a cell, add its total to its receiver, and enqueue the receiver
///    once all of its contributors are done
///
/// No cell is summed before all of its contributors, there is no recursion,
/// and the processing order is fixed for a given direction grid.
///
/// Fails if the direction grid contains a cycle, which `flow_direction`
/// never produces.
pub fn flow_accumulation(flow_dir: &Raster<u8>) -> Result<Raster<f64>> {
    let (rows, cols) = flow_dir.shape();

    let receiver = |row: usize, col: usize| -> Option<(usize, usize)> {
        let dir = unsafe { flow_dir.get_unchecked(row, col) };
        if !d8::is_flowing(dir) {
            return None;
        }
        let (dr, dc) = d8::OFFSETS[dir as usize];
        let (nr, nc) = flow_dir.offset(row, col, dr, dc)?;
        // Flow into no-data is treated as leaving the grid
        if unsafe { flow_dir.get_unchecked(nr, nc) } == d8::NO_DATA {
            return None;
        }
        Some((nr, nc))
    };

    // Step 1: in-degree of every cell
    let mut in_degree = Array2::<u32>::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            if let Some(target) = receiver(row, col) {
                in_degree[target] += 1;
            }
        }
    }

    // Step 2: headwater cells, row-major
    let mut accumulation = Array2::<f64>::from_elem((rows, cols), 1.0);
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    let mut valid = 0usize;

    for row in 0..rows {
        for col in 0..cols {
            if unsafe { flow_dir.get_unchecked(row, col) } == d8::NO_DATA {
                accumulation[(row, col)] = f64::NAN;
                continue;
            }
            valid += 1;
            if in_degree[(row, col)] == 0 {
                queue.push_back((row, col));
            }
        }
    }

    // Step 3: propagate downstream
    let mut processed = 0usize;
    while let Some((row, col)) = queue.pop_front() {
        processed += 1;

        let Some(target) = receiver(row, col) else {
            continue;
        };

        accumulation[target] += accumulation[(row, col)];
        in_degree[target] -= 1;
        if in_degree[target] == 0 {
            queue.push_back(target);
        }
    }

    if processed != valid {
        return Err(Error::Algorithm(format!(
            "flow direction grid contains a cycle ({} of {} cells routed)",
            processed, valid
        )));
    }

    let mut output = flow_dir.with_same_meta::<f64>();
    output.set_nodata(Some(f64::NAN));
    output.replace_data(accumulation)?;

    Ok(output)
}
