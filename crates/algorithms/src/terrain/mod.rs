//! Terrain analysis algorithms
//!
//! Surface derivatives computed from the working elevation grid.

mod slope;

pub use slope::{slope, Slope, SlopeParams, SlopeUnits};
