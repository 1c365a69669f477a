//! Hydrological analysis algorithms
//!
//! Single-flow-direction routing on the working elevation grid:
//! - Flow direction: D8 steepest descent with flat resolution
//! - Flow accumulation: upstream contributing cells
//! - Catchment: outlet selection and upstream delineation for a footprint

mod catchment;
pub(crate) mod flow_accumulation;
pub(crate) mod flow_direction;

pub use catchment::{delineate_catchment, find_outlet, Catchment};
pub use flow_accumulation::{flow_accumulation, FlowAccumulation};
pub use flow_direction::{flow_direction, FlowDirection, FlowDirectionParams};
