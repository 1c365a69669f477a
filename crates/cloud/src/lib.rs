//! # Wetland Cloud
//!
//! Elevation acquisition for the wetland benefit engine.
//!
//! Plans one export request per job (UTM working grid, padded around the
//! wetland polygon), fetches it from an ArcGIS-style image service or a
//! local GeoTIFF, and validates the payload before any terrain work runs.

pub mod dem;
pub mod error;
pub mod export;
pub mod http;
pub mod reproject;

pub use dem::{
    acquire, fetch_payload, probe, AcquisitionOptions, DemLocation, DemRequest, DemSource, ElevationGrid,
    HttpDemSource, DEM_NODATA,
};
pub use error::{CloudError, Result};
pub use reproject::UtmProjection;
