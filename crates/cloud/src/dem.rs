//! Elevation acquisition: request planning, fetching and validation.
//!
//! A job asks for one square-pixel grid in the UTM zone of the wetland,
//! padded around the polygon so the catchment can extend past its edge.
//! The payload is checked (decodable, georeferenced, covering the padded
//! extent, not all no-data) and cropped or resampled onto the requested grid.

use crate::error::{CloudError, Result};
use crate::export::{export_image_url, EXPORT_NODATA};
use crate::http::HttpClient;
use crate::reproject::{is_wgs84, UtmProjection};
use async_trait::async_trait;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use wetland_core::io::read_geotiff_from_buffer;
use wetland_core::vector::ProjectedPolygon;
use wetland_core::{GeoTransform, Raster, WetlandPolygon, CRS};

/// No-data value of every working elevation grid
pub const DEM_NODATA: f64 = EXPORT_NODATA;

/// Minimum padding around the polygon, in cells
const MIN_BUFFER_CELLS: f64 = 3.0;

/// Largest side requested by the connectivity probe
const PROBE_MAX_DIM: usize = 256;

/// Acquisition settings shared by every job.
#[derive(Debug, Clone)]
pub struct AcquisitionOptions {
    /// Target working resolution (m)
    pub cell_size: f64,
    /// Largest grid side; the cell size grows to respect it
    pub max_grid_dim: usize,
    /// Padding on each side as a fraction of the polygon's larger extent
    pub buffer_fraction: f64,
    /// Force a UTM zone instead of the one containing the polygon centroid
    pub working_epsg: Option<u32>,
    /// Export request timeout
    pub timeout: Duration,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self {
            cell_size: 10.0,
            max_grid_dim: 1024,
            buffer_fraction: 0.5,
            working_epsg: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl AcquisitionOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(
                wetland_core::Error::invalid_parameter("cell_size", self.cell_size, "must be positive")
                    .into(),
            );
        }
        if self.max_grid_dim < 8 {
            return Err(wetland_core::Error::invalid_parameter(
                "max_grid_dim",
                self.max_grid_dim,
                "must be at least 8",
            )
            .into());
        }
        if !(self.buffer_fraction.is_finite() && self.buffer_fraction >= 0.0) {
            return Err(wetland_core::Error::invalid_parameter(
                "buffer_fraction",
                self.buffer_fraction,
                "must be finite and non-negative",
            )
            .into());
        }
        Ok(())
    }
}

/// One export request: a north-up grid in a UTM working CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct DemRequest {
    pub projection: UtmProjection,
    /// Requested extent (min_x, min_y, max_x, max_y), snapped to `cell_size`
    pub bounds: (f64, f64, f64, f64),
    /// Extent of the projected polygon
    pub polygon_bounds: (f64, f64, f64, f64),
    pub cols: usize,
    pub rows: usize,
    pub cell_size: f64,
}

impl DemRequest {
    /// Plan the request for `polygon`.
    pub fn plan(polygon: &WetlandPolygon, options: &AcquisitionOptions) -> Result<Self> {
        options.validate()?;

        let projection = match options.working_epsg {
            Some(epsg) => UtmProjection::from_epsg(epsg).ok_or_else(|| {
                CloudError::UnsupportedCrs(format!("EPSG:{epsg} is not a WGS84 UTM zone"))
            })?,
            None => {
                let (lon, lat) = polygon.centroid();
                UtmProjection::for_lonlat(lon, lat)
            }
        };

        let polygon_bounds = project_polygon(polygon, projection).bounds();
        let (min_x, min_y, max_x, max_y) = polygon_bounds;
        let extent = (max_x - min_x).max(max_y - min_y);
        let pad = (extent * options.buffer_fraction).max(MIN_BUFFER_CELLS * options.cell_size);

        // One cell of slack for snapping keeps both sides within max_grid_dim
        let padded = extent + 2.0 * pad;
        let cell_size = options
            .cell_size
            .max(padded / (options.max_grid_dim - 1) as f64);

        let x0 = ((min_x - pad) / cell_size).floor() * cell_size;
        let y1 = ((max_y + pad) / cell_size).ceil() * cell_size;
        let cols = (((max_x + pad) - x0) / cell_size).ceil().max(1.0) as usize;
        let rows = ((y1 - (min_y - pad)) / cell_size).ceil().max(1.0) as usize;

        Ok(Self {
            projection,
            bounds: (
                x0,
                y1 - rows as f64 * cell_size,
                x0 + cols as f64 * cell_size,
                y1,
            ),
            polygon_bounds,
            cols,
            rows,
            cell_size,
        })
    }

    pub fn epsg(&self) -> u32 {
        self.projection.epsg()
    }

    pub fn crs(&self) -> CRS {
        self.projection.crs()
    }

    /// Geotransform of the requested grid
    pub fn transform(&self) -> GeoTransform {
        GeoTransform::new(self.bounds.0, self.bounds.3, self.cell_size, -self.cell_size)
    }

    /// Same extent at no more than [`PROBE_MAX_DIM`] cells per side
    pub fn probe(&self) -> Self {
        let cols = self.cols.min(PROBE_MAX_DIM);
        let rows = self.rows.min(PROBE_MAX_DIM);
        let (min_x, min_y, max_x, max_y) = self.bounds;
        Self {
            cols,
            rows,
            cell_size: ((max_x - min_x) / cols as f64).max((max_y - min_y) / rows as f64),
            ..self.clone()
        }
    }
}

/// Project a WGS84 polygon into a UTM zone
pub fn project_polygon(polygon: &WetlandPolygon, projection: UtmProjection) -> ProjectedPolygon {
    polygon.project(projection.crs(), |lon, lat| projection.forward(lon, lat))
}

/// Anything that can hand back the raw bytes of an elevation payload.
#[async_trait]
pub trait DemSource: Send + Sync {
    /// Fetch the payload for `request` from `dem_url`.
    async fn fetch(&self, dem_url: &str, request: &DemRequest) -> Result<Vec<u8>>;
}

/// Where a `dem_url` points
#[derive(Debug, Clone, PartialEq)]
pub enum DemLocation {
    /// An export service, queried per request
    Remote(Url),
    /// A GeoTIFF on local disk, used as-is
    Local(PathBuf),
}

impl DemLocation {
    /// Classify a user-supplied DEM reference.
    ///
    /// `file://` URLs and existing paths are local; `http(s)` URLs are
    /// export services; anything else is rejected.
    pub fn parse(dem_url: &str) -> Result<Self> {
        let trimmed = dem_url.trim();
        if trimmed.is_empty() {
            return Err(CloudError::InvalidUrl("empty DEM URL".into()));
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("file://") {
            let url = Url::parse(trimmed)
                .map_err(|e| CloudError::InvalidUrl(format!("{trimmed}: {e}")))?;
            let path = url
                .to_file_path()
                .map_err(|_| CloudError::InvalidUrl(format!("{trimmed}: not a local file path")))?;
            return Ok(Self::Local(path));
        }
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(trimmed)
                .map_err(|e| CloudError::InvalidUrl(format!("{trimmed}: {e}")))?;
            return Ok(Self::Remote(url));
        }
        if Path::new(trimmed).exists() {
            return Ok(Self::Local(PathBuf::from(trimmed)));
        }

        Err(CloudError::InvalidUrl(format!(
            "{trimmed}: expected an http(s) export service, a file:// URL or an existing path"
        )))
    }
}

/// Export-service and local-file DEM source.
#[derive(Debug, Clone)]
pub struct HttpDemSource {
    client: HttpClient,
}

impl HttpDemSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(timeout)?,
        })
    }
}

#[async_trait]
impl DemSource for HttpDemSource {
    async fn fetch(&self, dem_url: &str, request: &DemRequest) -> Result<Vec<u8>> {
        match DemLocation::parse(dem_url)? {
            DemLocation::Local(path) => {
                info!(path = %path.display(), "reading local DEM");
                Ok(tokio::fs::read(&path).await?)
            }
            DemLocation::Remote(base) => {
                let url = export_image_url(base.as_str(), request)?;
                info!(
                    service = %base,
                    epsg = request.epsg(),
                    size = %format!("{}x{}", request.cols, request.rows),
                    "requesting DEM export"
                );
                self.client.get_bytes(&url).await
            }
        }
    }
}

/// A validated elevation grid and the polygon in the same working CRS.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    pub dem: Raster<f64>,
    pub polygon: ProjectedPolygon,
    pub projection: UtmProjection,
}

/// Fetch the payload for `request`, bounded by `timeout`.
pub async fn fetch_payload(
    source: &dyn DemSource,
    dem_url: &str,
    request: &DemRequest,
    timeout: Duration,
) -> Result<Vec<u8>> {
    match tokio::time::timeout(timeout, source.fetch(dem_url, request)).await {
        Ok(result) => result,
        Err(_) => Err(CloudError::Timeout(timeout.as_secs())),
    }
}

/// Fetch, validate and align the elevation grid for one job.
///
/// Only the fetch is bounded by the acquisition timeout. Decoding and
/// resampling run on the blocking pool.
pub async fn acquire(
    source: &dyn DemSource,
    dem_url: &str,
    polygon: &WetlandPolygon,
    options: &AcquisitionOptions,
) -> Result<ElevationGrid> {
    let request = DemRequest::plan(polygon, options)?;
    let bytes = fetch_payload(source, dem_url, &request, options.timeout).await?;

    let polygon = polygon.clone();
    let grid = tokio::task::spawn_blocking(move || prepare_elevation(&bytes, &polygon, &request))
        .await
        .map_err(|e| CloudError::Worker(e.to_string()))??;

    let (rows, cols) = grid.dem.shape();
    info!(
        rows,
        cols,
        cell_size = grid.dem.cell_size(),
        epsg = grid.projection.epsg(),
        "elevation grid ready"
    );
    Ok(grid)
}

/// Connectivity probe: fetch a small export of the polygon's extent and
/// return its size in bytes. Nothing is decoded.
pub async fn probe(
    source: &dyn DemSource,
    dem_url: &str,
    polygon: &WetlandPolygon,
    options: &AcquisitionOptions,
) -> Result<usize> {
    let request = DemRequest::plan(polygon, options)?.probe();
    let bytes = fetch_payload(source, dem_url, &request, options.timeout).await?;
    if bytes.is_empty() {
        return Err(CloudError::EmptyPayload);
    }
    debug!(bytes = bytes.len(), "probe succeeded");
    Ok(bytes.len())
}

/// Coordinate system a georeferenced payload is sampled in
#[derive(Debug, Clone, Copy)]
enum PayloadCrs {
    /// The request's own UTM zone
    Working,
    /// Another UTM zone
    Zone(UtmProjection),
    /// WGS84 longitude/latitude
    Geographic,
}

impl PayloadCrs {
    /// Payload coordinates of a point in the working CRS
    fn locate(self, working: UtmProjection, x: f64, y: f64) -> (f64, f64) {
        match self {
            Self::Working => (x, y),
            Self::Zone(zone) => {
                let (lon, lat) = working.inverse(x, y);
                zone.forward(lon, lat)
            }
            Self::Geographic => working.inverse(x, y),
        }
    }
}

/// Decode and validate a payload, then bring it onto the requested grid.
///
/// The result always has the request's shape, transform and CRS:
/// - no georeferencing: the payload must have the requested shape and takes
///   the requested grid
/// - georeferenced without a CRS: assumed to be in the requested CRS
/// - the requested UTM zone on an aligned grid of the same cell size:
///   cropped to the request window
/// - any other UTM zone or cell size, or WGS84 geographic: resampled
/// - any other CRS: rejected
///
/// A georeferenced payload must cover the whole requested extent.
pub fn prepare_elevation(
    bytes: &[u8],
    polygon: &WetlandPolygon,
    request: &DemRequest,
) -> Result<ElevationGrid> {
    if bytes.is_empty() {
        return Err(CloudError::EmptyPayload);
    }

    let mut dem: Raster<f64> = read_geotiff_from_buffer(bytes)
        .map_err(|e| CloudError::MalformedRaster(e.to_string()))?;

    let georeferenced = dem.crs().is_some() || *dem.transform() != GeoTransform::default();
    let dem = if !georeferenced {
        if dem.shape() != (request.rows, request.cols) {
            let (rows, cols) = dem.shape();
            return Err(CloudError::MalformedRaster(format!(
                "payload has no georeferencing and its {rows}x{cols} grid differs from the requested {}x{}",
                request.rows, request.cols
            )));
        }
        normalise_nodata(&mut dem);
        dem.set_transform(request.transform());
        dem.set_crs(Some(request.crs()));
        dem
    } else {
        let gt = dem.transform();
        let square = (gt.pixel_width.abs() - gt.pixel_height.abs()).abs() <= gt.pixel_width.abs() * 1e-6;
        if !gt.is_north_up() || !(gt.pixel_width.is_finite() && gt.pixel_width > 0.0) || !square {
            return Err(CloudError::MalformedRaster(
                "rotated, flipped or non-square geotransform".into(),
            ));
        }

        let payload_crs = match dem.crs().and_then(|c| c.epsg()) {
            None => PayloadCrs::Working,
            Some(epsg) if is_wgs84(epsg) => PayloadCrs::Geographic,
            Some(epsg) => match UtmProjection::from_epsg(epsg) {
                Some(zone) if zone == request.projection => PayloadCrs::Working,
                Some(zone) => PayloadCrs::Zone(zone),
                None => {
                    return Err(CloudError::CrsMismatch {
                        expected: request.crs().identifier(),
                        found: format!("EPSG:{epsg}"),
                    })
                }
            },
        };

        check_coverage(&dem, request, payload_crs)?;
        normalise_nodata(&mut dem);

        match (payload_crs, request_window(&dem, request)) {
            (PayloadCrs::Working, Some(origin)) => crop(&dem, request, origin)?,
            _ => {
                debug!(?payload_crs, "resampling DEM onto the working grid");
                resample(&dem, request, payload_crs)?
            }
        }
    };

    if dem.data().iter().all(|&v| dem.is_nodata(v)) {
        return Err(CloudError::AllNoData);
    }

    Ok(ElevationGrid {
        dem,
        polygon: project_polygon(polygon, request.projection),
        projection: request.projection,
    })
}

/// NaN and the declared sentinel both become [`DEM_NODATA`]
fn normalise_nodata(dem: &mut Raster<f64>) {
    let declared = dem.nodata();
    for v in dem.data_mut().iter_mut() {
        if v.is_nan() || declared.is_some_and(|nd| (*v - nd).abs() < f64::EPSILON * 100.0) {
            *v = DEM_NODATA;
        }
    }
    dem.set_nodata(Some(DEM_NODATA));
}

/// The outer ring of requested cell centres must fall inside the payload,
/// give or take half a payload cell.
fn check_coverage(dem: &Raster<f64>, request: &DemRequest, payload_crs: PayloadCrs) -> Result<()> {
    let (min_x, min_y, max_x, max_y) = dem.bounds();
    let tol = dem.cell_size() * 0.5;

    let (x0, y0, x1, y1) = request.bounds;
    let half = request.cell_size * 0.5;
    let xs = [x0 + half, (x0 + x1) * 0.5, x1 - half];
    let ys = [y0 + half, (y0 + y1) * 0.5, y1 - half];

    for &x in &xs {
        for &y in &ys {
            let (px, py) = payload_crs.locate(request.projection, x, y);
            if px < min_x - tol || px > max_x + tol || py < min_y - tol || py > max_y + tol {
                return Err(CloudError::ExtentNotCovered(format!(
                    "requested extent ({x0:.1}, {y0:.1})-({x1:.1}, {y1:.1}) reaches ({px:.4}, {py:.4}) but the raster covers ({min_x:.4}, {min_y:.4})-({max_x:.4}, {max_y:.4})"
                )));
            }
        }
    }
    Ok(())
}

/// Top-left (row, col) of the request window when the payload grid has the
/// requested cell size, is aligned with it, and contains it.
fn request_window(dem: &Raster<f64>, request: &DemRequest) -> Option<(usize, usize)> {
    let gt = dem.transform();
    if (gt.pixel_width - request.cell_size).abs() > request.cell_size * 1e-6 {
        return None;
    }

    let col = (request.bounds.0 - gt.origin_x) / request.cell_size;
    let row = (gt.origin_y - request.bounds.3) / request.cell_size;
    if (col - col.round()).abs() > 1e-6 || (row - row.round()).abs() > 1e-6 {
        return None;
    }
    let (col, row) = (col.round(), row.round());
    if col < 0.0 || row < 0.0 {
        return None;
    }

    let (col, row) = (col as usize, row as usize);
    let (rows, cols) = dem.shape();
    (row + request.rows <= rows && col + request.cols <= cols).then_some((row, col))
}

fn crop(dem: &Raster<f64>, request: &DemRequest, (row, col): (usize, usize)) -> Result<Raster<f64>> {
    let mut data = Vec::with_capacity(request.rows * request.cols);
    for r in row..row + request.rows {
        for c in col..col + request.cols {
            data.push(dem.data()[[r, c]]);
        }
    }
    let mut out = Raster::from_vec(data, request.rows, request.cols)
        .map_err(|e| CloudError::MalformedRaster(e.to_string()))?;
    out.set_transform(request.transform());
    out.set_crs(Some(request.crs()));
    out.set_nodata(Some(DEM_NODATA));
    Ok(out)
}

/// Bilinear resampling of the payload onto the requested grid.
///
/// Falls back to the nearest sample when any of the four neighbours is
/// no-data; target cells outside the payload are no-data.
fn resample(src: &Raster<f64>, request: &DemRequest, payload_crs: PayloadCrs) -> Result<Raster<f64>> {
    let transform = request.transform();
    let (src_rows, src_cols) = src.shape();
    let sample = |r: usize, c: usize| -> Option<f64> {
        let v = src.data()[[r, c]];
        (!src.is_nodata(v)).then_some(v)
    };

    let mut data = Vec::with_capacity(request.rows * request.cols);
    for row in 0..request.rows {
        for col in 0..request.cols {
            let (x, y) = transform.pixel_to_geo(col, row);
            let (sx, sy) = payload_crs.locate(request.projection, x, y);
            let (fc, fr) = src.geo_to_pixel(sx, sy);

            if !(fc >= 0.0 && fr >= 0.0 && fc < src_cols as f64 && fr < src_rows as f64) {
                data.push(DEM_NODATA);
                continue;
            }

            // Continuous index relative to cell centres
            let (cx, cy) = (fc - 0.5, fr - 0.5);
            let c0 = cx.floor().max(0.0) as usize;
            let r0 = cy.floor().max(0.0) as usize;
            let c1 = (c0 + 1).min(src_cols - 1);
            let r1 = (r0 + 1).min(src_rows - 1);
            let tx = (cx - c0 as f64).clamp(0.0, 1.0);
            let ty = (cy - r0 as f64).clamp(0.0, 1.0);

            let value = match (sample(r0, c0), sample(r0, c1), sample(r1, c0), sample(r1, c1)) {
                (Some(v00), Some(v01), Some(v10), Some(v11)) => {
                    let top = v00 + (v01 - v00) * tx;
                    let bottom = v10 + (v11 - v10) * tx;
                    top + (bottom - top) * ty
                }
                _ => sample(fr.floor() as usize, fc.floor() as usize).unwrap_or(DEM_NODATA),
            };
            data.push(value);
        }
    }

    let mut out = Raster::from_vec(data, request.rows, request.cols)
        .map_err(|e| CloudError::MalformedRaster(e.to_string()))?;
    out.set_transform(transform);
    out.set_crs(Some(request.crs()));
    out.set_nodata(Some(DEM_NODATA));
    Ok(out)
}
