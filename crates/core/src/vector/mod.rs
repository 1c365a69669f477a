//! Wetland boundary polygons
//!
//! A [`WetlandPolygon`] is parsed from GeoJSON in WGS84 longitude/latitude
//! and validated once (closed, simple, at least three distinct vertices).
//! Projecting it onto the working grid yields a [`ProjectedPolygon`], which
//! knows its planar area and which grid cells it covers.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};
use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BoundingRect, Centroid, Intersects, MapCoords};
use geo_types::{Coord, Line, LineString, Polygon, Rect};
use geojson::{GeoJson, Value as GeoValue};

/// Validated wetland boundary in geographic coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct WetlandPolygon {
    polygon: Polygon<f64>,
}

impl WetlandPolygon {
    /// Parse and validate a GeoJSON object.
    ///
    /// Accepts a `Polygon` geometry, a `Feature` wrapping one, a
    /// `FeatureCollection` (first feature is used), or a `MultiPolygon`
    /// with exactly one member.
    pub fn from_geojson(value: &serde_json::Value) -> Result<Self> {
        let geojson = GeoJson::from_json_value(value.clone())
            .map_err(|e| Error::InvalidGeometry(format!("not valid GeoJSON: {}", e)))?;

        let geometry = match geojson {
            GeoJson::Geometry(g) => g,
            GeoJson::Feature(f) => f
                .geometry
                .ok_or_else(|| Error::InvalidGeometry("feature has no geometry".into()))?,
            GeoJson::FeatureCollection(fc) => fc
                .features
                .into_iter()
                .next()
                .ok_or_else(|| Error::InvalidGeometry("feature collection is empty".into()))?
                .geometry
                .ok_or_else(|| Error::InvalidGeometry("feature has no geometry".into()))?,
        };

        let rings = match geometry.value {
            GeoValue::Polygon(rings) => rings,
            GeoValue::MultiPolygon(mut polygons) if polygons.len() == 1 => polygons.remove(0),
            GeoValue::MultiPolygon(polygons) => {
                return Err(Error::InvalidGeometry(format!(
                    "expected a single polygon, got a multipolygon with {} members",
                    polygons.len()
                )))
            }
            other => {
                return Err(Error::InvalidGeometry(format!(
                    "expected a Polygon geometry, got {}",
                    geometry_name(&other)
                )))
            }
        };

        let mut rings = rings
            .iter()
            .map(|ring| ring_from_positions(ring))
            .collect::<Result<Vec<_>>>()?;
        if rings.is_empty() {
            return Err(Error::InvalidGeometry("polygon has no rings".into()));
        }
        let exterior = rings.remove(0);

        Self::new(Polygon::new(exterior, rings))
    }

    /// Validate a polygon given in longitude/latitude degrees
    pub fn new(polygon: Polygon<f64>) -> Result<Self> {
        validate_ring(polygon.exterior(), "exterior ring")?;
        for (i, interior) in polygon.interiors().iter().enumerate() {
            validate_ring(interior, &format!("interior ring {}", i))?;
        }

        for coord in polygon.exterior().coords() {
            if !(-180.0..=180.0).contains(&coord.x) || !(-90.0..=90.0).contains(&coord.y) {
                return Err(Error::InvalidGeometry(format!(
                    "coordinate ({}, {}) is not a WGS84 longitude/latitude",
                    coord.x, coord.y
                )));
            }
        }

        Ok(Self { polygon })
    }

    /// The underlying geographic polygon
    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Number of distinct exterior vertices
    pub fn vertex_count(&self) -> usize {
        self.polygon.exterior().0.len() - 1
    }

    /// Centroid as (longitude, latitude)
    pub fn centroid(&self) -> (f64, f64) {
        self.polygon
            .centroid()
            .map(|p| (p.x(), p.y()))
            .unwrap_or_else(|| {
                let c = self.polygon.exterior().0[0];
                (c.x, c.y)
            })
    }

    /// Geographic bounds (min_lon, min_lat, max_lon, max_lat)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        rect_bounds(self.polygon.bounding_rect())
    }

    /// Project every vertex with `f(lon, lat) -> (x, y)` into `crs`
    pub fn project<F>(&self, crs: CRS, f: F) -> ProjectedPolygon
    where
        F: Fn(f64, f64) -> (f64, f64),
    {
        let polygon = self.polygon.map_coords(|c| {
            let (x, y) = f(c.x, c.y);
            Coord { x, y }
        });
        ProjectedPolygon { polygon, crs }
    }
}

/// Wetland boundary in the planar working CRS
#[derive(Debug, Clone)]
pub struct ProjectedPolygon {
    polygon: Polygon<f64>,
    crs: CRS,
}

impl ProjectedPolygon {
    /// Wrap a polygon that is already in planar coordinates
    pub fn from_planar(polygon: Polygon<f64>, crs: CRS) -> Self {
        Self { polygon, crs }
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Planar bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        rect_bounds(self.polygon.bounding_rect())
    }

    /// Planar area in square CRS units
    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }

    /// Planar area in hectares (CRS units are metres)
    pub fn area_hectares(&self) -> f64 {
        self.area() / 10_000.0
    }

    /// Mask of the grid cells whose square intersects the polygon.
    ///
    /// Returns a `u8` raster aligned with `grid` (1 inside, 0 outside).
    pub fn footprint<T: RasterElement>(&self, grid: &Raster<T>) -> Raster<u8> {
        let mut mask = grid.like(0u8);
        mask.set_nodata(None);

        let (rows, cols) = grid.shape();
        let (min_x, min_y, max_x, max_y) = self.bounds();

        // Only scan the cells under the polygon's bounding box
        let (c0, r0) = grid.geo_to_pixel(min_x, max_y);
        let (c1, r1) = grid.geo_to_pixel(max_x, min_y);
        let clamp = |v: f64, n: usize| -> usize { v.floor().max(0.0).min(n as f64) as usize };
        let (row_start, row_end) = (clamp(r0.min(r1), rows), clamp(r0.max(r1) + 1.0, rows));
        let (col_start, col_end) = (clamp(c0.min(c1), cols), clamp(c0.max(c1) + 1.0, cols));

        for row in row_start..row_end {
            for col in col_start..col_end {
                let (x0, y0, x1, y1) = grid.cell_bounds(row, col);
                let cell = Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 });
                if cell.intersects(&self.polygon) {
                    mask.data_mut()[[row, col]] = 1;
                }
            }
        }

        mask
    }
}

fn rect_bounds(rect: Option<Rect<f64>>) -> (f64, f64, f64, f64) {
    match rect {
        Some(r) => (r.min().x, r.min().y, r.max().x, r.max().y),
        None => (0.0, 0.0, 0.0, 0.0),
    }
}

fn geometry_name(value: &GeoValue) -> &'static str {
    match value {
        GeoValue::Point(_) => "Point",
        GeoValue::MultiPoint(_) => "MultiPoint",
        GeoValue::LineString(_) => "LineString",
        GeoValue::MultiLineString(_) => "MultiLineString",
        GeoValue::Polygon(_) => "Polygon",
        GeoValue::MultiPolygon(_) => "MultiPolygon",
        GeoValue::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Ring coordinates as given; the ring must already be closed
fn ring_from_positions(positions: &[Vec<f64>]) -> Result<LineString<f64>> {
    let coords = positions
        .iter()
        .map(|p| {
            if p.len() < 2 || !p[0].is_finite() || !p[1].is_finite() {
                return Err(Error::InvalidGeometry(format!(
                    "invalid position {:?}",
                    p
                )));
            }
            Ok(Coord { x: p[0], y: p[1] })
        })
        .collect::<Result<Vec<Coord<f64>>>>()?;
    if coords.len() < 2 || coords.first() != coords.last() {
        return Err(Error::InvalidGeometry("polygon ring is not closed".into()));
    }
    Ok(LineString::new(coords))
}

/// Closed, at least three distinct vertices, no self-intersections
fn validate_ring(ring: &LineString<f64>, label: &str) -> Result<()> {
    let coords = &ring.0;
    if coords.len() < 2 || coords.first() != coords.last() {
        return Err(Error::InvalidGeometry(format!("{} is not closed", label)));
    }

    let mut distinct: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
    for c in &coords[..coords.len() - 1] {
        if !distinct.contains(c) {
            distinct.push(*c);
        }
    }
    if distinct.len() < 3 {
        return Err(Error::InvalidGeometry(format!(
            "{} needs at least 3 distinct vertices, got {}",
            label,
            distinct.len()
        )));
    }

    // Repeated consecutive vertices carry no edge
    let edges: Vec<Line<f64>> = ring.lines().filter(|l| l.start != l.end).collect();
    let n = edges.len();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    return Err(Error::InvalidGeometry(format!(
                        "{} self-intersects at ({}, {})",
                        label, intersection.x, intersection.y
                    )));
                }
                Some(LineIntersection::Collinear { .. }) => {
                    return Err(Error::InvalidGeometry(format!(
                        "{} has overlapping edges {} and {}",
                        label, i, j
                    )));
                }
            }
        }
    }

    Ok(())
}
