//! Pure-Rust WGS84 ↔ UTM reprojection (Snyder 1987, USGS formulas).
//!
//! The working grid of every job is a UTM zone: EPSG 326xx (North) or
//! 327xx (South). No external C dependencies (no libproj).

use wetland_core::CRS;

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

// ── Public API ───────────────────────────────────────────────────────────

/// A UTM zone and hemisphere on the WGS84 datum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmProjection {
    pub zone: u32,
    pub north: bool,
}

impl UtmProjection {
    /// Zone containing `(lon, lat)`; latitude 0 counts as North.
    pub fn for_lonlat(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u32;
        Self {
            zone,
            north: lat >= 0.0,
        }
    }

    /// Parse a WGS84 UTM EPSG code (326xx / 327xx).
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        parse_utm_epsg(epsg).map(|(zone, north)| Self { zone, north })
    }

    pub fn epsg(&self) -> u32 {
        if self.north {
            32600 + self.zone
        } else {
            32700 + self.zone
        }
    }

    pub fn crs(&self) -> CRS {
        CRS::utm(self.zone, self.north)
    }

    /// (lon, lat) degrees → (easting, northing) metres
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        wgs84_to_utm(lon, lat, self.zone, self.north)
    }

    /// (easting, northing) metres → (lon, lat) degrees
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        utm_to_wgs84(easting, northing, self.zone, self.north)
    }

    /// Project a geographic envelope `(min_lon, min_lat, max_lon, max_lat)`.
    ///
    /// All four corners are transformed and their envelope taken, which
    /// covers the non-linear distortion better than transforming only
    /// min/max.
    pub fn forward_bounds(&self, bounds: (f64, f64, f64, f64)) -> (f64, f64, f64, f64) {
        let (min_lon, min_lat, max_lon, max_lat) = bounds;
        let corners = [
            (min_lon, min_lat),
            (min_lon, max_lat),
            (max_lon, min_lat),
            (max_lon, max_lat),
        ];

        let mut min_e = f64::MAX;
        let mut min_n = f64::MAX;
        let mut max_e = f64::MIN;
        let mut max_n = f64::MIN;

        for &(lon, lat) in &corners {
            let (e, n) = self.forward(lon, lat);
            min_e = min_e.min(e);
            min_n = min_n.min(n);
            max_e = max_e.max(e);
            max_n = max_n.max(n);
        }

        (min_e, min_n, max_e, max_n)
    }
}

/// Check if an EPSG code represents WGS84 geographic.
pub fn is_wgs84(epsg: u32) -> bool {
    epsg == 4326
}

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, North hemisphere
/// - EPSG 327xx → zone xx, South hemisphere
pub fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

// ── Core projection (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64) ─────

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Convert WGS84 (longitude, latitude) in degrees to UTM (easting, northing)
/// in metres for the given zone and hemisphere.
pub fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);

    // Meridional arc length M (Snyder eq. 3-21)
    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Easting (Snyder eq. 8-9)
    let easting = K0 * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2)
                * a4
                * a_coeff
                / 120.0)
        + FALSE_EASTING;

    // Northing (Snyder eq. 8-10)
    let northing = K0
        * (m
            + n
                * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north {
        northing
    } else {
        northing + FALSE_NORTHING_SOUTH
    };

    (easting, northing)
}

/// Convert UTM (easting, northing) in metres to WGS84 (longitude, latitude)
/// in degrees. Snyder eqs. 8-12 to 8-25.
pub fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let sqrt_1_e2 = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;

    // Footpoint latitude (Snyder eq. 3-26)
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let denom = 1.0 - E2 * sin_phi1 * sin_phi1;
    let n1 = A / denom.sqrt();
    let r1 = A * (1.0 - E2) / denom.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos_phi1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians).
/// Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e2 = E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn parse_utm_codes() {
        assert_eq!(parse_utm_epsg(32630), Some((30, true)));
        assert_eq!(parse_utm_epsg(32760), Some((60, false)));
        assert_eq!(parse_utm_epsg(4326), None);
        assert_eq!(parse_utm_epsg(32600), None); // zone 0 invalid
        assert_eq!(parse_utm_epsg(32661), None); // zone 61 invalid
        assert!(is_wgs84(4326));
        assert!(!is_wgs84(32630));
    }

    #[test]
    fn zone_selection() {
        // Christchurch, NZ
        let p = UtmProjection::for_lonlat(172.6362, -43.5321);
        assert_eq!(p, UtmProjection { zone: 59, north: false });
        assert_eq!(p.epsg(), 32759);
        assert_eq!(p.crs().epsg(), Some(32759));

        assert_eq!(UtmProjection::for_lonlat(-180.0, 10.0).zone, 1);
        assert_eq!(UtmProjection::for_lonlat(180.0, 10.0).zone, 60);
        assert_eq!(UtmProjection::from_epsg(32630), Some(UtmProjection { zone: 30, north: true }));
    }

    // Reference values from pyproj (PROJ 9.x):
    //   Transformer.from_crs(4326, 32630, always_xy=True)
    //   .transform(-3.7037, 40.4168) → (440298.94, 4474257.31)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, 30, true);
        assert_abs_diff_eq!(e, 440_298.94, epsilon = 1.0);
        assert_abs_diff_eq!(n, 4_474_257.31, epsilon = 1.0);
    }

    // Buenos Aires → UTM 21S: (373317.50, 6170036.17)
    #[test]
    fn buenos_aires_wgs84_to_utm21s() {
        let (e, n) = wgs84_to_utm(-58.3816, -34.6037, 21, false);
        assert_abs_diff_eq!(e, 373_317.50, epsilon = 1.0);
        assert_abs_diff_eq!(n, 6_170_036.17, epsilon = 1.0);
    }

    #[test]
    fn equator_central_meridian() {
        let (e, n) = wgs84_to_utm(-3.0, 0.0, 30, true);
        assert_abs_diff_eq!(e, 500_000.0, epsilon = 0.01);
        assert_abs_diff_eq!(n, 0.0, epsilon = 0.01);
    }

    #[test]
    fn inverse_recovers_geographic_coordinates() {
        for &(lon, lat) in &[
            (-3.7037, 40.4168),
            (-58.3816, -34.6037),
            (172.6362, -43.5321),
            (175.9, -39.2),
        ] {
            let p = UtmProjection::for_lonlat(lon, lat);
            let (e, n) = p.forward(lon, lat);
            let (lon2, lat2) = p.inverse(e, n);
            assert_abs_diff_eq!(lon2, lon, epsilon = 1e-7);
            assert_abs_diff_eq!(lat2, lat, epsilon = 1e-7);
        }
    }

    #[test]
    fn forward_bounds_envelope() {
        let p = UtmProjection { zone: 30, north: true };
        let (min_e, min_n, max_e, max_n) = p.forward_bounds((-3.75, 40.40, -3.70, 40.45));

        assert!(min_e > 100_000.0, "easting should be in metres");
        // 0.05° lon at 40°N ≈ 4.2 km, 0.05° lat ≈ 5.5 km
        let width = max_e - min_e;
        let height = max_n - min_n;
        assert!(width > 3_000.0 && width < 6_000.0, "width ~4km, got {width}");
        assert!(height > 4_000.0 && height < 7_000.0, "height ~5.5km, got {height}");
    }
}
