//! Export-service URL composition.
//!
//! The service is an ArcGIS-style image server: one GET on `exportImage`
//! with a bounding box, output size and spatial references returns a
//! GeoTIFF for exactly that grid.

use crate::dem::DemRequest;
use crate::error::{CloudError, Result};
use reqwest::Url;

/// No-data value requested from the service
pub const EXPORT_NODATA: f64 = -9999.0;

/// Build the export URL for `request` from a user-supplied service URL.
///
/// `base` may name the service root, `.../export` or `.../exportImage` in
/// any case. Query parameters already on `base` are kept unless the request
/// sets the same key.
pub fn export_image_url(base: &str, request: &DemRequest) -> Result<Url> {
    let mut url = Url::parse(base.trim()).map_err(|e| CloudError::InvalidUrl(format!("{base}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CloudError::InvalidUrl(format!(
            "{base}: expected an http(s) export service"
        )));
    }

    url.set_fragment(None);
    normalise_path(&mut url);

    let (min_x, min_y, max_x, max_y) = request.bounds;
    let epsg = request.epsg().to_string();
    let own: Vec<(&str, String)> = vec![
        ("f", "image".into()),
        ("bbox", format!("{min_x},{min_y},{max_x},{max_y}")),
        ("bboxSR", epsg.clone()),
        ("imageSR", epsg),
        ("size", format!("{},{}", request.cols, request.rows)),
        ("interpolation", "BILINEAR".into()),
        ("noData", EXPORT_NODATA.to_string()),
        ("format", "tiff".into()),
        ("pixelType", "F32".into()),
    ];

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !own.iter().any(|(key, _)| key.eq_ignore_ascii_case(k)))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .extend_pairs(own.iter().map(|(k, v)| (*k, v.as_str())));

    Ok(url)
}

fn normalise_path(url: &mut Url) {
    let path = url.path().trim_end_matches('/').to_string();
    let (head, last) = match path.rsplit_once('/') {
        Some((head, last)) => (head.to_string(), last.to_string()),
        None => (String::new(), path.clone()),
    };

    let new_path = if last.eq_ignore_ascii_case("exportimage") || last.eq_ignore_ascii_case("export") {
        format!("{head}/exportImage")
    } else {
        format!("{path}/exportImage")
    };
    url.set_path(&new_path);
}
