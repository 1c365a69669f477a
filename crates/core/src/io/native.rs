//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate. Understands the subset of GeoTIFF the engine
//! exchanges with export services and artifact consumers: pixel scale +
//! tiepoint georeferencing, the EPSG code from the GeoKey directory, and the
//! GDAL no-data tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// No-data value to declare and to substitute for NaN cells.
    /// Falls back to the raster's own no-data value.
    pub nodata: Option<f64>,
}

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
///
/// Same as `read_geotiff` but operates on a byte slice, which is what the
/// export service hands back.
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

/// Internal: decode a single-band GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::GeoTiff(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::GeoTiff(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let transform = read_geotransform(&mut decoder);
    let crs = read_crs(&mut decoder);
    let nodata = read_nodata(&mut decoder);

    let result = decoder
        .read_image()
        .map_err(|e| Error::GeoTiff(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(&buf),
        DecodingResult::F64(buf) => cast_all(&buf),
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::I8(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    // Multi-band payloads decode to a longer interleaved buffer
    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = transform {
        raster.set_transform(transform);
    }
    raster.set_crs(crs);
    raster.set_nodata(nodata.and_then(num_traits::cast));

    Ok(raster)
}

fn cast_all<S, T>(buf: &[S]) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

/// GeoTransform from ModelPixelScaleTag + ModelTiepointTag, if present
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
        .ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT)).ok()?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    None
}

/// EPSG code from the GeoKey directory (projected first, then geographic)
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .ok()?;
    if keys.len() < 4 {
        return None;
    }

    let count = keys[3] as usize;
    let entries: Vec<&[u16]> = keys[4..]
        .chunks_exact(4)
        .take(count)
        .collect();

    // Location 0 means the value is stored inline
    let inline_value = |key: u16| {
        entries
            .iter()
            .find(|e| e[0] == key && e[1] == 0)
            .map(|e| e[3] as u32)
    };

    inline_value(PROJECTED_CS_TYPE_KEY)
        .or_else(|| inline_value(GEOGRAPHIC_TYPE_KEY))
        .filter(|&code| code != 0 && code != 32767)
        .map(CRS::from_epsg)
}

fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
}

/// Write a Raster to a GeoTIFF file
///
/// Writes as 32-bit float.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, BufWriter::new(file), options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

/// Internal: encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::GeoTiff(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let nodata = options
        .nodata
        .or_else(|| raster.nodata().and_then(|nd| nd.to_f64()))
        .filter(|nd| !nd.is_nan());

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                return nodata.map_or(f32::NAN, |nd| nd as f32);
            }
            num_traits::cast(v).unwrap_or(f32::NAN)
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::GeoTiff(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();

    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), scale.as_slice())
        .map_err(|e| Error::GeoTiff(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), tiepoint.as_slice())
        .map_err(|e| Error::GeoTiff(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::GeoTiff(format!("Cannot write geokey tag: {}", e)))?;

    if let Some(nd) = nodata {
        let text = format!("{}", nd);
        image
            .encoder()
            .write_tag(Tag::Unknown(GDAL_NODATA), text.as_str())
            .map_err(|e| Error::GeoTiff(format!("Cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(&data)
        .map_err(|e| Error::GeoTiff(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// GeoKey directory declaring raster-is-area and, when known, the EPSG code
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    // Model type: 1 = projected, 2 = geographic
    let (model_type, crs_key) = match crs.and_then(|c| c.epsg()) {
        Some(code) if code == 4326 => (2, Some((GEOGRAPHIC_TYPE_KEY, code))),
        Some(code) if code <= u16::MAX as u32 => (1, Some((PROJECTED_CS_TYPE_KEY, code))),
        _ => (1, None),
    };

    let mut keys: Vec<u16> = vec![
        1, 1, 0, 0, // Version 1.1.0, key count patched below
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some((key, code)) = crs_key {
        keys.extend_from_slice(&[key, 0, 1, code as u16]);
    }
    keys[3] = ((keys.len() - 4) / 4) as u16;
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_grid() -> Raster<f64> {
        let mut raster: Raster<f64> = Raster::new(3, 4);
        raster.set_transform(GeoTransform::new(500_000.0, 5_200_000.0, 10.0, -10.0));
        raster.set_crs(Some(CRS::from_epsg(32759)));
        raster.set_nodata(Some(-9999.0));
        for r in 0..3 {
            for c in 0..4 {
                raster.set(r, c, (r * 4 + c) as f64 + 0.5).unwrap();
            }
        }
        raster.set(2, 3, -9999.0).unwrap();
        raster
    }

    #[test]
    fn test_buffer_keeps_georeferencing() {
        let raster = sample_grid();
        let bytes = write_geotiff_to_buffer(&raster, None).unwrap();
        let decoded: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(decoded.shape(), (3, 4));
        assert_eq!(decoded.transform(), raster.transform());
        assert_eq!(decoded.crs().and_then(|c| c.epsg()), Some(32759));
        assert_eq!(decoded.nodata(), Some(-9999.0));
        assert_relative_eq!(decoded.get(1, 2).unwrap(), 6.5);
        assert!(decoded.is_nodata_at(2, 3).unwrap());
    }

    #[test]
    fn test_nan_written_as_declared_nodata() {
        let mut raster: Raster<f64> = Raster::filled(2, 2, 1.0);
        raster.set(0, 0, f64::NAN).unwrap();
        let bytes = write_geotiff_to_buffer(
            &raster,
            Some(GeoTiffOptions {
                nodata: Some(-9999.0),
            }),
        )
        .unwrap();

        let decoded: Raster<f32> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(decoded.get(0, 0).unwrap(), -9999.0);
        assert_eq!(decoded.nodata(), Some(-9999.0));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = read_geotiff_from_buffer::<f64>(b"<html>not a tiff</html>").unwrap_err();
        assert!(matches!(err, Error::GeoTiff(_)));
    }

    #[test]
    fn test_geokeys_declare_epsg() {
        let keys = geokey_directory(Some(&CRS::from_epsg(32760)));
        assert_eq!(keys[3], 3);
        assert_eq!(&keys[12..16], &[PROJECTED_CS_TYPE_KEY, 0, 1, 32760]);

        let keys = geokey_directory(None);
        assert_eq!(keys[3], 2);
    }
}
