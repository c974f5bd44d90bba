//! Native GeoTIFF reading/writing built on the `tiff` crate.
//!
//! Covers what the embedding pipeline exchanges: single-band label and metric
//! rasters (Float32 / Int32) and chunky multi-sample float cubes as returned by
//! the Earth Engine `getPixels` endpoint.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{EmbeddingCube, GeoTransform, Raster, RasterElement};
use ndarray::Array3;
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{ColorType, Gray32Float, GrayI32};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Sample type written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleType {
    /// 32-bit float (change maps)
    #[default]
    Float32,
    /// 32-bit signed integer (cluster labels)
    Int32,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub sample_type: SampleType,
}

impl GeoTiffOptions {
    pub fn int32() -> Self {
        Self {
            sample_type: SampleType::Int32,
        }
    }
}

/// Read one band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file, band)
}

/// Read one band of an in-memory GeoTIFF into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

/// Decode a multi-sample float GeoTIFF into an [`EmbeddingCube`].
///
/// Samples must be pixel-interleaved and their count must match `band_names`.
pub fn read_embedding_cube_from_buffer(data: &[u8], band_names: &[String]) -> Result<EmbeddingCube> {
    let mut decoder = open_decoder(Cursor::new(data))?;
    let decoded = decode_samples(&mut decoder)?;

    if decoded.samples != band_names.len() {
        return Err(Error::BandCountMismatch {
            left: decoded.samples,
            right: band_names.len(),
        });
    }

    let array = Array3::from_shape_vec((decoded.rows, decoded.cols, decoded.samples), decoded.values)
        .map_err(|e| Error::Other(e.to_string()))?;
    let mut cube = EmbeddingCube::new(array, band_names.to_vec())?;

    if let Some(nd) = decoded.nodata {
        let nd = nd as f32;
        cube.data_mut().mapv_inplace(|v| if v == nd { f32::NAN } else { v });
    }
    if let Some(gt) = decoded.transform {
        cube.set_transform(gt);
    }
    cube.set_crs(decoded.crs);
    Ok(cube)
}

struct DecodedImage {
    rows: usize,
    cols: usize,
    samples: usize,
    values: Vec<f32>,
    transform: Option<GeoTransform>,
    crs: Option<CRS>,
    nodata: Option<f64>,
}

fn open_decoder<R: Read + Seek>(reader: R) -> Result<Decoder<R>> {
    Decoder::new(reader)
        .map(|d| d.with_limits(Limits::unlimited()))
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))
}

fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<DecodedImage> {
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    if let Ok(2) = decoder.get_tag_u32(Tag::PlanarConfiguration) {
        return Err(Error::UnsupportedDataType(
            "planar (band-separate) TIFF layout".to_string(),
        ));
    }

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let values: Vec<f32> = match result {
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    let pixels = rows * cols;
    if pixels == 0 || values.len() % pixels != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    Ok(DecodedImage {
        rows,
        cols,
        samples: values.len() / pixels,
        values,
        transform: read_geotransform(decoder).ok(),
        crs: read_crs(decoder),
        nodata: read_nodata(decoder),
    })
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = open_decoder(reader)?;
    let decoded = decode_samples(&mut decoder)?;

    let band = band.unwrap_or(0);
    if band >= decoded.samples {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band.to_string(),
            reason: format!("file has {} band(s)", decoded.samples),
        });
    }

    let data: Vec<T> = decoded
        .values
        .iter()
        .skip(band)
        .step_by(decoded.samples)
        .map(|&v| T::from_f64_or_nodata(v as f64))
        .collect();

    let mut raster = Raster::from_vec(data, decoded.rows, decoded.cols)?;
    if let Some(gt) = decoded.transform {
        raster.set_transform(gt);
    }
    raster.set_crs(decoded.crs);
    if let Some(nd) = decoded.nodata {
        raster.set_nodata(num_traits::cast(nd));
    }

    Ok(raster)
}

/// Read GeoTransform from ModelPixelScaleTag + ModelTiepointTag
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT))
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// EPSG code from the GeoKey directory, if one is declared inline
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u32_vec(Tag::Unknown(GEO_KEY_DIRECTORY)).ok()?;
    keys.get(4..)?
        .chunks_exact(4)
        .find(|entry| {
            (entry[0] == GEOGRAPHIC_TYPE_KEY as u32 || entry[0] == PROJECTED_CS_TYPE_KEY as u32)
                && entry[1] == 0
        })
        .map(|entry| CRS::from_epsg(entry[3]))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::Unknown(GDAL_NODATA)).ok()?;
    text.trim_matches(char::from(0)).trim().parse().ok()
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let export_err = |reason: String| Error::Export {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::create(path).map_err(|e| export_err(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, options.unwrap_or_default()).map_err(|e| match e {
        Error::Export { .. } => e,
        other => export_err(other.to_string()),
    })?;
    writer.flush().map_err(|e| export_err(e.to_string()))?;

    debug!(path = %path.display(), rows = raster.rows(), cols = raster.cols(), "wrote GeoTIFF");
    Ok(())
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

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;
    let (shape, gt, crs) = (raster.shape(), raster.transform(), raster.crs());

    match options.sample_type {
        SampleType::Float32 => {
            let data: Vec<f32> = raster
                .data()
                .iter()
                .map(|&v| {
                    if raster.is_nodata(v) {
                        f32::NAN
                    } else {
                        num_traits::cast(v).unwrap_or(f32::NAN)
                    }
                })
                .collect();
            let nodata = raster.nodata().map(|_| "nan".to_string());
            write_image::<_, Gray32Float>(&mut encoder, shape, gt, crs, &data, nodata)
        }
        SampleType::Int32 => {
            let fill = raster
                .nodata()
                .and_then(|v| num_traits::cast::<T, i32>(v))
                .unwrap_or(-1);
            let data: Vec<i32> = raster
                .data()
                .iter()
                .map(|&v| {
                    if raster.is_nodata(v) {
                        fill
                    } else {
                        num_traits::cast(v).unwrap_or(fill)
                    }
                })
                .collect();
            let nodata = raster.nodata().map(|_| fill.to_string());
            write_image::<_, GrayI32>(&mut encoder, shape, gt, crs, &data, nodata)
        }
    }
}

fn write_image<W, C>(
    encoder: &mut TiffEncoder<W>,
    shape: (usize, usize),
    gt: &GeoTransform,
    crs: Option<&CRS>,
    data: &[C::Inner],
    nodata: Option<String>,
) -> Result<()>
where
    W: Write + Seek,
    C: ColorType,
    [C::Inner]: TiffValue,
{
    let (rows, cols) = shape;
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = geokey_directory(crs);
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    if let Some(nd) = nodata {
        image
            .encoder()
            .write_tag(Tag::Unknown(GDAL_NODATA), nd.as_str())
            .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// GeoKey directory: version header, model type, raster type and, when the
/// EPSG code fits a SHORT, the geographic or projected CRS key.
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.map(|c| c.epsg()).and_then(|code| u16::try_from(code).ok());
    let geographic = crs.map_or(false, |c| c.is_geographic());

    let model_type = if geographic { 2 } else { 1 };
    let mut keys: Vec<u16> = vec![
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some(code) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE_KEY } else { PROJECTED_CS_TYPE_KEY };
        keys.extend_from_slice(&[key, 0, 1, code]);
    }

    let mut dir = vec![1, 1, 0, (keys.len() / 4) as u16];
    dir.extend(keys);
    dir
}

/// Create an output directory (and parents) if needed
pub fn ensure_output_dir<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| Error::Export {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(dir.to_path_buf())
}
