//! Opaque payload decoders
//!
//! Point files are packed little-endian `f32` records: `x, y, z` followed by
//! one scalar (lidar intensity, radar RCS in dBsm) and optional padding up to
//! the record stride. Camera files are passed through untouched; only their
//! resolution is probed.

use std::io::Cursor;

use bytemuck::{Pod, Zeroable};
use bytes::Bytes;
use contracts::{CameraImage, CloudPoint, ContractError, ImageFormat, PointCloud};

/// Minimum record: x, y, z
pub const MIN_POINT_STRIDE: usize = 12;

/// x, y, z, scalar
pub const DEFAULT_POINT_STRIDE: usize = 16;

/// One packed point record
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RawPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub scalar: f32,
}

/// Decode a packed point file.
///
/// # Errors
/// `ContractError::PayloadDecode` when the stride is too small or the buffer
/// is not a whole number of records.
pub fn decode_point_cloud(
    channel: &str,
    data: &[u8],
    stride: usize,
) -> Result<PointCloud, ContractError> {
    if stride < MIN_POINT_STRIDE {
        return Err(ContractError::payload_decode(
            channel,
            format!("point stride {stride} is below {MIN_POINT_STRIDE} bytes"),
        ));
    }
    if data.len() % stride != 0 {
        return Err(ContractError::payload_decode(
            channel,
            format!("{} bytes is not a multiple of stride {stride}", data.len()),
        ));
    }

    let points = data
        .chunks_exact(stride)
        .map(|record| {
            if stride >= DEFAULT_POINT_STRIDE {
                // records in a byte buffer carry no alignment guarantee
                let raw: RawPoint = bytemuck::pod_read_unaligned(&record[..DEFAULT_POINT_STRIDE]);
                CloudPoint::new(raw.x, raw.y, raw.z).with_intensity(raw.scalar)
            } else {
                let [x, y, z]: [f32; 3] = bytemuck::pod_read_unaligned(&record[..MIN_POINT_STRIDE]);
                CloudPoint::new(x, y, z)
            }
        })
        .collect();

    Ok(PointCloud::new(points))
}

/// Pack points into the on-disk record layout (stride 16).
pub fn encode_point_records(points: &[CloudPoint]) -> Vec<u8> {
    let records: Vec<RawPoint> = points
        .iter()
        .map(|p| RawPoint {
            x: p.position[0],
            y: p.position[1],
            z: p.position[2],
            scalar: p.intensity.unwrap_or(0.0),
        })
        .collect();
    bytemuck::cast_slice(&records).to_vec()
}

/// Wrap compressed image bytes, probing the resolution when it is unknown.
pub fn decode_camera_image(
    channel: &str,
    data: Bytes,
    format: ImageFormat,
    dimensions: Option<(u32, u32)>,
) -> Result<CameraImage, ContractError> {
    let (width, height) = match dimensions {
        Some(dims) => dims,
        None => probe_dimensions(channel, &data)?,
    };
    Ok(CameraImage {
        format,
        width,
        height,
        data,
    })
}

/// Read width/height from the image header without decoding pixels.
pub fn probe_dimensions(channel: &str, data: &[u8]) -> Result<(u32, u32), ContractError> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ContractError::payload_decode(channel, e.to_string()))?
        .into_dimensions()
        .map_err(|e| ContractError::payload_decode(channel, e.to_string()))
}
