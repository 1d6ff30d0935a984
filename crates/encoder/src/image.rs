//! Camera payloads: compressed frames and calibration.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use contracts::{CameraImage, Calibration, Timestamp};

use crate::error::{EncodeError, Result};
use crate::schema::{CameraCalibration, CompressedImage};

/// Wrap compressed image bytes; the bytes themselves are not re-encoded.
pub fn compressed_image(image: &CameraImage, frame_id: &str, timestamp: Timestamp) -> CompressedImage {
    CompressedImage {
        timestamp: timestamp.into(),
        frame_id: frame_id.to_string(),
        format: image.format.as_str().to_string(),
        data: BASE64.encode(&image.data),
    }
}

/// Calibration message for one camera
pub fn camera_calibration(
    channel: &str,
    calibration: &Calibration,
    timestamp: Timestamp,
) -> Result<CameraCalibration> {
    let intrinsics = calibration
        .intrinsics
        .as_ref()
        .ok_or_else(|| EncodeError::MissingIntrinsics {
            channel: channel.to_string(),
        })?;

    Ok(CameraCalibration {
        timestamp: timestamp.into(),
        frame_id: calibration.frame_id.clone(),
        width: intrinsics.width,
        height: intrinsics.height,
        distortion_model: intrinsics.distortion_model.clone(),
        d: intrinsics.d.clone(),
        k: intrinsics.k,
        r: intrinsics.rectification(),
        p: intrinsics.projection(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{CameraIntrinsics, ImageFormat, RigidTransform};

    #[test]
    fn test_bytes_pass_through() {
        let raw = Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]);
        let image = CameraImage {
            format: ImageFormat::Jpeg,
            width: 2,
            height: 2,
            data: raw.clone(),
        };
        let msg = compressed_image(&image, "CAMERA_FRONT", Timestamp::from_micros(5));
        assert_eq!(msg.format, "jpeg");
        assert_eq!(msg.frame_id, "CAMERA_FRONT");
        assert_eq!(BASE64.decode(msg.data).unwrap(), raw.to_vec());
    }

    #[test]
    fn test_calibration_from_intrinsics() {
        let calibration = Calibration::new("CAMERA_FRONT", RigidTransform::identity())
            .with_intrinsics(CameraIntrinsics::pinhole(1920, 1080, 1000.0, 1000.0, 960.0, 540.0));
        let msg = camera_calibration("CAMERA_FRONT", &calibration, Timestamp::default()).unwrap();
        assert_eq!((msg.width, msg.height), (1920, 1080));
        assert_eq!(msg.p[2], 960.0);
        assert_eq!(msg.p[6], 540.0);
        assert_eq!(msg.r[4], 1.0);
    }

    #[test]
    fn test_missing_intrinsics() {
        let calibration = Calibration::new("CAMERA_BACK", RigidTransform::identity());
        let err = camera_calibration("CAMERA_BACK", &calibration, Timestamp::default()).unwrap_err();
        assert!(matches!(err, EncodeError::MissingIntrinsics { .. }));
    }
}
