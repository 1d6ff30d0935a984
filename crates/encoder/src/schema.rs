//! Foxglove JSON message shapes.
//!
//! Field names follow the `foxglove.*` schemas the viewer expects. Every
//! struct also deserializes so tests can decode what the encoders produce.

use contracts::{Rgba, RigidTransform, Timestamp};
use nalgebra::{Point3, UnitQuaternion};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    pub sec: u64,
    pub nsec: u32,
}

impl From<Timestamp> for Time {
    fn from(ts: Timestamp) -> Self {
        let (sec, nsec) = ts.to_sec_nsec();
        Self { sec, nsec }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub sec: u64,
    pub nsec: u32,
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Self {
            sec: d.as_secs(),
            nsec: d.subsec_nanos(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f64) -> Self {
        Self { x: v, y: v, z: v }
    }
}

impl From<Point3<f64>> for Vector3 {
    fn from(p: Point3<f64>) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

impl From<UnitQuaternion<f64>> for Quaternion {
    fn from(q: UnitQuaternion<f64>) -> Self {
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl Pose {
    /// Unrotated pose at `position`
    pub fn at(position: Vector3) -> Self {
        Self {
            position,
            orientation: Quaternion::IDENTITY,
        }
    }
}

impl From<&RigidTransform> for Pose {
    fn from(iso: &RigidTransform) -> Self {
        Self {
            position: Point3::from(iso.translation.vector).into(),
            orientation: iso.rotation.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Rgba> for Color {
    fn from(c: Rgba) -> Self {
        Self::new(c.r, c.g, c.b, c.a)
    }
}

/// `foxglove.CompressedImage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedImage {
    pub timestamp: Time,
    pub frame_id: String,
    pub format: String,
    /// base64 of the compressed bytes
    pub data: String,
}

/// `foxglove.CameraCalibration`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub timestamp: Time,
    pub frame_id: String,
    pub width: u32,
    pub height: u32,
    pub distortion_model: String,
    #[serde(rename = "D")]
    pub d: Vec<f64>,
    #[serde(rename = "K")]
    pub k: [f64; 9],
    #[serde(rename = "R")]
    pub r: [f64; 9],
    #[serde(rename = "P")]
    pub p: [f64; 12],
}

/// One entry of `foxglove.FrameTransforms`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameTransform {
    pub timestamp: Time,
    pub parent_frame_id: String,
    pub child_frame_id: String,
    pub translation: Vector3,
    pub rotation: Quaternion,
}

/// `foxglove.FrameTransforms`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameTransforms {
    pub transforms: Vec<FrameTransform>,
}

/// `foxglove.SceneUpdate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneUpdate {
    pub deletions: Vec<serde_json::Value>,
    pub entities: Vec<SceneEntity>,
}

impl SceneUpdate {
    pub fn single(entity: SceneEntity) -> Self {
        Self {
            deletions: Vec::new(),
            entities: vec![entity],
        }
    }
}

/// `foxglove.SceneEntity`; primitive kinds the streamer never emits stay as
/// empty arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneEntity {
    pub timestamp: Time,
    pub frame_id: String,
    pub id: String,
    pub lifetime: Duration,
    pub frame_locked: bool,
    pub metadata: Vec<serde_json::Value>,
    pub arrows: Vec<serde_json::Value>,
    pub cubes: Vec<CubePrimitive>,
    pub spheres: Vec<SpherePrimitive>,
    pub cylinders: Vec<serde_json::Value>,
    pub lines: Vec<serde_json::Value>,
    pub triangles: Vec<serde_json::Value>,
    pub texts: Vec<TextPrimitive>,
    pub models: Vec<serde_json::Value>,
}

impl SceneEntity {
    pub fn new(
        id: impl Into<String>,
        frame_id: impl Into<String>,
        timestamp: Timestamp,
        lifetime: std::time::Duration,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            frame_id: frame_id.into(),
            id: id.into(),
            lifetime: lifetime.into(),
            frame_locked: true,
            metadata: Vec::new(),
            arrows: Vec::new(),
            cubes: Vec::new(),
            spheres: Vec::new(),
            cylinders: Vec::new(),
            lines: Vec::new(),
            triangles: Vec::new(),
            texts: Vec::new(),
            models: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpherePrimitive {
    pub pose: Pose,
    pub size: Vector3,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubePrimitive {
    pub pose: Pose,
    pub size: Vector3,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPrimitive {
    pub pose: Pose,
    pub billboard: bool,
    pub font_size: f64,
    pub scale_invariant: bool,
    pub color: Color,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_split() {
        let t: Time = Timestamp::from_micros(1_533_151_603_547_590).into();
        assert_eq!(t.sec, 1_533_151_603);
        assert_eq!(t.nsec, 547_590_000);
    }

    #[test]
    fn test_calibration_uses_upper_case_matrices() {
        let msg = CameraCalibration {
            timestamp: Time { sec: 0, nsec: 0 },
            frame_id: "CAMERA_FRONT".to_string(),
            width: 4,
            height: 3,
            distortion_model: "plumb_bob".to_string(),
            d: vec![0.0; 5],
            k: [0.0; 9],
            r: [0.0; 9],
            p: [0.0; 12],
        };
        let value = serde_json::to_value(&msg).unwrap();
        for key in ["D", "K", "R", "P"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_entity_defaults() {
        let entity = SceneEntity::new(
            "LIDAR_LEFT",
            "world",
            Timestamp::from_micros(1),
            std::time::Duration::from_millis(500),
        );
        assert!(entity.frame_locked);
        assert_eq!(entity.lifetime, Duration { sec: 0, nsec: 500_000_000 });
        let value = serde_json::to_value(SceneUpdate::single(entity)).unwrap();
        assert_eq!(value["entities"][0]["models"], serde_json::json!([]));
    }
}
