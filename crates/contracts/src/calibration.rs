//! Rig calibration and ego poses.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Vehicle-fixed reference frame
pub const EGO_FRAME: &str = "base_link";

/// Scene-fixed global reference frame
pub const WORLD_FRAME: &str = "world";

/// Rigid transform (rotation + translation)
pub type RigidTransform = Isometry3<f64>;

/// Serializable rigid transform
///
/// Rotation is a quaternion in `[w, x, y, z]` order, as stored by the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        translation: [0.0; 3],
        rotation: [1.0, 0.0, 0.0, 0.0],
    };

    /// Convert to an isometry, normalizing the quaternion.
    pub fn to_isometry(&self) -> RigidTransform {
        let [w, x, y, z] = self.rotation;
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z));
        let [tx, ty, tz] = self.translation;
        Isometry3::from_parts(Translation3::new(tx, ty, tz), rotation)
    }

    pub fn from_isometry(iso: &RigidTransform) -> Self {
        let q = iso.rotation.quaternion();
        Self {
            translation: [iso.translation.x, iso.translation.y, iso.translation.z],
            rotation: [q.w, q.i, q.j, q.k],
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Static sensor calibration
#[derive(Debug, Clone)]
pub struct Calibration {
    /// Sensor frame id
    pub frame_id: String,

    /// Sensor -> ego transform
    pub sensor_to_ego: RigidTransform,

    /// Camera projection model (cameras only)
    pub intrinsics: Option<CameraIntrinsics>,
}

impl Calibration {
    pub fn new(frame_id: impl Into<String>, sensor_to_ego: RigidTransform) -> Self {
        Self {
            frame_id: frame_id.into(),
            sensor_to_ego,
            intrinsics: None,
        }
    }

    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }
}

/// Pinhole intrinsics plus distortion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,

    /// 3x3 camera matrix, row-major
    pub k: [f64; 9],

    #[serde(default = "default_distortion_model")]
    pub distortion_model: String,

    /// Distortion coefficients
    #[serde(default = "default_distortion")]
    pub d: Vec<f64>,
}

fn default_distortion_model() -> String {
    "plumb_bob".to_string()
}

fn default_distortion() -> Vec<f64> {
    vec![0.0; 5]
}

impl CameraIntrinsics {
    /// Pinhole intrinsics without distortion.
    pub fn pinhole(width: u32, height: u32, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            width,
            height,
            k: [fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0],
            distortion_model: default_distortion_model(),
            d: default_distortion(),
        }
    }

    /// 3x4 projection matrix of the rectified camera, row-major.
    pub fn projection(&self) -> [f64; 12] {
        let k = &self.k;
        [
            k[0], k[1], k[2], 0.0, //
            k[3], k[4], k[5], 0.0, //
            k[6], k[7], k[8], 0.0,
        ]
    }

    /// Rectification matrix (identity for monocular cameras).
    pub fn rectification(&self) -> [f64; 9] {
        [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
    }
}

/// Ego -> world pose at one instant
#[derive(Debug, Clone, Copy)]
pub struct EgoPose {
    pub timestamp: Timestamp,
    pub ego_to_world: RigidTransform,
}

impl EgoPose {
    pub fn new(timestamp: Timestamp, ego_to_world: RigidTransform) -> Self {
        Self {
            timestamp,
            ego_to_world,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn test_pose_round_trip() {
        let pose = Pose {
            translation: [1.0, -2.0, 0.5],
            rotation: [0.9238795, 0.0, 0.0, 0.3826834],
        };
        let back = Pose::from_isometry(&pose.to_isometry());
        for i in 0..3 {
            assert!((back.translation[i] - pose.translation[i]).abs() < 1e-9);
        }
        for i in 0..4 {
            assert!((back.rotation[i] - pose.rotation[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pose_normalizes_rotation() {
        let pose = Pose {
            translation: [0.0; 3],
            rotation: [2.0, 0.0, 0.0, 0.0],
        };
        let iso = pose.to_isometry();
        assert!((iso.rotation.norm() - 1.0).abs() < 1e-12);
        let p = iso.transform_point(&Point3::new(1.0, 2.0, 3.0));
        assert!((p - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_projection_from_k() {
        let intr = CameraIntrinsics::pinhole(1920, 1080, 1000.0, 1000.0, 960.0, 540.0);
        let p = intr.projection();
        assert_eq!(p[0], 1000.0);
        assert_eq!(p[2], 960.0);
        assert_eq!(p[5], 1000.0);
        assert_eq!(p[6], 540.0);
        assert_eq!(p[10], 1.0);
        assert_eq!(p[11], 0.0);
    }
}
