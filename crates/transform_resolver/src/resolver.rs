//! Frame -> world resolution for one loaded scene.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{
    Annotation, ContractError, EgoPose, ReferenceFrame, RigidTransform, Scene, Timestamp,
    EGO_FRAME, WORLD_FRAME,
};
use nalgebra::{Isometry3, Translation3};
use tracing::trace;

use crate::interpolate::ego_pose_at;

/// Resolves sensor and object frames into the world frame
///
/// `world_T_frame(t) = world_T_ego(t) * ego_T_frame`, with `world_T_ego`
/// interpolated from the scene's ego poses and `ego_T_frame` the static
/// calibration. Immutable after construction; share it across tasks.
#[derive(Debug, Clone)]
pub struct TransformResolver {
    /// Static sensor -> ego transforms keyed by frame id
    sensor_to_ego: HashMap<String, RigidTransform>,

    ego_poses: Arc<[EgoPose]>,
}

impl TransformResolver {
    pub fn new(sensor_to_ego: HashMap<String, RigidTransform>, ego_poses: Arc<[EgoPose]>) -> Self {
        Self {
            sensor_to_ego,
            ego_poses,
        }
    }

    /// Build from a scene's calibration map and ego pose sequence.
    pub fn from_scene(scene: &Scene) -> Self {
        let sensor_to_ego = scene
            .calibrations
            .iter()
            .map(|(frame, calibration)| (frame.clone(), calibration.sensor_to_ego))
            .collect();
        Self::new(sensor_to_ego, scene.ego_poses.clone())
    }

    /// Transform from `frame_id` into the world frame at `timestamp`.
    ///
    /// # Errors
    /// - `UnknownFrame` when `frame_id` has no calibration
    /// - `OutOfRangeTimestamp` when `timestamp` is outside the ego pose range
    pub fn resolve(
        &self,
        frame_id: &str,
        timestamp: Timestamp,
    ) -> Result<RigidTransform, ContractError> {
        if frame_id == WORLD_FRAME {
            return Ok(Isometry3::identity());
        }

        let ego_to_frame = if frame_id == EGO_FRAME {
            Isometry3::identity()
        } else {
            *self
                .sensor_to_ego
                .get(frame_id)
                .ok_or_else(|| ContractError::UnknownFrame {
                    frame_id: frame_id.to_string(),
                })?
        };

        let world_to_ego = ego_pose_at(&self.ego_poses, timestamp, frame_id)?;
        trace!(frame_id, %timestamp, "frame resolved");
        Ok(world_to_ego * ego_to_frame)
    }

    /// Ego -> world at `timestamp`
    pub fn ego_pose_at(&self, timestamp: Timestamp) -> Result<RigidTransform, ContractError> {
        ego_pose_at(&self.ego_poses, timestamp, EGO_FRAME)
    }

    /// World-frame pose of an annotation box (center + orientation).
    ///
    /// Ego-referenced boxes are lifted with the ego pose at the annotation's
    /// own timestamp.
    pub fn resolve_box(&self, annotation: &Annotation) -> Result<RigidTransform, ContractError> {
        let bbox = &annotation.bbox;
        let local = Isometry3::from_parts(Translation3::from(bbox.center.coords), bbox.rotation);
        match annotation.reference {
            ReferenceFrame::World => Ok(local),
            ReferenceFrame::Ego => Ok(self.ego_pose_at(annotation.timestamp)? * local),
        }
    }

    /// Static calibration of a frame
    pub fn sensor_to_ego(&self, frame_id: &str) -> Option<&RigidTransform> {
        self.sensor_to_ego.get(frame_id)
    }

    /// First and last ego pose timestamps
    pub fn pose_range(&self) -> Option<(Timestamp, Timestamp)> {
        Some((self.ego_poses.first()?.timestamp, self.ego_poses.last()?.timestamp))
    }

    /// Calibrated frame ids
    pub fn frame_ids(&self) -> impl Iterator<Item = &str> {
        self.sensor_to_ego.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::nalgebra::{Point3, UnitQuaternion, Vector3};
    use contracts::OrientedBox;

    fn resolver() -> TransformResolver {
        let poses: Arc<[EgoPose]> = vec![
            EgoPose::new(
                Timestamp::from_micros(0),
                Isometry3::translation(100.0, 0.0, 0.0),
            ),
            EgoPose::new(
                Timestamp::from_micros(1_000),
                Isometry3::translation(110.0, 0.0, 0.0),
            ),
        ]
        .into();
        let mut calib = HashMap::new();
        // lidar 2m forward, yawed 90 degrees
        calib.insert(
            "LIDAR_LEFT".to_string(),
            Isometry3::from_parts(
                Translation3::new(2.0, 0.0, 1.0),
                UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            ),
        );
        TransformResolver::new(calib, poses)
    }

    #[test]
    fn test_resolve_composes_calibration_and_ego() {
        let r = resolver();
        let t = r.resolve("LIDAR_LEFT", Timestamp::from_micros(500)).unwrap();
        // a point 1m along sensor x lands 1m along ego y
        let p = t * Point3::new(1.0, 0.0, 0.0);
        assert!((p - Point3::new(107.0, 1.0, 1.0)).norm() < 1e-9, "{p}");
    }

    #[test]
    fn test_unknown_frame() {
        let err = resolver()
            .resolve("RADAR_NOWHERE", Timestamp::from_micros(0))
            .unwrap_err();
        assert!(matches!(err, ContractError::UnknownFrame { .. }));
    }

    #[test]
    fn test_out_of_range_no_partial_transform() {
        let err = resolver()
            .resolve("LIDAR_LEFT", Timestamp::from_micros(1_001))
            .unwrap_err();
        match err {
            ContractError::OutOfRangeTimestamp { frame_id, .. } => assert_eq!(frame_id, "LIDAR_LEFT"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_world_and_ego_frames() {
        let r = resolver();
        let ts = Timestamp::from_micros(1_000);
        assert_eq!(r.resolve(WORLD_FRAME, ts).unwrap(), Isometry3::identity());
        let ego = r.resolve(EGO_FRAME, ts).unwrap();
        assert!((ego.translation.x - 110.0).abs() < 1e-12);
    }

    #[test]
    fn test_resolve_box_ego_reference() {
        let ann = Annotation {
            object_id: "o".into(),
            category: "vehicle.car".into(),
            timestamp: Timestamp::from_micros(0),
            bbox: OrientedBox {
                center: Point3::new(5.0, 0.0, 0.0),
                size: Vector3::new(4.0, 2.0, 1.5),
                rotation: UnitQuaternion::identity(),
            },
            reference: ReferenceFrame::Ego,
        };
        let world = resolver().resolve_box(&ann).unwrap();
        assert!((world.translation.x - 105.0).abs() < 1e-12);

        let mut world_ann = ann.clone();
        world_ann.reference = ReferenceFrame::World;
        let same = resolver().resolve_box(&world_ann).unwrap();
        assert!((same.translation.x - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_pose_range() {
        let (first, last) = resolver().pose_range().unwrap();
        assert_eq!(first.as_micros(), 0);
        assert_eq!(last.as_micros(), 1_000);
    }
}
