//! Per-tick transform set.

use contracts::{RigidTransform, Timestamp, WORLD_FRAME};
use nalgebra::Point3;

use crate::schema::{FrameTransform, FrameTransforms};

/// A frame resolved into the world frame at its own timestamp
#[derive(Debug, Clone)]
pub struct ResolvedFrame {
    pub frame_id: String,
    pub timestamp: Timestamp,
    pub frame_to_world: RigidTransform,
}

impl ResolvedFrame {
    pub fn new(frame_id: impl Into<String>, timestamp: Timestamp, frame_to_world: RigidTransform) -> Self {
        Self {
            frame_id: frame_id.into(),
            timestamp,
            frame_to_world,
        }
    }
}

pub fn frame_transforms(frames: &[ResolvedFrame]) -> FrameTransforms {
    FrameTransforms {
        transforms: frames
            .iter()
            .map(|frame| FrameTransform {
                timestamp: frame.timestamp.into(),
                parent_frame_id: WORLD_FRAME.to_string(),
                child_frame_id: frame.frame_id.clone(),
                translation: Point3::from(frame.frame_to_world.translation.vector).into(),
                rotation: frame.frame_to_world.rotation.into(),
            })
            .collect(),
    }
}
