//! Ego pose interpolation.

use contracts::{ContractError, EgoPose, RigidTransform, Timestamp};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};

/// Rotations closer than this fall back to normalized lerp
const SLERP_EPSILON: f64 = 1e-9;

/// Blend two rigid transforms: translation linearly, rotation spherically.
///
/// `t` = 0 yields `a`, `t` = 1 yields `b`.
pub fn interpolate(a: &RigidTransform, b: &RigidTransform, t: f64) -> RigidTransform {
    let translation = a.translation.vector.lerp(&b.translation.vector, t);
    // q and -q are one rotation; take b on a's hemisphere
    let target = if a.rotation.coords.dot(&b.rotation.coords) < 0.0 {
        UnitQuaternion::new_unchecked(-b.rotation.into_inner())
    } else {
        b.rotation
    };
    // slerp gives up on nearly identical rotations
    let rotation = a
        .rotation
        .try_slerp(&target, t, SLERP_EPSILON)
        .unwrap_or_else(|| a.rotation.nlerp(&target, t));
    Isometry3::from_parts(Translation3::from(translation), rotation)
}

/// Ego -> world at `timestamp`.
///
/// Binary search for the bracketing poses; an exact hit is returned
/// unmodified. No extrapolation: anything outside `[first, last]` (and any
/// lookup on an empty sequence) is `OutOfRangeTimestamp`.
pub fn ego_pose_at(
    poses: &[EgoPose],
    timestamp: Timestamp,
    frame_id: &str,
) -> Result<RigidTransform, ContractError> {
    let out_of_range = || ContractError::OutOfRangeTimestamp {
        frame_id: frame_id.to_string(),
        timestamp,
        first: poses.first().map(|p| p.timestamp).unwrap_or_default(),
        last: poses.last().map(|p| p.timestamp).unwrap_or_default(),
    };

    let (first, last) = match (poses.first(), poses.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(out_of_range()),
    };
    if timestamp < first.timestamp || timestamp > last.timestamp {
        return Err(out_of_range());
    }

    let idx = poses.partition_point(|p| p.timestamp < timestamp);
    let after = &poses[idx];
    if after.timestamp == timestamp {
        return Ok(after.ego_to_world);
    }

    // timestamp > first, so idx >= 1
    let before = &poses[idx - 1];
    let span = (after.timestamp.as_micros() - before.timestamp.as_micros()) as f64;
    let t = (timestamp.as_micros() - before.timestamp.as_micros()) as f64 / span;
    Ok(interpolate(&before.ego_to_world, &after.ego_to_world, t))
}
