//! Lidar and radar point batches as world-frame sphere lists.

use std::time::Duration;

use contracts::{
    CloudPoint, LidarStyle, PointCloud, RadarColorMode, RadarStyle, Rgba, RigidTransform,
    Timestamp, WORLD_FRAME,
};
use nalgebra::Point3;

use crate::schema::{Color, Pose, SceneEntity, SpherePrimitive, Vector3};

/// RCS range mapped onto the gradient (dBsm)
pub const RCS_MIN_DBSM: f32 = -20.0;
pub const RCS_MAX_DBSM: f32 = 30.0;

/// Resolved drawing parameters for one batch
#[derive(Debug, Clone, Copy)]
pub struct PointStyle {
    pub max_points: usize,
    pub point_size: f64,
    pub color: Rgba,
    pub by_rcs: bool,
}

impl From<&LidarStyle> for PointStyle {
    fn from(style: &LidarStyle) -> Self {
        Self {
            max_points: style.max_points,
            point_size: style.point_size,
            color: style.color,
            by_rcs: false,
        }
    }
}

impl From<&RadarStyle> for PointStyle {
    fn from(style: &RadarStyle) -> Self {
        Self {
            max_points: style.max_points,
            point_size: style.point_size,
            color: style.color,
            by_rcs: style.color_mode == RadarColorMode::Rcs,
        }
    }
}

/// Indices kept when capping `len` points to `max` (evenly strided, first
/// point always kept).
pub fn capped_indices(len: usize, max: usize) -> impl Iterator<Item = usize> {
    let keep = len.min(max);
    (0..keep).map(move |i| i * len / keep.max(1))
}

/// Blue -> yellow -> red over the RCS range
pub fn rcs_color(rcs: f32) -> Color {
    let n = ((rcs - RCS_MIN_DBSM) / (RCS_MAX_DBSM - RCS_MIN_DBSM)).clamp(0.0, 1.0) as f64;
    if n < 0.5 {
        Color::new(n * 2.0, n * 2.0, 1.0 - n * 2.0, 1.0)
    } else {
        Color::new(1.0, 1.0 - (n - 0.5) * 2.0, 0.0, 1.0)
    }
}

fn point_color(point: &CloudPoint, style: &PointStyle) -> Color {
    match (style.by_rcs, point.intensity) {
        (true, Some(rcs)) => rcs_color(rcs),
        _ => style.color.into(),
    }
}

/// One entity (id = channel) with every kept point moved sensor -> world.
pub fn point_entity(
    channel: &str,
    cloud: &PointCloud,
    sensor_to_world: &RigidTransform,
    timestamp: Timestamp,
    style: &PointStyle,
    lifetime: Duration,
) -> SceneEntity {
    let size = Vector3::splat(style.point_size);
    let mut entity = SceneEntity::new(channel, WORLD_FRAME, timestamp, lifetime);

    entity.spheres = capped_indices(cloud.len(), style.max_points)
        .map(|i| {
            let point = &cloud.points[i];
            let [x, y, z] = point.position;
            let world = sensor_to_world * Point3::new(x as f64, y as f64, z as f64);
            SpherePrimitive {
                pose: Pose::at(world.into()),
                size,
                color: point_color(point, style),
            }
        })
        .collect();

    entity
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3 as NVector3};

    fn style(max_points: usize, by_rcs: bool) -> PointStyle {
        PointStyle {
            max_points,
            point_size: 0.1,
            color: Rgba::new(0.0, 1.0, 0.0, 1.0),
            by_rcs,
        }
    }

    #[test]
    fn test_cap_is_strided() {
        let kept: Vec<_> = capped_indices(10, 5).collect();
        assert_eq!(kept, vec![0, 2, 4, 6, 8]);
        assert_eq!(capped_indices(3, 5).count(), 3);
        assert_eq!(capped_indices(0, 5).count(), 0);
    }

    #[test]
    fn test_rcs_gradient_endpoints() {
        assert_eq!(rcs_color(-40.0), Color::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(rcs_color(5.0), Color::new(1.0, 1.0, 0.0, 1.0));
        assert_eq!(rcs_color(60.0), Color::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_rcs_without_intensity_falls_back() {
        let point = CloudPoint::new(1.0, 2.0, 3.0);
        assert_eq!(point_color(&point, &style(10, true)), Color::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn test_points_moved_to_world() {
        let cloud = PointCloud::new(vec![CloudPoint::new(1.0, 0.0, 0.0)]);
        let transform = Isometry3::from_parts(
            Translation3::new(10.0, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&NVector3::z_axis(), std::f64::consts::FRAC_PI_2),
        );
        let entity = point_entity(
            "LIDAR_LEFT",
            &cloud,
            &transform,
            Timestamp::from_micros(1),
            &style(10, false),
            Duration::from_millis(500),
        );
        assert_eq!(entity.frame_id, "world");
        let p = entity.spheres[0].pose.position;
        assert!((p.x - 10.0).abs() < 1e-9);
        assert!((p.y - 1.0).abs() < 1e-9);
        assert!(p.z.abs() < 1e-9);
    }
}
