//! 3-D object annotations.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Frame an annotation box is expressed in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceFrame {
    Ego,
    #[default]
    World,
}

/// Oriented 3-D box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Point3<f64>,

    /// Length (x), width (y), height (z) in meters
    pub size: Vector3<f64>,

    pub rotation: UnitQuaternion<f64>,
}

/// Annotated object at one keyframe
#[derive(Debug, Clone)]
pub struct Annotation {
    /// Instance id, stable across keyframes
    pub object_id: String,

    /// Dotted category label, e.g. `vehicle.truck`
    pub category: String,

    pub timestamp: Timestamp,

    pub bbox: OrientedBox,

    pub reference: ReferenceFrame,
}

impl Annotation {
    /// Last segment of the category (`vehicle.car` -> `car`).
    pub fn short_label(&self) -> &str {
        self.category.rsplit('.').next().unwrap_or(&self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_label() {
        let ann = Annotation {
            object_id: "obj".to_string(),
            category: "human.pedestrian.adult".to_string(),
            timestamp: Timestamp::default(),
            bbox: OrientedBox {
                center: Point3::origin(),
                size: Vector3::new(1.0, 1.0, 1.0),
                rotation: UnitQuaternion::identity(),
            },
            reference: ReferenceFrame::World,
        };
        assert_eq!(ann.short_label(), "adult");
    }
}
