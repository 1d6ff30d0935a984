//! Annotation boxes and labels.

use std::time::Duration;

use contracts::{Annotation, AnnotationStyle, RigidTransform, Timestamp, WORLD_FRAME};
use nalgebra::Point3;

use crate::schema::{Color, CubePrimitive, Pose, SceneEntity, TextPrimitive, Vector3};

/// Entity id of the aggregate annotation topic
pub const ANNOTATION_ENTITY_ID: &str = "annotations";

const BOX_ALPHA: f64 = 0.7;

/// Exact category names first, then prefixes
const CATEGORY_COLORS: &[(&str, [f64; 3])] = &[
    ("vehicle.car", [0.0, 0.5, 1.0]),
    ("vehicle.truck", [1.0, 0.0, 0.0]),
    ("vehicle.bus", [1.0, 0.5, 0.0]),
    ("vehicle.bicycle", [0.0, 1.0, 0.0]),
    ("vehicle.motorcycle", [0.5, 0.0, 1.0]),
    ("vehicle.trailer", [0.8, 0.4, 0.0]),
    ("human.pedestrian.adult", [1.0, 1.0, 0.0]),
    ("human.pedestrian.child", [1.0, 0.8, 0.0]),
];

const CATEGORY_PREFIX_COLORS: &[(&str, [f64; 3])] = &[("movable_object", [0.5, 0.5, 0.5])];

const FALLBACK_COLOR: [f64; 3] = [0.5, 0.5, 0.5];

/// An annotation with its box pose already resolved into the world frame
#[derive(Debug, Clone, Copy)]
pub struct ResolvedBox<'a> {
    pub annotation: &'a Annotation,
    pub box_to_world: RigidTransform,
}

pub fn category_color(category: &str) -> Color {
    let [r, g, b] = CATEGORY_COLORS
        .iter()
        .find(|(name, _)| *name == category)
        .or_else(|| {
            CATEGORY_PREFIX_COLORS
                .iter()
                .find(|(prefix, _)| category.starts_with(prefix))
        })
        .map(|(_, rgb)| *rgb)
        .unwrap_or(FALLBACK_COLOR);
    Color::new(r, g, b, BOX_ALPHA)
}

/// One entity holding a cube and a label per box
pub fn annotation_entity(
    boxes: &[ResolvedBox<'_>],
    timestamp: Timestamp,
    style: &AnnotationStyle,
    lifetime: Duration,
) -> SceneEntity {
    let mut entity = SceneEntity::new(ANNOTATION_ENTITY_ID, WORLD_FRAME, timestamp, lifetime);
    entity.cubes.reserve(boxes.len());
    entity.texts.reserve(boxes.len());

    for resolved in boxes {
        let annotation = resolved.annotation;
        let size = annotation.bbox.size;

        entity.cubes.push(CubePrimitive {
            pose: Pose::from(&resolved.box_to_world),
            size: Vector3::new(size.x, size.y, size.z),
            color: category_color(&annotation.category),
        });

        let center = resolved.box_to_world * Point3::origin();
        let label = Point3::new(center.x, center.y, center.z + size.z / 2.0 + style.label_offset);
        entity.texts.push(TextPrimitive {
            pose: Pose::at(label.into()),
            billboard: true,
            font_size: style.font_size,
            scale_invariant: true,
            color: Color::WHITE,
            text: annotation.short_label().to_string(),
        });
    }

    entity
}
