//! Annotation lookup by tick.

use contracts::{Annotation, Timestamp};

/// Annotations grouped by keyframe timestamp
///
/// The active set at a tick is the group of the latest annotated keyframe at
/// or before the tick; it stays active until the next annotated keyframe.
#[derive(Debug, Clone, Default)]
pub struct AnnotationIndex {
    groups: Vec<(Timestamp, Vec<Annotation>)>,
}

impl AnnotationIndex {
    pub fn new(annotations: &[Annotation]) -> Self {
        let mut sorted = annotations.to_vec();
        sorted.sort_by_key(|a| a.timestamp);

        let mut groups: Vec<(Timestamp, Vec<Annotation>)> = Vec::new();
        for ann in sorted {
            match groups.last_mut() {
                Some((ts, group)) if *ts == ann.timestamp => group.push(ann),
                _ => groups.push((ann.timestamp, vec![ann])),
            }
        }
        Self { groups }
    }

    /// Active annotations at `tick`, with the keyframe they belong to.
    pub fn active_at(&self, tick: Timestamp) -> Option<(Timestamp, &[Annotation])> {
        let idx = self
            .groups
            .partition_point(|(ts, _)| *ts <= tick)
            .checked_sub(1)?;
        let (ts, group) = &self.groups[idx];
        Some((*ts, group.as_slice()))
    }

    /// Number of annotated keyframes
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
