//! In-memory sample store
//!
//! Holds prebuilt scenes. Used by the synthetic recording and by tests.

use std::sync::Arc;

use contracts::{ContractError, Modality, SampleStore, Scene, SceneSelector, SceneSummary};
use tracing::debug;

/// Sample store over scenes already in memory
#[derive(Debug, Clone)]
pub struct InMemorySampleStore {
    name: String,
    scenes: Vec<Arc<Scene>>,
    sensors: Vec<(String, Modality)>,
}

impl InMemorySampleStore {
    /// Build a store; the sensor rig is the union of every scene's channels.
    ///
    /// Scene indices are reassigned to match store order.
    pub fn new(name: impl Into<String>, scenes: Vec<Scene>) -> Self {
        let mut sensors: Vec<(String, Modality)> = Vec::new();
        let scenes = scenes
            .into_iter()
            .enumerate()
            .map(|(index, mut scene)| {
                scene.index = index;
                for channel in scene.channels.values() {
                    if !sensors.iter().any(|(name, _)| name == channel.id.as_str()) {
                        sensors.push((channel.id.to_string(), channel.modality));
                    }
                }
                Arc::new(scene)
            })
            .collect();

        sensors.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));

        Self {
            name: name.into(),
            scenes,
            sensors,
        }
    }

    fn find(&self, selector: &SceneSelector) -> Option<&Arc<Scene>> {
        match selector {
            SceneSelector::Index(i) => self.scenes.get(*i),
            SceneSelector::Id(id) => self.scenes.iter().find(|s| &s.id == id),
        }
    }
}

impl SampleStore for InMemorySampleStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn scenes(&self) -> Vec<SceneSummary> {
        self.scenes.iter().map(|s| s.summary()).collect()
    }

    fn sensors(&self) -> Vec<(String, Modality)> {
        self.sensors.clone()
    }

    fn load_scene(&self, selector: &SceneSelector) -> Result<Arc<Scene>, ContractError> {
        let scene = self
            .find(selector)
            .cloned()
            .ok_or_else(|| ContractError::scene_load(selector, "no such scene"))?;
        debug!(store = %self.name, scene = %scene.id, "scene loaded");
        Ok(scene)
    }

    fn scene_count(&self) -> usize {
        self.scenes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{SyntheticConfig, SyntheticRecording};

    fn store() -> InMemorySampleStore {
        SyntheticRecording::new(SyntheticConfig {
            scenes: 2,
            keyframes: 4,
            ..Default::default()
        })
        .into_store()
    }

    #[test]
    fn test_load_by_index_and_id() {
        let store = store();
        assert_eq!(store.scene_count(), 2);

        let by_index = store.load_scene(&SceneSelector::Index(1)).unwrap();
        let by_id = store
            .load_scene(&SceneSelector::Id(by_index.id.clone()))
            .unwrap();
        assert!(Arc::ptr_eq(&by_index, &by_id));
        assert_eq!(by_index.index, 1);
    }

    #[test]
    fn test_unknown_scene_is_scene_load_failure() {
        let err = store().load_scene(&SceneSelector::Index(7)).unwrap_err();
        assert!(matches!(err, ContractError::SceneLoadFailure { .. }));
    }

    #[test]
    fn test_sensor_rig_ordered_by_modality() {
        let sensors = store().sensors();
        assert_eq!(sensors.len(), 17);
        assert_eq!(sensors[0].1, Modality::Camera);
        assert_eq!(sensors.last().map(|s| s.1), Some(Modality::Radar));
    }
}
