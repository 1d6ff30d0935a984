//! SampleStore trait - dataset layer boundary
//!
//! The dataset layer owns on-disk layout, metadata tables and record
//! validation. The streaming core only sees fully loaded, read-only scenes.

use std::sync::Arc;

use crate::{ContractError, Modality, Scene, SceneSelector, SceneSummary};

/// Read-only access to the recorded scenes
///
/// # Example
///
/// ```ignore
/// let store: Arc<dyn SampleStore> = open_store(root)?;
/// let scene = store.load_scene(&SceneSelector::Index(0))?;
/// for channel in scene.channels.values() {
///     println!("{} has {} samples", channel.id, channel.len());
/// }
/// ```
pub trait SampleStore: Send + Sync {
    /// Store name (used for logging)
    fn name(&self) -> &str;

    /// All scenes in store order
    fn scenes(&self) -> Vec<SceneSummary>;

    /// Sensor rig: every channel name with its modality, in registry order.
    ///
    /// The channel registry is built from this once at startup, so it must
    /// cover every channel any scene can contain.
    fn sensors(&self) -> Vec<(String, Modality)>;

    /// Load one scene.
    ///
    /// # Errors
    /// Returns `ContractError::SceneLoadFailure` when the scene is unknown or
    /// its records cannot be read.
    fn load_scene(&self, selector: &SceneSelector) -> Result<Arc<Scene>, ContractError>;

    fn scene_count(&self) -> usize {
        self.scenes().len()
    }
}
