//! # Scene Store
//!
//! Sample store implementations behind `contracts::SampleStore`.
//!
//! - `ManifestSampleStore`: dataset root with `manifest.json` plus per-scene
//!   JSON-lines tables; point files decoded with `bytemuck`, image
//!   resolution probed with `image`
//! - `InMemorySampleStore`: prebuilt scenes
//! - `synthetic`: deterministic full-rig recording for demos and tests
//!
//! ## Usage Example
//!
//! ```ignore
//! use contracts::{SampleStore, SceneSelector};
//! use scene_store::ManifestSampleStore;
//!
//! let store = ManifestSampleStore::open("/data/truckscenes")?;
//! for summary in store.scenes() {
//!     println!("{} {}", summary.index, summary.name);
//! }
//! let scene = store.load_scene(&SceneSelector::Index(0))?;
//! ```

pub mod decode;
mod error;
mod manifest;
mod memory;
pub mod synthetic;

use std::path::Path;
use std::sync::Arc;

pub use contracts::SampleStore;
pub use error::{Result, StoreError};
pub use manifest::{
    AnnotationRecord, EgoPoseRecord, ManifestRecord, ManifestSampleStore, SampleRecord,
    SceneRecord, SensorRecord, MANIFEST_FILE,
};
pub use memory::InMemorySampleStore;
pub use synthetic::{SyntheticConfig, SyntheticRecording};

/// Open the store for a dataset root, or the synthetic recording when `root`
/// is None.
pub fn open_store(root: Option<&Path>) -> Result<Arc<dyn SampleStore>> {
    match root {
        Some(root) => Ok(Arc::new(ManifestSampleStore::open(root)?)),
        None => Ok(Arc::new(
            SyntheticRecording::new(SyntheticConfig::default()).into_store(),
        )),
    }
}
