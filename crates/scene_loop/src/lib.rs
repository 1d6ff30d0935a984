//! # Scene Loop
//!
//! The single producer of the streamer: drives publish ticks over the loaded
//! scene and feeds the stream publisher.
//!
//! Responsibilities:
//! - Tick cadence from the scene's keyframes (`TickClock`)
//! - Per tick: select -> resolve -> encode -> publish, then latched
//!   `camera_info`, `/annotations` and the `/tf` batch
//! - Scene changes on request and at end of scene (`loop` / `next` / `stop`)
//! - Drain every session before the scene is released
//!
//! ## Usage Example
//!
//! ```ignore
//! use scene_loop::{build_publisher, SceneLoop};
//!
//! let publisher = build_publisher(store.as_ref(), &config.server)?;
//! let scene = store.load_scene(&SceneSelector::Index(0))?;
//! let (scene_loop, handle) = SceneLoop::new(store, scene, &config, publisher)?;
//!
//! let task = tokio::spawn(scene_loop.run());
//! handle.change_scene(SceneSelector::Index(3)).await?;
//! handle.stop();
//! let summary = task.await?;
//! println!("{}", summary.metrics);
//! ```

mod error;
mod handle;
mod history;
mod report;
mod runner;

use contracts::{SampleStore, ServerConfig};
use dispatcher::{ChannelRegistry, PublisherError, StreamPublisher};

pub use error::SceneLoopError;
pub use handle::SceneLoopHandle;
pub use history::{TickHistory, DEFAULT_HISTORY_LEN};
pub use report::TickReport;
pub use runner::{RunSummary, SceneLoop};

/// Publisher whose registry covers the store's whole sensor rig
pub fn build_publisher(
    store: &dyn SampleStore,
    config: &ServerConfig,
) -> Result<StreamPublisher, PublisherError> {
    let sensors = store.sensors();
    let registry = ChannelRegistry::for_sensors(
        sensors
            .iter()
            .map(|(name, modality)| (name.as_str(), *modality)),
    );
    StreamPublisher::new(registry, config)
}
