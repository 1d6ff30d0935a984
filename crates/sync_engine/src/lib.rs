//! # Sync Engine
//!
//! Frame synchronizer for scene playback.
//!
//! Responsibilities:
//! - `TickClock`: publish ticks over a scene's keyframe span
//! - `FrameSynchronizer`: per-channel sample selection at a tick under a
//!   staleness bound (`at_or_before` or `nearest` policy)
//! - `AnnotationIndex`: active annotation set at a tick
//!
//! ## Usage Example
//!
//! ```ignore
//! use sync_engine::{FrameSynchronizer, TickClock};
//!
//! let mut sync = FrameSynchronizer::from_config(&config.sync);
//! sync.load_scene(&scene);
//!
//! let mut clock = TickClock::for_keyframes(&scene.keyframes, None, 1.0).unwrap();
//! while let Some(tick) = clock.next_tick() {
//!     let selection = sync.select_samples(tick);
//!     for (channel, sample) in selection.selected() {
//!         // resolve, encode, publish
//!     }
//!     sync.record(&selection);
//! }
//! ```

mod annotation_index;
mod clock;
mod selection;
mod synchronizer;

pub use annotation_index::AnnotationIndex;
pub use clock::{median_spacing, TickClock, FALLBACK_RATE_HZ};
pub use selection::{AbsenceReason, SampleRef, Selection, TickSelection};
pub use synchronizer::{FrameSynchronizer, SyncStats};

// Re-export contracts types
pub use contracts::{SelectionPolicy, SyncConfig};
