//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the streamer:
//! the scene data model, the wire topic surface, the error taxonomy and the
//! collaborator traits (`SampleStore`, `ViewerTransport`).
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Dataset timestamps are microseconds (`Timestamp`), the single clock
//!   for sample selection, pose interpolation and wire log times.
//! - The ego frame is `base_link`, the scene-fixed frame is `world`.

mod annotation;
mod calibration;
mod channel_id;
mod error;
mod sample;
mod scene;
mod store;
mod streamer_config;
mod timestamp;
mod topic;
mod transport;

pub use annotation::*;
pub use calibration::*;
pub use channel_id::ChannelId;
pub use error::*;
pub use sample::*;
pub use scene::*;
pub use store::SampleStore;
pub use streamer_config::*;
pub use timestamp::Timestamp;
pub use topic::*;
pub use transport::*;

/// Re-export of the transform math types used throughout the contracts.
pub use nalgebra;
