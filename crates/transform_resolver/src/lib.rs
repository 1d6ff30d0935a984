//! # Transform Resolver
//!
//! Every frame id a scene knows about, resolved into the world frame at a
//! given timestamp:
//!
//! - ego poses are interpolated (linear translation, slerp rotation)
//! - static sensor calibration is composed on top
//! - no extrapolation outside the recorded pose range
//!
//! All rigid-transform math of the streamer lives here.

mod interpolate;
mod resolver;

pub use interpolate::{ego_pose_at, interpolate};
pub use resolver::TransformResolver;
