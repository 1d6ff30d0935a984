//! StreamerConfig - Config Loader output
//!
//! Every field has a serde default, so an empty document is a valid config.
//! Range rules are declared with `validator`; cross-field rules live in
//! `config_loader`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Complete streamer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StreamerConfig {
    #[validate(nested)]
    pub dataset: DatasetConfig,

    #[validate(nested)]
    pub scene: SceneConfig,

    #[validate(nested)]
    pub sync: SyncConfig,

    #[validate(nested)]
    pub encoder: EncoderConfig,

    #[validate(nested)]
    pub server: ServerConfig,

    #[validate(nested)]
    pub observability: ObservabilitySettings,
}

/// Dataset location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatasetConfig {
    /// Dataset root directory (None = must come from CLI / env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Dataset version label
    #[validate(length(min = 1))]
    pub version: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: None,
            version: "v1.1-mini".to_string(),
        }
    }
}

/// Initial scene and end-of-scene behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SceneConfig {
    /// Scene index in store order
    pub index: usize,

    /// Scene token; takes precedence over `index` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub end_of_scene: EndOfScene,
}

/// What the scene loop does after the last keyframe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfScene {
    /// Restart the same scene
    Loop,
    /// Advance to the following scene, wrapping at the end
    #[default]
    Next,
    /// Stop streaming
    Stop,
}

/// Frame synchronizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SyncConfig {
    /// Samples older than this at a tick are not published
    #[validate(range(min = 1))]
    pub max_staleness_ms: u64,

    pub policy: SelectionPolicy,

    /// Publish cadence (None = derived from keyframe spacing)
    #[validate(range(min = 0.01, max = 1000.0))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_rate_hz: Option<f64>,

    /// Playback speed multiplier
    #[validate(range(min = 0.01, max = 1000.0))]
    pub speed: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_staleness_ms: 250,
            policy: SelectionPolicy::default(),
            publish_rate_hz: None,
            speed: 1.0,
        }
    }
}

impl SyncConfig {
    pub fn max_staleness(&self) -> Duration {
        Duration::from_millis(self.max_staleness_ms)
    }
}

/// Per-channel sample selection rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Latest sample with timestamp <= tick
    #[default]
    AtOrBefore,
    /// Sample closest to the tick on either side (ties go to the earlier one)
    Nearest,
}

/// RGBA colour, every channel in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn channels(&self) -> [(&'static str, f64); 4] {
        [("r", self.r), ("g", self.g), ("b", self.b), ("a", self.a)]
    }
}

/// Payload encoder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EncoderConfig {
    #[validate(nested)]
    pub lidar: LidarStyle,

    #[validate(nested)]
    pub radar: RadarStyle,

    #[validate(nested)]
    pub annotations: AnnotationStyle,

    /// Lifetime of scene entities in the viewer
    #[validate(range(min = 1))]
    pub entity_lifetime_ms: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            lidar: LidarStyle::default(),
            radar: RadarStyle::default(),
            annotations: AnnotationStyle::default(),
            entity_lifetime_ms: 500,
        }
    }
}

impl EncoderConfig {
    pub fn entity_lifetime(&self) -> Duration {
        Duration::from_millis(self.entity_lifetime_ms)
    }
}

/// Lidar point batch style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LidarStyle {
    /// Points kept per message (evenly strided)
    #[validate(range(min = 1))]
    pub max_points: usize,

    #[validate(range(exclusive_min = 0.0))]
    pub point_size: f64,

    pub color: Rgba,
}

impl Default for LidarStyle {
    fn default() -> Self {
        Self {
            max_points: 3000,
            point_size: 0.1,
            color: Rgba::new(0.0, 1.0, 0.0, 1.0),
        }
    }
}

/// Radar point batch style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RadarStyle {
    #[validate(range(min = 1))]
    pub max_points: usize,

    #[validate(range(exclusive_min = 0.0))]
    pub point_size: f64,

    /// Fixed colour used in `modality` mode
    pub color: Rgba,

    pub color_mode: RadarColorMode,
}

impl Default for RadarStyle {
    fn default() -> Self {
        Self {
            max_points: 800,
            point_size: 0.3,
            color: Rgba::new(1.0, 0.3, 0.0, 1.0),
            color_mode: RadarColorMode::default(),
        }
    }
}

/// Radar point colouring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadarColorMode {
    /// One fixed colour for the whole batch
    #[default]
    Modality,
    /// Blue -> yellow -> red gradient over radar cross-section
    Rcs,
}

/// Annotation label style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AnnotationStyle {
    /// Label height above the box top (meters)
    pub label_offset: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub font_size: f64,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            label_offset: 0.5,
            font_size: 12.0,
        }
    }
}

/// Viewer server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    #[validate(range(min = 1))]
    pub port: u16,

    /// Name reported in `serverInfo`
    pub name: String,

    /// Outbound queue depth per session
    #[validate(range(min = 1))]
    pub session_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            name: "TruckScenes Streamer".to_string(),
            session_queue_capacity: 64,
        }
    }
}

/// Logging and metrics export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub log_format: LogFormat,

    /// Default filter when `RUST_LOG` is unset
    pub log_level: String,

    /// Prometheus port (None = disabled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: "info".to_string(),
            metrics_port: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON structured logs
    Json,
    /// Human readable multi-line
    #[default]
    Pretty,
    /// Compact single-line
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = StreamerConfig::default();
        assert_eq!(cfg.sync.max_staleness(), Duration::from_millis(250));
        assert_eq!(cfg.server.port, 8765);
        assert_eq!(cfg.encoder.lidar.max_points, 3000);
        assert_eq!(cfg.encoder.radar.max_points, 800);
        assert_eq!(cfg.scene.end_of_scene, EndOfScene::Next);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let mut cfg = StreamerConfig::default();
        cfg.server.session_queue_capacity = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_non_positive_rate_rejected() {
        let mut cfg = StreamerConfig::default();
        cfg.sync.publish_rate_hz = Some(0.0);
        assert!(cfg.validate().is_err());
    }
}
