//! Wire topic surface and encoded messages.

use std::fmt;

use bytes::Bytes;

use crate::{ChannelId, Modality, Timestamp};

/// JSON schema advertised for camera topics
pub const COMPRESSED_IMAGE_SCHEMA: &str = r#"{"type":"object","properties":{"timestamp":{"type":"object"},"frame_id":{"type":"string"},"format":{"type":"string"},"data":{"type":"string","contentEncoding":"base64"}}}"#;

/// Every stream the viewer can subscribe to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// `/camera/<NAME>`
    Camera(ChannelId),
    /// `/camera/<NAME>/camera_info`
    CameraInfo(ChannelId),
    /// `/lidar/<NAME>`
    Lidar(ChannelId),
    /// `/radar/<NAME>`
    Radar(ChannelId),
    /// `/annotations`
    Annotations,
    /// `/tf`
    Transforms,
}

impl Topic {
    /// Data topic carrying a channel's samples
    pub fn for_channel(modality: Modality, channel: ChannelId) -> Self {
        match modality {
            Modality::Camera => Topic::Camera(channel),
            Modality::Lidar => Topic::Lidar(channel),
            Modality::Radar => Topic::Radar(channel),
        }
    }

    /// Topic path as advertised to viewers
    pub fn path(&self) -> String {
        match self {
            Topic::Camera(name) => format!("/camera/{name}"),
            Topic::CameraInfo(name) => format!("/camera/{name}/camera_info"),
            Topic::Lidar(name) => format!("/lidar/{name}"),
            Topic::Radar(name) => format!("/radar/{name}"),
            Topic::Annotations => "/annotations".to_string(),
            Topic::Transforms => "/tf".to_string(),
        }
    }

    /// Schema of the JSON payload
    pub fn schema_name(&self) -> &'static str {
        match self {
            Topic::Camera(_) => "foxglove.CompressedImage",
            Topic::CameraInfo(_) => "foxglove.CameraCalibration",
            Topic::Lidar(_) | Topic::Radar(_) | Topic::Annotations => "foxglove.SceneUpdate",
            Topic::Transforms => "foxglove.FrameTransforms",
        }
    }

    /// `schemaEncoding` of the advertisement; only camera topics carry one
    pub fn schema_encoding(&self) -> Option<&'static str> {
        match self {
            Topic::Camera(_) => Some("jsonschema"),
            _ => None,
        }
    }

    pub fn schema(&self) -> &'static str {
        match self {
            Topic::Camera(_) => COMPRESSED_IMAGE_SCHEMA,
            _ => "",
        }
    }

    /// Sensor channel behind the topic, if any
    pub fn channel(&self) -> Option<&ChannelId> {
        match self {
            Topic::Camera(c) | Topic::CameraInfo(c) | Topic::Lidar(c) | Topic::Radar(c) => Some(c),
            Topic::Annotations | Topic::Transforms => None,
        }
    }

    /// Short kind label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Topic::Camera(_) => "camera",
            Topic::CameraInfo(_) => "camera_info",
            Topic::Lidar(_) => "lidar",
            Topic::Radar(_) => "radar",
            Topic::Annotations => "annotations",
            Topic::Transforms => "tf",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Encoded message ready for fan-out
#[derive(Debug, Clone)]
pub struct WireMessage {
    pub topic: Topic,

    /// Log time carried in the binary frame header
    pub log_time: Timestamp,

    /// JSON payload (zero-copy across sessions)
    pub payload: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_paths() {
        let cam: ChannelId = "CAMERA_LEFT_FRONT".into();
        assert_eq!(Topic::Camera(cam.clone()).path(), "/camera/CAMERA_LEFT_FRONT");
        assert_eq!(
            Topic::CameraInfo(cam).path(),
            "/camera/CAMERA_LEFT_FRONT/camera_info"
        );
        assert_eq!(Topic::Lidar("LIDAR_LEFT".into()).path(), "/lidar/LIDAR_LEFT");
        assert_eq!(Topic::Radar("RADAR_LEFT_BACK".into()).path(), "/radar/RADAR_LEFT_BACK");
        assert_eq!(Topic::Annotations.path(), "/annotations");
        assert_eq!(Topic::Transforms.path(), "/tf");
    }

    #[test]
    fn test_only_camera_has_json_schema() {
        let cam = Topic::Camera("CAMERA_FRONT".into());
        assert_eq!(cam.schema_encoding(), Some("jsonschema"));
        assert!(cam.schema().contains("base64"));
        assert_eq!(Topic::Transforms.schema_encoding(), None);
        assert_eq!(Topic::Transforms.schema(), "");
    }

    #[test]
    fn test_for_channel_matches_modality() {
        let id: ChannelId = "RADAR_RIGHT_SIDE".into();
        assert_eq!(
            Topic::for_channel(Modality::Radar, id.clone()),
            Topic::Radar(id)
        );
    }
}
