//! Sensor channel names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Sensor name such as `LIDAR_LEFT`; keys scene channels and names topics.
///
/// Ordered lexically, so a scene's `BTreeMap` of channels iterates the same
/// way every tick. Hashes like `str`, so maps can be queried with `&str`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ChannelId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ChannelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// serde's `rc` feature is off; go through `str`/`String`
impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Modality, Topic};
    use std::collections::BTreeMap;

    #[test]
    fn test_scene_channels_iterate_by_name() {
        let channels: BTreeMap<ChannelId, Modality> = [
            ("RADAR_LEFT_FRONT", Modality::Radar),
            ("CAMERA_FRONT", Modality::Camera),
            ("LIDAR_TOP_FRONT", Modality::Lidar),
            ("CAMERA_BACK", Modality::Camera),
        ]
        .into_iter()
        .map(|(name, modality)| (ChannelId::from(name), modality))
        .collect();

        let order: Vec<&str> = channels.keys().map(ChannelId::as_str).collect();
        assert_eq!(
            order,
            ["CAMERA_BACK", "CAMERA_FRONT", "LIDAR_TOP_FRONT", "RADAR_LEFT_FRONT"]
        );
        assert_eq!(channels.get("LIDAR_TOP_FRONT"), Some(&Modality::Lidar));
    }

    #[test]
    fn test_topics_built_from_channel() {
        let id = ChannelId::from("CAMERA_LEFT_FRONT".to_string());

        assert_eq!(
            Topic::for_channel(Modality::Camera, id.clone()).path(),
            "/camera/CAMERA_LEFT_FRONT"
        );
        assert_eq!(
            Topic::CameraInfo(id.clone()).path(),
            "/camera/CAMERA_LEFT_FRONT/camera_info"
        );
        assert_eq!(Topic::Camera(id.clone()).channel(), Some(&id));
    }

    #[test]
    fn test_manifest_name_round_trip() {
        let id: ChannelId = serde_json::from_str("\"RADAR_RIGHT_SIDE\"").unwrap();
        assert_eq!(id, ChannelId::new("RADAR_RIGHT_SIDE"));
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"RADAR_RIGHT_SIDE\"");
    }
}
