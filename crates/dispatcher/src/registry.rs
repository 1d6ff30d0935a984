//! Channel registry - fixed topic table advertised to every viewer

use std::collections::HashMap;

use contracts::{Modality, Topic};

/// Numeric channel id as advertised on the wire
pub type ChannelNumber = u32;

/// One advertised channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub id: ChannelNumber,
    pub topic: Topic,
}

impl ChannelSpec {
    pub fn schema_name(&self) -> &'static str {
        self.topic.schema_name()
    }
}

/// Topic table built once at startup; ids follow registry order.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: Vec<ChannelSpec>,
    by_topic: HashMap<Topic, ChannelNumber>,
}

impl ChannelRegistry {
    /// Register topics in the given order, skipping duplicates.
    pub fn new(topics: impl IntoIterator<Item = Topic>) -> Self {
        let mut registry = Self::default();
        for topic in topics {
            if registry.by_topic.contains_key(&topic) {
                continue;
            }
            let id = registry.channels.len() as ChannelNumber + 1;
            registry.by_topic.insert(topic.clone(), id);
            registry.channels.push(ChannelSpec { id, topic });
        }
        registry
    }

    /// Full topic surface for a sensor rig: every data topic (plus
    /// `camera_info` after each camera), then `/annotations` and `/tf`.
    pub fn for_sensors<'a>(sensors: impl IntoIterator<Item = (&'a str, Modality)>) -> Self {
        let mut topics = Vec::new();
        for (name, modality) in sensors {
            topics.push(Topic::for_channel(modality, name.into()));
            if modality == Modality::Camera {
                topics.push(Topic::CameraInfo(name.into()));
            }
        }
        topics.push(Topic::Annotations);
        topics.push(Topic::Transforms);
        Self::new(topics)
    }

    pub fn channels(&self) -> &[ChannelSpec] {
        &self.channels
    }

    pub fn get(&self, id: ChannelNumber) -> Option<&ChannelSpec> {
        self.channels.get(id.checked_sub(1)? as usize)
    }

    pub fn id_of(&self, topic: &Topic) -> Option<ChannelNumber> {
        self.by_topic.get(topic).copied()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
