//! Scene - one recording segment, held read-only while streaming.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Annotation, Calibration, ChannelId, EgoPose, Modality, SensorChannel, Timestamp};

/// How a scene is requested from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneSelector {
    Index(usize),
    Id(String),
}

impl fmt::Display for SceneSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneSelector::Index(i) => write!(f, "#{i}"),
            SceneSelector::Id(id) => f.write_str(id),
        }
    }
}

/// Lightweight scene listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSummary {
    pub index: usize,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub keyframe_count: usize,
}

/// A fully loaded recording segment
#[derive(Debug, Clone)]
pub struct Scene {
    /// Store-assigned identifier (token)
    pub id: String,

    /// Position in the store's scene list
    pub index: usize,

    pub name: String,

    pub description: String,

    /// Ordered keyframe timestamps
    pub keyframes: Vec<Timestamp>,

    /// Sensor channels keyed by sensor name
    pub channels: BTreeMap<ChannelId, Arc<SensorChannel>>,

    /// Static calibration keyed by sensor frame id
    pub calibrations: HashMap<String, Arc<Calibration>>,

    /// Ego poses ordered by timestamp
    pub ego_poses: Arc<[EgoPose]>,

    pub annotations: Vec<Annotation>,
}

impl Scene {
    pub fn summary(&self) -> SceneSummary {
        SceneSummary {
            index: self.index,
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            keyframe_count: self.keyframes.len(),
        }
    }

    /// First and last keyframe
    pub fn time_span(&self) -> Option<(Timestamp, Timestamp)> {
        Some((*self.keyframes.first()?, *self.keyframes.last()?))
    }

    pub fn channels_of(&self, modality: Modality) -> impl Iterator<Item = &Arc<SensorChannel>> {
        self.channels
            .values()
            .filter(move |c| c.modality == modality)
    }
}
