//! Sample - Sample Store output
//!
//! Immutable per-sensor samples and the channels that order them.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Calibration, ChannelId, Timestamp};

/// Sensor modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Camera,
    Lidar,
    Radar,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Camera, Modality::Lidar, Modality::Radar];

    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Camera => "camera",
            Modality::Lidar => "lidar",
            Modality::Radar => "radar",
        }
    }

    /// Guess the modality from a rig channel name such as `RADAR_LEFT_BACK`.
    pub fn infer_from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        if upper.contains("CAMERA") {
            Some(Modality::Camera)
        } else if upper.contains("LIDAR") {
            Some(Modality::Lidar)
        } else if upper.contains("RADAR") {
            Some(Modality::Radar)
        } else {
            None
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped sensor reading
#[derive(Debug, Clone)]
pub struct Sample {
    /// Owning channel
    pub channel: ChannelId,

    /// Capture time
    pub timestamp: Timestamp,

    /// Sensor frame the payload is expressed in
    pub frame_id: String,

    /// Static calibration shared by every sample of the sensor
    pub calibration: Option<Arc<Calibration>>,

    /// Modality-specific payload
    pub payload: SamplePayload,
}

impl Sample {
    pub fn modality(&self) -> Modality {
        self.payload.modality()
    }
}

/// Closed set of payload kinds, matched exhaustively by the encoders
#[derive(Debug, Clone)]
pub enum SamplePayload {
    /// Already-compressed camera frame
    Camera(CameraImage),

    /// Lidar sweep in the sensor frame
    Lidar(PointCloud),

    /// Radar detections in the sensor frame
    Radar(PointCloud),
}

impl SamplePayload {
    pub fn modality(&self) -> Modality {
        match self {
            SamplePayload::Camera(_) => Modality::Camera,
            SamplePayload::Lidar(_) => Modality::Lidar,
            SamplePayload::Radar(_) => Modality::Radar,
        }
    }
}

/// Compressed image bytes plus resolution
#[derive(Debug, Clone)]
pub struct CameraImage {
    /// Compression format, as understood by the viewer ("jpeg", "png")
    pub format: ImageFormat,

    pub width: u32,

    pub height: u32,

    /// Encoded image bytes (zero-copy)
    pub data: Bytes,
}

/// Compressed image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }
}

/// Ordered point sequence
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub points: Vec<CloudPoint>,
}

impl PointCloud {
    pub fn new(points: Vec<CloudPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A single lidar return or radar detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudPoint {
    /// Position in the sensor frame (meters)
    pub position: [f32; 3],

    /// Lidar intensity, or radar cross-section in dBsm
    pub intensity: Option<f32>,
}

impl CloudPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            intensity: None,
        }
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = Some(intensity);
        self
    }
}

/// One sensor's independent timestamped sample stream
#[derive(Debug, Clone)]
pub struct SensorChannel {
    pub id: ChannelId,

    pub modality: Modality,

    /// Native rate, informational only
    pub rate_hz: Option<f64>,

    /// Samples ordered by timestamp
    samples: Vec<Sample>,
}

impl SensorChannel {
    /// Build a channel, ordering samples by timestamp.
    ///
    /// The sort is stable so samples sharing a timestamp keep load order.
    pub fn new(id: ChannelId, modality: Modality, mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self {
            id,
            modality,
            rate_hz: None,
            samples,
        }
    }

    pub fn with_rate(mut self, rate_hz: f64) -> Self {
        self.rate_hz = Some(rate_hz);
        self
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.samples.last().map(|s| s.timestamp)
    }
}
