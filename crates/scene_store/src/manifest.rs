//! Manifest-backed sample store
//!
//! Dataset root layout:
//!
//! ```text
//! <root>/manifest.json            sensor rig, calibrations, scene list
//! <root>/<scene dir>/samples.jsonl     one record per sensor sample
//! <root>/<scene dir>/ego_poses.jsonl   one record per ego pose
//! <root>/<scene dir>/annotations.jsonl one record per annotated box (optional)
//! ```
//!
//! Sample `file` paths are relative to the dataset root.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use contracts::nalgebra::{Point3, Quaternion, UnitQuaternion, Vector3};
use contracts::{
    Annotation, Calibration, CameraIntrinsics, ChannelId, ContractError, EgoPose, ImageFormat,
    Modality, OrientedBox, Pose, ReferenceFrame, Sample, SamplePayload, SampleStore, Scene,
    SceneSelector, SceneSummary, SensorChannel, Timestamp,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::decode::{self, DEFAULT_POINT_STRIDE};
use crate::error::{Result, StoreError};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SAMPLES_FILE: &str = "samples.jsonl";
pub const EGO_POSES_FILE: &str = "ego_poses.jsonl";
pub const ANNOTATIONS_FILE: &str = "annotations.jsonl";

/// `manifest.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRecord {
    #[serde(default = "default_store_name")]
    pub name: String,

    #[serde(default)]
    pub version: String,

    /// Byte stride of one lidar/radar record
    #[serde(default = "default_point_stride")]
    pub point_stride: usize,

    pub sensors: Vec<SensorRecord>,

    pub scenes: Vec<SceneRecord>,
}

fn default_store_name() -> String {
    "manifest".to_string()
}

fn default_point_stride() -> usize {
    DEFAULT_POINT_STRIDE
}

/// One rig sensor with its static calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorRecord {
    pub channel: String,

    /// Inferred from the channel name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<Modality>,

    /// Defaults to the channel name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_hz: Option<f64>,

    #[serde(default)]
    pub sensor_to_ego: Pose,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intrinsics: Option<CameraIntrinsics>,
}

/// One scene entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRecord {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Scene directory relative to the dataset root
    pub directory: PathBuf,

    /// Listing hint only; the loaded scene reports the real count
    #[serde(default)]
    pub keyframe_count: usize,
}

/// `samples.jsonl` line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    pub channel: String,

    /// Microseconds
    pub timestamp: u64,

    pub file: PathBuf,

    #[serde(default)]
    pub is_keyframe: bool,

    /// Camera resolution; probed from the file when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// `ego_poses.jsonl` line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgoPoseRecord {
    pub timestamp: u64,

    #[serde(flatten)]
    pub pose: Pose,
}

/// `annotations.jsonl` line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub instance: String,

    pub category: String,

    pub timestamp: u64,

    pub translation: [f64; 3],

    /// `[width, length, height]`, as in the dataset tables
    pub size: [f64; 3],

    /// `[w, x, y, z]`
    pub rotation: [f64; 4],

    #[serde(default)]
    pub frame: ReferenceFrame,
}

impl AnnotationRecord {
    fn into_annotation(self) -> Annotation {
        let [w, l, h] = self.size;
        let [qw, qx, qy, qz] = self.rotation;
        Annotation {
            object_id: self.instance,
            category: self.category,
            timestamp: Timestamp::from_micros(self.timestamp),
            bbox: OrientedBox {
                center: Point3::from(self.translation),
                size: Vector3::new(l, w, h),
                rotation: UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz)),
            },
            reference: self.frame,
        }
    }
}

/// Resolved rig entry
#[derive(Debug)]
struct RigSensor {
    modality: Modality,
    rate_hz: Option<f64>,
    calibration: Arc<Calibration>,
}

/// Sample store reading a manifest dataset root
#[derive(Debug)]
pub struct ManifestSampleStore {
    root: PathBuf,
    name: String,
    point_stride: usize,
    rig: BTreeMap<ChannelId, RigSensor>,
    scenes: Vec<SceneRecord>,
}

impl ManifestSampleStore {
    /// Open a dataset root, reading and checking `manifest.json`.
    ///
    /// Scene tables are read lazily by `load_scene`.
    #[instrument(name = "store_open", skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        let text =
            fs::read_to_string(&manifest_path).map_err(|e| StoreError::read(&manifest_path, e))?;
        let manifest: ManifestRecord =
            serde_json::from_str(&text).map_err(|source| StoreError::Record {
                path: manifest_path.clone(),
                line: 1,
                source,
            })?;

        let mut rig = BTreeMap::new();
        for sensor in manifest.sensors {
            let modality = sensor
                .modality
                .or_else(|| Modality::infer_from_name(&sensor.channel))
                .ok_or_else(|| {
                    StoreError::inconsistent(
                        &manifest_path,
                        format!("cannot infer modality of sensor '{}'", sensor.channel),
                    )
                })?;

            let frame_id = sensor.frame_id.unwrap_or_else(|| sensor.channel.clone());
            let mut calibration = Calibration::new(frame_id, sensor.sensor_to_ego.to_isometry());
            if let Some(intrinsics) = sensor.intrinsics {
                calibration = calibration.with_intrinsics(intrinsics);
            } else if modality == Modality::Camera {
                warn!(channel = %sensor.channel, "camera without intrinsics, camera_info disabled");
            }

            let id = ChannelId::from(sensor.channel);
            if rig
                .insert(
                    id.clone(),
                    RigSensor {
                        modality,
                        rate_hz: sensor.rate_hz,
                        calibration: Arc::new(calibration),
                    },
                )
                .is_some()
            {
                return Err(StoreError::inconsistent(
                    &manifest_path,
                    format!("duplicate sensor '{id}'"),
                ));
            }
        }

        info!(
            name = %manifest.name,
            version = %manifest.version,
            sensors = rig.len(),
            scenes = manifest.scenes.len(),
            "manifest store opened"
        );

        Ok(Self {
            root,
            name: manifest.name,
            point_stride: manifest.point_stride,
            rig,
            scenes: manifest.scenes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find(&self, selector: &SceneSelector) -> Option<(usize, &SceneRecord)> {
        match selector {
            SceneSelector::Index(i) => self.scenes.get(*i).map(|s| (*i, s)),
            SceneSelector::Id(id) => self.scenes.iter().enumerate().find(|(_, s)| &s.id == id),
        }
    }

    fn read_scene(&self, index: usize, record: &SceneRecord) -> Result<Scene> {
        let started = Instant::now();
        let dir = self.root.join(&record.directory);

        let sample_records: Vec<SampleRecord> = read_jsonl(&dir.join(SAMPLES_FILE), true)?;
        let pose_records: Vec<EgoPoseRecord> = read_jsonl(&dir.join(EGO_POSES_FILE), true)?;
        let annotation_records: Vec<AnnotationRecord> =
            read_jsonl(&dir.join(ANNOTATIONS_FILE), false)?;

        let mut keyframes = BTreeSet::new();
        let mut per_channel: BTreeMap<ChannelId, Vec<Sample>> = BTreeMap::new();
        for record in sample_records {
            let channel = ChannelId::from(record.channel.as_str());
            let sensor = self.rig.get(&channel).ok_or_else(|| {
                StoreError::inconsistent(
                    dir.join(SAMPLES_FILE),
                    format!("sample references unknown sensor '{channel}'"),
                )
            })?;
            if record.is_keyframe {
                keyframes.insert(Timestamp::from_micros(record.timestamp));
            }
            let sample = self.read_sample(&channel, sensor, &record)?;
            per_channel.entry(channel).or_default().push(sample);
        }

        let annotations: Vec<Annotation> = annotation_records
            .into_iter()
            .map(AnnotationRecord::into_annotation)
            .collect();

        let mut ego_poses: Vec<EgoPose> = pose_records
            .into_iter()
            .map(|r| EgoPose::new(Timestamp::from_micros(r.timestamp), r.pose.to_isometry()))
            .collect();
        ego_poses.sort_by_key(|p| p.timestamp);

        // Unflagged recordings fall back to annotation, then pose, timestamps
        if keyframes.is_empty() {
            keyframes.extend(annotations.iter().map(|a| a.timestamp));
        }
        if keyframes.is_empty() {
            keyframes.extend(ego_poses.iter().map(|p| p.timestamp));
        }

        let channels = per_channel
            .into_iter()
            .map(|(id, samples)| {
                let sensor = &self.rig[&id];
                let mut channel = SensorChannel::new(id.clone(), sensor.modality, samples);
                if let Some(rate) = sensor.rate_hz {
                    channel = channel.with_rate(rate);
                }
                (id, Arc::new(channel))
            })
            .collect::<BTreeMap<_, _>>();

        let calibrations = self
            .rig
            .values()
            .map(|s| (s.calibration.frame_id.clone(), s.calibration.clone()))
            .collect::<HashMap<_, _>>();

        debug!(
            scene = %record.id,
            channels = channels.len(),
            keyframes = keyframes.len(),
            ego_poses = ego_poses.len(),
            annotations = annotations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scene tables read"
        );

        Ok(Scene {
            id: record.id.clone(),
            index,
            name: record.name.clone(),
            description: record.description.clone(),
            keyframes: keyframes.into_iter().collect(),
            channels,
            calibrations,
            ego_poses: ego_poses.into(),
            annotations,
        })
    }

    fn read_sample(
        &self,
        channel: &ChannelId,
        sensor: &RigSensor,
        record: &SampleRecord,
    ) -> Result<Sample> {
        let path = self.root.join(&record.file);
        let data = fs::read(&path).map_err(|e| StoreError::read(&path, e))?;

        let payload = match sensor.modality {
            Modality::Camera => {
                let format = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(ImageFormat::from_extension)
                    .ok_or_else(|| {
                        ContractError::payload_decode(
                            channel.as_str(),
                            format!("unknown image format for {}", path.display()),
                        )
                    })?;
                let dims = record.width.zip(record.height);
                SamplePayload::Camera(decode::decode_camera_image(
                    channel,
                    Bytes::from(data),
                    format,
                    dims,
                )?)
            }
            Modality::Lidar => {
                SamplePayload::Lidar(decode::decode_point_cloud(channel, &data, self.point_stride)?)
            }
            Modality::Radar => {
                SamplePayload::Radar(decode::decode_point_cloud(channel, &data, self.point_stride)?)
            }
        };

        Ok(Sample {
            channel: channel.clone(),
            timestamp: Timestamp::from_micros(record.timestamp),
            frame_id: sensor.calibration.frame_id.clone(),
            calibration: Some(sensor.calibration.clone()),
            payload,
        })
    }
}

impl SampleStore for ManifestSampleStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn scenes(&self) -> Vec<SceneSummary> {
        self.scenes
            .iter()
            .enumerate()
            .map(|(index, s)| SceneSummary {
                index,
                id: s.id.clone(),
                name: s.name.clone(),
                description: s.description.clone(),
                keyframe_count: s.keyframe_count,
            })
            .collect()
    }

    fn sensors(&self) -> Vec<(String, Modality)> {
        let mut sensors: Vec<(String, Modality)> = self
            .rig
            .iter()
            .map(|(id, s)| (id.to_string(), s.modality))
            .collect();
        sensors.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
        sensors
    }

    fn load_scene(&self, selector: &SceneSelector) -> std::result::Result<Arc<Scene>, ContractError> {
        let (index, record) = self
            .find(selector)
            .ok_or_else(|| ContractError::scene_load(selector, "no such scene"))?;
        self.read_scene(index, record)
            .map(Arc::new)
            .map_err(|e| ContractError::scene_load(selector, e.to_string()))
    }

    fn scene_count(&self) -> usize {
        self.scenes.len()
    }
}

/// Read a JSON-lines table, skipping blank lines.
fn read_jsonl<T: DeserializeOwned>(path: &Path, required: bool) -> Result<Vec<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::read(path, e)),
    };

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| StoreError::Record {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })
        })
        .collect()
}
