//! Deterministic synthetic recording
//!
//! Full rig (6 cameras, 5 lidars, 6 radars) mounted on a truck driving a
//! circle, with annotated traffic moving alongside. Used by `--synthetic`
//! and by tests that need a realistic scene without a dataset on disk.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::f64::consts::{FRAC_PI_2, TAU};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use contracts::nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use contracts::{
    Annotation, Calibration, CameraImage, CameraIntrinsics, ChannelId, CloudPoint, EgoPose,
    ImageFormat, Modality, OrientedBox, PointCloud, Pose, ReferenceFrame, Sample, SamplePayload,
    Scene, SensorChannel, Timestamp,
};
use image::{Rgb, RgbImage};
use tracing::{debug, info};

use crate::decode::{encode_point_records, DEFAULT_POINT_STRIDE};
use crate::error::{Result, StoreError};
use crate::manifest::{
    AnnotationRecord, EgoPoseRecord, ManifestRecord, SampleRecord, SceneRecord, SensorRecord,
    ANNOTATIONS_FILE, EGO_POSES_FILE, MANIFEST_FILE, SAMPLES_FILE,
};
use crate::memory::InMemorySampleStore;

/// Camera rig: name, mount position (ego frame), yaw in degrees
pub const CAMERA_CHANNELS: [(&str, [f64; 3], f64); 6] = [
    ("CAMERA_LEFT_FRONT", [1.6, 1.3, 2.9], 60.0),
    ("CAMERA_LEFT_BACK", [1.4, 1.3, 2.9], 150.0),
    ("CAMERA_RIGHT_FRONT", [1.6, -1.3, 2.9], -60.0),
    ("CAMERA_RIGHT_BACK", [1.4, -1.3, 2.9], -150.0),
    ("CAMERA_FRONT", [2.2, 0.0, 2.6], 0.0),
    ("CAMERA_BACK", [-8.0, 0.0, 2.4], 180.0),
];

/// Lidar rig
pub const LIDAR_CHANNELS: [(&str, [f64; 3], f64); 5] = [
    ("LIDAR_LEFT", [1.8, 1.2, 1.9], 90.0),
    ("LIDAR_RIGHT", [1.8, -1.2, 1.9], -90.0),
    ("LIDAR_TOP_FRONT", [1.9, 0.0, 3.6], 0.0),
    ("LIDAR_TOP_LEFT", [1.0, 1.1, 3.6], 45.0),
    ("LIDAR_TOP_RIGHT", [1.0, -1.1, 3.6], -45.0),
];

/// Radar rig
pub const RADAR_CHANNELS: [(&str, [f64; 3], f64); 6] = [
    ("RADAR_LEFT_FRONT", [2.3, 1.1, 0.6], 30.0),
    ("RADAR_LEFT_SIDE", [0.0, 1.3, 0.6], 90.0),
    ("RADAR_LEFT_BACK", [-7.5, 1.2, 0.6], 150.0),
    ("RADAR_RIGHT_FRONT", [2.3, -1.1, 0.6], -30.0),
    ("RADAR_RIGHT_SIDE", [0.0, -1.3, 0.6], -90.0),
    ("RADAR_RIGHT_BACK", [-7.5, -1.2, 0.6], -150.0),
];

const CATEGORIES: [(&str, [f64; 3]); 9] = [
    ("vehicle.car", [4.5, 1.9, 1.6]),
    ("vehicle.truck", [12.0, 2.5, 3.8]),
    ("vehicle.bus", [12.5, 2.6, 3.2]),
    ("vehicle.bicycle", [1.8, 0.6, 1.5]),
    ("vehicle.motorcycle", [2.1, 0.8, 1.5]),
    ("vehicle.trailer", [13.6, 2.5, 4.0]),
    ("human.pedestrian.adult", [0.7, 0.7, 1.8]),
    ("human.pedestrian.child", [0.5, 0.5, 1.2]),
    ("movable_object.barrier", [2.0, 0.4, 1.0]),
];

const BASE_TIME_US: u64 = 1_695_473_372_000_000;
const SCENE_SPACING_US: u64 = 600_000_000;
const EGO_POSE_PERIOD_US: u64 = 20_000;
const TRACK_RADIUS_M: f64 = 40.0;
const EGO_SPEED_MPS: f64 = 10.0;

/// Synthetic recording shape
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub scenes: usize,

    /// Keyframes per scene
    pub keyframes: usize,

    /// Keyframe spacing; lidars sweep at this period, radars twice as fast
    pub keyframe_interval_ms: u64,

    pub lidar_points: usize,

    pub radar_points: usize,

    pub image_width: u32,

    pub image_height: u32,

    /// Annotated objects per scene
    pub objects: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            scenes: 2,
            keyframes: 40,
            keyframe_interval_ms: 100,
            lidar_points: 2048,
            radar_points: 48,
            image_width: 64,
            image_height: 48,
            objects: 6,
        }
    }
}

/// Generated scenes plus the rig they were recorded with
#[derive(Debug, Clone)]
pub struct SyntheticRecording {
    config: SyntheticConfig,
    calibrations: BTreeMap<ChannelId, (Modality, Arc<Calibration>)>,
    scenes: Vec<Scene>,
}

impl SyntheticRecording {
    pub fn new(config: SyntheticConfig) -> Self {
        let calibrations = build_rig(&config);
        let scenes = (0..config.scenes)
            .map(|i| build_scene(&config, &calibrations, i))
            .collect();
        debug!(scenes = config.scenes, keyframes = config.keyframes, "synthetic recording built");
        Self {
            config,
            calibrations,
            scenes,
        }
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn into_store(self) -> InMemorySampleStore {
        InMemorySampleStore::new("synthetic", self.scenes)
    }

    /// Scene directory relative to the export root
    pub fn scene_directory(&self, index: usize) -> PathBuf {
        PathBuf::from("scenes").join(format!("scene-{index:04}"))
    }

    /// Write the recording as a manifest dataset under `root`.
    pub fn export(&self, root: &Path) -> Result<()> {
        let sensors = self
            .calibrations
            .iter()
            .map(|(id, (modality, calibration))| SensorRecord {
                channel: id.to_string(),
                modality: Some(*modality),
                frame_id: Some(calibration.frame_id.clone()),
                rate_hz: Some(self.rate_hz(*modality)),
                sensor_to_ego: Pose::from_isometry(&calibration.sensor_to_ego),
                intrinsics: calibration.intrinsics.clone(),
            })
            .collect();

        let mut scene_records = Vec::with_capacity(self.scenes.len());
        for scene in &self.scenes {
            let directory = self.scene_directory(scene.index);
            self.export_scene(root, &directory, scene)?;
            scene_records.push(SceneRecord {
                id: scene.id.clone(),
                name: scene.name.clone(),
                description: scene.description.clone(),
                directory,
                keyframe_count: scene.keyframes.len(),
            });
        }

        let manifest = ManifestRecord {
            name: "synthetic".to_string(),
            version: "synthetic-v1".to_string(),
            point_stride: DEFAULT_POINT_STRIDE,
            sensors,
            scenes: scene_records,
        };
        let manifest_path = root.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest).map_err(|source| StoreError::Record {
            path: manifest_path.clone(),
            line: 0,
            source,
        })?;
        write_file(&manifest_path, json.as_bytes())?;

        info!(root = %root.display(), scenes = self.scenes.len(), "synthetic dataset exported");
        Ok(())
    }

    fn export_scene(&self, root: &Path, directory: &Path, scene: &Scene) -> Result<()> {
        let scene_dir = root.join(directory);
        let keyframes: BTreeSet<Timestamp> = scene.keyframes.iter().copied().collect();

        let mut samples = Vec::new();
        for channel in scene.channels.values() {
            for sample in channel.samples() {
                let (bytes, ext) = match &sample.payload {
                    SamplePayload::Camera(img) => (img.data.to_vec(), img.format.as_str()),
                    SamplePayload::Lidar(cloud) | SamplePayload::Radar(cloud) => {
                        (encode_point_records(&cloud.points), "bin")
                    }
                };
                let file = PathBuf::from("samples").join(channel.id.as_str()).join(format!(
                    "{}_{}.{ext}",
                    scene.name,
                    sample.timestamp.as_micros()
                ));
                write_file(&root.join(&file), &bytes)?;
                samples.push(SampleRecord {
                    channel: channel.id.to_string(),
                    timestamp: sample.timestamp.as_micros(),
                    file,
                    is_keyframe: keyframes.contains(&sample.timestamp),
                    width: None,
                    height: None,
                });
            }
        }
        write_jsonl(&scene_dir.join(SAMPLES_FILE), &samples)?;

        let poses: Vec<EgoPoseRecord> = scene
            .ego_poses
            .iter()
            .map(|p| EgoPoseRecord {
                timestamp: p.timestamp.as_micros(),
                pose: Pose::from_isometry(&p.ego_to_world),
            })
            .collect();
        write_jsonl(&scene_dir.join(EGO_POSES_FILE), &poses)?;

        let annotations: Vec<AnnotationRecord> = scene
            .annotations
            .iter()
            .map(|a| {
                let q = a.bbox.rotation.quaternion();
                AnnotationRecord {
                    instance: a.object_id.clone(),
                    category: a.category.clone(),
                    timestamp: a.timestamp.as_micros(),
                    translation: [a.bbox.center.x, a.bbox.center.y, a.bbox.center.z],
                    size: [a.bbox.size.y, a.bbox.size.x, a.bbox.size.z],
                    rotation: [q.w, q.i, q.j, q.k],
                    frame: a.reference,
                }
            })
            .collect();
        write_jsonl(&scene_dir.join(ANNOTATIONS_FILE), &annotations)?;
        Ok(())
    }

    fn rate_hz(&self, modality: Modality) -> f64 {
        1_000_000.0 / period_us(&self.config, modality) as f64
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::read(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| StoreError::read(path, e))
}

fn write_jsonl<T: serde::Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        let line = serde_json::to_string(record).map_err(|source| StoreError::Record {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        out.push_str(&line);
        out.push('\n');
    }
    write_file(path, out.as_bytes())
}

fn period_us(config: &SyntheticConfig, modality: Modality) -> u64 {
    let keyframe_us = config.keyframe_interval_ms.max(1) * 1000;
    match modality {
        Modality::Camera | Modality::Lidar => keyframe_us,
        Modality::Radar => (keyframe_us / 2).max(1),
    }
}

fn mount(translation: [f64; 3], yaw_deg: f64) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(translation[0], translation[1], translation[2]),
        UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_deg.to_radians()),
    )
}

fn build_rig(config: &SyntheticConfig) -> BTreeMap<ChannelId, (Modality, Arc<Calibration>)> {
    let w = config.image_width;
    let h = config.image_height;
    let focal = f64::from(w) * 0.8;

    let cameras = CAMERA_CHANNELS.iter().map(|(name, t, yaw)| {
        let calibration = Calibration::new(*name, mount(*t, *yaw)).with_intrinsics(
            CameraIntrinsics::pinhole(w, h, focal, focal, f64::from(w) / 2.0, f64::from(h) / 2.0),
        );
        (ChannelId::from(*name), (Modality::Camera, Arc::new(calibration)))
    });
    let lidars = LIDAR_CHANNELS.iter().map(|(name, t, yaw)| {
        let calibration = Calibration::new(*name, mount(*t, *yaw));
        (ChannelId::from(*name), (Modality::Lidar, Arc::new(calibration)))
    });
    let radars = RADAR_CHANNELS.iter().map(|(name, t, yaw)| {
        let calibration = Calibration::new(*name, mount(*t, *yaw));
        (ChannelId::from(*name), (Modality::Radar, Arc::new(calibration)))
    });

    cameras.chain(lidars).chain(radars).collect()
}

/// Ego pose on the circular track, `elapsed` seconds into scene `index`
fn ego_pose(index: usize, elapsed: f64) -> Isometry3<f64> {
    let phase = index as f64 * 1.3;
    let theta = phase + EGO_SPEED_MPS / TRACK_RADIUS_M * elapsed;
    Isometry3::from_parts(
        Translation3::new(TRACK_RADIUS_M * theta.cos(), TRACK_RADIUS_M * theta.sin(), 0.0),
        UnitQuaternion::from_euler_angles(0.0, 0.0, theta + FRAC_PI_2),
    )
}

fn build_scene(
    config: &SyntheticConfig,
    rig: &BTreeMap<ChannelId, (Modality, Arc<Calibration>)>,
    index: usize,
) -> Scene {
    let start = BASE_TIME_US + index as u64 * SCENE_SPACING_US;
    let keyframe_us = config.keyframe_interval_ms.max(1) * 1000;
    let span = keyframe_us * config.keyframes.saturating_sub(1) as u64;
    let end = start + span;

    let keyframes: Vec<Timestamp> = (0..config.keyframes)
        .map(|k| Timestamp::from_micros(start + k as u64 * keyframe_us))
        .collect();

    let mut ego_poses: Vec<EgoPose> = (start..=end)
        .step_by(EGO_POSE_PERIOD_US as usize)
        .map(|t| EgoPose::new(Timestamp::from_micros(t), ego_pose(index, secs(t - start))))
        .collect();
    if ego_poses.last().map(|p| p.timestamp.as_micros()) != Some(end) {
        ego_poses.push(EgoPose::new(Timestamp::from_micros(end), ego_pose(index, secs(span))));
    }

    let mut channels = BTreeMap::new();
    let mut calibrations = HashMap::new();
    for (slot, (id, (modality, calibration))) in rig.iter().enumerate() {
        let period = period_us(config, *modality);
        // stagger sensors so channels are not sampled in lockstep
        let offset = (slot as u64 * 7_000) % period;
        let samples = (start + offset..=end)
            .step_by(period as usize)
            .enumerate()
            .map(|(frame, t)| Sample {
                channel: id.clone(),
                timestamp: Timestamp::from_micros(t),
                frame_id: calibration.frame_id.clone(),
                calibration: Some(calibration.clone()),
                payload: synth_payload(config, *modality, slot, frame, secs(t - start)),
            })
            .collect();

        let channel = SensorChannel::new(id.clone(), *modality, samples)
            .with_rate(1_000_000.0 / period as f64);
        channels.insert(id.clone(), Arc::new(channel));
        calibrations.insert(calibration.frame_id.clone(), calibration.clone());
    }

    let annotations = keyframes
        .iter()
        .flat_map(|ts| {
            let elapsed = secs(ts.as_micros() - start);
            (0..config.objects).map(move |j| synth_annotation(index, j, *ts, elapsed))
        })
        .collect();

    Scene {
        id: format!("{:016x}{:016x}", 0x5eed_0000_u64 + index as u64, start),
        index,
        name: format!("scene-{index:04}"),
        description: format!("synthetic circular drive #{index}"),
        keyframes,
        channels,
        calibrations,
        ego_poses: ego_poses.into(),
        annotations,
    }
}

fn secs(us: u64) -> f64 {
    us as f64 / 1_000_000.0
}

fn synth_payload(
    config: &SyntheticConfig,
    modality: Modality,
    slot: usize,
    frame: usize,
    elapsed: f64,
) -> SamplePayload {
    match modality {
        Modality::Camera => SamplePayload::Camera(synth_image(config, slot, frame)),
        Modality::Lidar => SamplePayload::Lidar(synth_lidar(config.lidar_points, elapsed)),
        Modality::Radar => SamplePayload::Radar(synth_radar(config.radar_points, elapsed)),
    }
}

/// Horizontal-gradient JPEG that scrolls with the frame counter
fn synth_image(config: &SyntheticConfig, slot: usize, frame: usize) -> CameraImage {
    let (w, h) = (config.image_width.max(1), config.image_height.max(1));
    let shift = (frame * 8 + slot * 40) as u32;
    let img = RgbImage::from_fn(w, h, |x, y| {
        let r = ((x + shift) * 255 / w) as u8;
        let g = (y * 255 / h) as u8;
        Rgb([r, g, (slot * 40) as u8])
    });

    let mut buf = Cursor::new(Vec::new());
    // in-memory JPEG encoding of a valid RGB image only fails on OOM
    let data = match img.write_to(&mut buf, image::ImageFormat::Jpeg) {
        Ok(()) => buf.into_inner(),
        Err(e) => {
            tracing::warn!(error = %e, "synthetic frame encoding failed");
            Vec::new()
        }
    };

    CameraImage {
        format: ImageFormat::Jpeg,
        width: w,
        height: h,
        data: Bytes::from(data),
    }
}

/// 16-ring sweep over a wavy ground wall
fn synth_lidar(count: usize, elapsed: f64) -> PointCloud {
    const RINGS: usize = 16;
    let points = (0..count)
        .map(|p| {
            let azimuth = TAU * p as f64 / count as f64;
            let ring = p % RINGS;
            let range = 12.0 + 4.0 * (3.0 * azimuth + elapsed).sin();
            let z = -1.8 + ring as f64 * 0.25;
            CloudPoint::new(
                (range * azimuth.cos()) as f32,
                (range * azimuth.sin()) as f32,
                z as f32,
            )
            .with_intensity(ring as f32 / RINGS as f32)
        })
        .collect();
    PointCloud::new(points)
}

/// Detections fanned across the boresight, RCS spanning [-20, 30] dBsm
fn synth_radar(count: usize, elapsed: f64) -> PointCloud {
    let points = (0..count)
        .map(|p| {
            let frac = if count > 1 {
                p as f64 / (count - 1) as f64
            } else {
                0.0
            };
            let azimuth = -0.6 + 1.2 * frac;
            let range = 15.0 + 40.0 * frac + (elapsed + p as f64).sin();
            let rcs = -20.0 + 50.0 * frac;
            CloudPoint::new(
                (range * azimuth.cos()) as f32,
                (range * azimuth.sin()) as f32,
                0.5,
            )
            .with_intensity(rcs as f32)
        })
        .collect();
    PointCloud::new(points)
}

/// Object `j` drives the circle in its own lane, ahead of the ego truck
fn synth_annotation(scene: usize, j: usize, timestamp: Timestamp, elapsed: f64) -> Annotation {
    let (category, [l, w, h]) = CATEGORIES[j % CATEGORIES.len()];
    let static_object = category.starts_with("movable_object");

    let lane = TRACK_RADIUS_M + 4.0 * ((j % 3) as f64 - 1.0);
    let lead = 0.15 + 0.1 * j as f64;
    let travelled = if static_object { 0.0 } else { EGO_SPEED_MPS * elapsed };
    let theta = scene as f64 * 1.3 + lead + travelled / lane;

    Annotation {
        object_id: format!("scene{scene}-obj{j}"),
        category: category.to_string(),
        timestamp,
        bbox: OrientedBox {
            center: Point3::new(lane * theta.cos(), lane * theta.sin(), h / 2.0),
            size: Vector3::new(l, w, h),
            rotation: UnitQuaternion::from_euler_angles(0.0, 0.0, theta + FRAC_PI_2),
        },
        reference: ReferenceFrame::World,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> SyntheticRecording {
        SyntheticRecording::new(SyntheticConfig {
            scenes: 1,
            keyframes: 5,
            ..Default::default()
        })
    }

    #[test]
    fn test_rig_shape() {
        let rec = recording();
        let scene = &rec.scenes()[0];
        assert_eq!(scene.channels_of(Modality::Camera).count(), 6);
        assert_eq!(scene.channels_of(Modality::Lidar).count(), 5);
        assert_eq!(scene.channels_of(Modality::Radar).count(), 6);
        assert_eq!(scene.calibrations.len(), 17);
    }

    #[test]
    fn test_samples_within_pose_range() {
        let rec = recording();
        let scene = &rec.scenes()[0];
        let first = scene.ego_poses.first().unwrap().timestamp;
        let last = scene.ego_poses.last().unwrap().timestamp;
        for channel in scene.channels.values() {
            assert!(!channel.is_empty(), "{} empty", channel.id);
            assert!(channel.first_timestamp().unwrap() >= first);
            assert!(channel.last_timestamp().unwrap() <= last);
        }
        assert_eq!(scene.time_span(), Some((first, last)));
    }

    #[test]
    fn test_annotations_at_keyframes() {
        let rec = recording();
        let scene = &rec.scenes()[0];
        assert_eq!(scene.annotations.len(), 5 * 6);
        for ann in &scene.annotations {
            assert!(scene.keyframes.contains(&ann.timestamp));
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = recording();
        let b = recording();
        let sa = &a.scenes()[0];
        let sb = &b.scenes()[0];
        assert_eq!(sa.id, sb.id);
        let id: ChannelId = "RADAR_LEFT_FRONT".into();
        match (
            &sa.channels[&id].samples()[2].payload,
            &sb.channels[&id].samples()[2].payload,
        ) {
            (SamplePayload::Radar(x), SamplePayload::Radar(y)) => assert_eq!(x.points, y.points),
            other => panic!("unexpected payloads {other:?}"),
        }
    }

    #[test]
    fn test_camera_frames_are_jpeg() {
        let rec = recording();
        let scene = &rec.scenes()[0];
        let id: ChannelId = "CAMERA_FRONT".into();
        match &scene.channels[&id].samples()[0].payload {
            SamplePayload::Camera(img) => {
                assert_eq!(&img.data[..2], &[0xFF, 0xD8]);
                let dims = crate::decode::probe_dimensions("CAMERA_FRONT", &img.data).unwrap();
                assert_eq!(dims, (img.width, img.height));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
