//! # Encoder
//!
//! Payload encoders: `(Sample, RigidTransform) -> WireMessage`.
//!
//! Every encoder is a pure function of its inputs. Transforms come in already
//! resolved; nothing here looks up a pose or a calibration on its own.
//!
//! | Payload | Topic | Schema |
//! |---|---|---|
//! | camera frame | `/camera/<NAME>` | `foxglove.CompressedImage` |
//! | camera calibration | `/camera/<NAME>/camera_info` | `foxglove.CameraCalibration` |
//! | lidar / radar batch | `/lidar/<NAME>`, `/radar/<NAME>` | `foxglove.SceneUpdate` |
//! | annotation boxes | `/annotations` | `foxglove.SceneUpdate` |
//! | transform set | `/tf` | `foxglove.FrameTransforms` |

mod annotation;
mod error;
mod image;
mod point_cloud;
pub mod schema;
mod transforms;

use bytes::Bytes;
use contracts::{
    Calibration, ChannelId, EncoderConfig, RigidTransform, Sample, SamplePayload, Timestamp,
    Topic, WireMessage,
};
use serde::Serialize;
use tracing::trace;

pub use annotation::{annotation_entity, category_color, ResolvedBox, ANNOTATION_ENTITY_ID};
pub use error::{EncodeError, Result};
pub use image::{camera_calibration, compressed_image};
pub use point_cloud::{capped_indices, point_entity, rcs_color, PointStyle};
pub use transforms::{frame_transforms, ResolvedFrame};

/// Encoder stage of the scene loop
#[derive(Debug, Clone)]
pub struct PayloadEncoder {
    config: EncoderConfig,
    lidar: PointStyle,
    radar: PointStyle,
}

impl Default for PayloadEncoder {
    fn default() -> Self {
        Self::new(EncoderConfig::default())
    }
}

impl PayloadEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        let lidar = PointStyle::from(&config.lidar);
        let radar = PointStyle::from(&config.radar);
        Self {
            config,
            lidar,
            radar,
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode one selected sample.
    ///
    /// `sensor_to_world` must be resolved at `sample.timestamp`; the same
    /// transform goes into the tick's `/tf` batch.
    pub fn encode_sample(
        &self,
        sample: &Sample,
        sensor_to_world: &RigidTransform,
    ) -> Result<WireMessage> {
        let topic = Topic::for_channel(sample.modality(), sample.channel.clone());
        let lifetime = self.config.entity_lifetime();

        let message = match &sample.payload {
            SamplePayload::Camera(image) => {
                let msg = compressed_image(image, &sample.frame_id, sample.timestamp);
                to_message(topic, sample.timestamp, &msg)?
            }
            SamplePayload::Lidar(cloud) => {
                let entity = point_entity(
                    &sample.channel,
                    cloud,
                    sensor_to_world,
                    sample.timestamp,
                    &self.lidar,
                    lifetime,
                );
                to_message(topic, sample.timestamp, &schema::SceneUpdate::single(entity))?
            }
            SamplePayload::Radar(cloud) => {
                let entity = point_entity(
                    &sample.channel,
                    cloud,
                    sensor_to_world,
                    sample.timestamp,
                    &self.radar,
                    lifetime,
                );
                to_message(topic, sample.timestamp, &schema::SceneUpdate::single(entity))?
            }
        };

        trace!(
            topic = %message.topic,
            bytes = message.payload.len(),
            "sample encoded"
        );
        Ok(message)
    }

    /// Calibration message for a camera; built once per scene per camera.
    pub fn encode_camera_info(
        &self,
        channel: &ChannelId,
        calibration: &Calibration,
        timestamp: Timestamp,
    ) -> Result<WireMessage> {
        let msg = camera_calibration(channel, calibration, timestamp)?;
        to_message(Topic::CameraInfo(channel.clone()), timestamp, &msg)
    }

    /// Active annotation boxes at a tick
    pub fn encode_annotations(
        &self,
        boxes: &[ResolvedBox<'_>],
        tick: Timestamp,
    ) -> Result<WireMessage> {
        let entity = annotation_entity(
            boxes,
            tick,
            &self.config.annotations,
            self.config.entity_lifetime(),
        );
        to_message(Topic::Annotations, tick, &schema::SceneUpdate::single(entity))
    }

    /// Every frame resolved during a tick
    pub fn encode_transforms(
        &self,
        frames: &[ResolvedFrame],
        tick: Timestamp,
    ) -> Result<WireMessage> {
        to_message(Topic::Transforms, tick, &frame_transforms(frames))
    }
}

fn to_message<T: Serialize>(topic: Topic, log_time: Timestamp, value: &T) -> Result<WireMessage> {
    Ok(WireMessage {
        topic,
        log_time,
        payload: Bytes::from(serde_json::to_vec(value)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CameraImage, CloudPoint, ImageFormat, Modality, PointCloud};
    use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

    fn lidar_sample(points: Vec<CloudPoint>) -> Sample {
        Sample {
            channel: "LIDAR_TOP_FRONT".into(),
            timestamp: Timestamp::from_micros(1_000_000),
            frame_id: "LIDAR_TOP_FRONT".to_string(),
            calibration: None,
            payload: SamplePayload::Lidar(PointCloud::new(points)),
        }
    }

    #[test]
    fn test_point_batch_round_trip() {
        let points: Vec<CloudPoint> = (0..200)
            .map(|i| {
                let f = i as f32 * 0.25;
                CloudPoint::new(f, -f * 0.5, 1.0 + (i % 7) as f32)
            })
            .collect();
        let sample = lidar_sample(points.clone());
        let transform = Isometry3::from_parts(
            Translation3::new(120.0, -40.0, 2.0),
            UnitQuaternion::from_euler_angles(0.01, -0.02, 1.3),
        );

        let message = PayloadEncoder::default()
            .encode_sample(&sample, &transform)
            .unwrap();
        assert_eq!(message.topic, Topic::Lidar("LIDAR_TOP_FRONT".into()));
        assert_eq!(message.log_time, sample.timestamp);

        let update: schema::SceneUpdate = serde_json::from_slice(&message.payload).unwrap();
        let spheres = &update.entities[0].spheres;
        assert_eq!(spheres.len(), points.len());

        let inverse = transform.inverse();
        for (sphere, original) in spheres.iter().zip(&points) {
            let p = sphere.pose.position;
            let local = inverse * Point3::new(p.x, p.y, p.z);
            let expected = Vector3::new(
                original.position[0] as f64,
                original.position[1] as f64,
                original.position[2] as f64,
            );
            assert!((local.coords - expected).norm() < 1e-4);
        }
    }

    #[test]
    fn test_lidar_batch_is_capped() {
        let points = (0..5000).map(|i| CloudPoint::new(i as f32, 0.0, 0.0)).collect();
        let message = PayloadEncoder::default()
            .encode_sample(&lidar_sample(points), &Isometry3::identity())
            .unwrap();
        let update: schema::SceneUpdate = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(update.entities[0].spheres.len(), 3000);
    }

    #[test]
    fn test_radar_uses_radar_style() {
        let sample = Sample {
            channel: "RADAR_LEFT_FRONT".into(),
            timestamp: Timestamp::from_micros(10),
            frame_id: "RADAR_LEFT_FRONT".to_string(),
            calibration: None,
            payload: SamplePayload::Radar(PointCloud::new(vec![
                CloudPoint::new(1.0, 1.0, 0.0).with_intensity(5.0),
            ])),
        };
        assert_eq!(sample.modality(), Modality::Radar);

        let message = PayloadEncoder::default()
            .encode_sample(&sample, &Isometry3::identity())
            .unwrap();
        let update: schema::SceneUpdate = serde_json::from_slice(&message.payload).unwrap();
        let sphere = &update.entities[0].spheres[0];
        assert_eq!(sphere.size.x, 0.3);
        assert_eq!(sphere.color, schema::Color::new(1.0, 0.3, 0.0, 1.0));
    }

    #[test]
    fn test_camera_frame_keeps_frame_id() {
        let sample = Sample {
            channel: "CAMERA_LEFT_FRONT".into(),
            timestamp: Timestamp::from_micros(42),
            frame_id: "CAMERA_LEFT_FRONT".to_string(),
            calibration: None,
            payload: SamplePayload::Camera(CameraImage {
                format: ImageFormat::Jpeg,
                width: 1,
                height: 1,
                data: Bytes::from_static(b"jpeg"),
            }),
        };
        let message = PayloadEncoder::default()
            .encode_sample(&sample, &Isometry3::identity())
            .unwrap();
        let image: schema::CompressedImage = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(image.frame_id, "CAMERA_LEFT_FRONT");
        assert_eq!(image.data, "anBlZw==");
    }
}
