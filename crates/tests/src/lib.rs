//! # Integration Tests
//!
//! Cross-crate end-to-end flows.
//!
//! Covers:
//! - synthetic store -> scene loop -> publisher -> recording transports
//! - manifest datasets written to disk and streamed back
//! - slow-viewer isolation, scene reload and latched calibration

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};

    use contracts::{ContractError, OutboundFrame, SampleStore, SceneSelector, StreamerConfig, ViewerTransport};
    use scene_loop::{build_publisher, SceneLoop, SceneLoopHandle};
    use scene_store::{SyntheticConfig, SyntheticRecording};
    use tokio::sync::Semaphore;

    /// Keeps every frame it is handed
    #[derive(Clone, Default)]
    pub struct RecordingTransport {
        pub frames: Arc<Mutex<Vec<OutboundFrame>>>,
    }

    impl ViewerTransport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&mut self, frame: OutboundFrame) -> Result<(), ContractError> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// Blocks every write until the gate is opened
    #[derive(Clone)]
    pub struct GatedTransport {
        pub gate: Arc<Semaphore>,
        pub sent: Arc<Mutex<usize>>,
    }

    impl GatedTransport {
        pub fn closed() -> Self {
            Self {
                gate: Arc::new(Semaphore::new(0)),
                sent: Arc::default(),
            }
        }

        pub fn open(&self) {
            self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    impl ViewerTransport for GatedTransport {
        fn name(&self) -> &str {
            "gated"
        }

        async fn send(&mut self, _frame: OutboundFrame) -> Result<(), ContractError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ContractError::session_write("gated", e.to_string()))?;
            permit.forget();
            *self.sent.lock().unwrap() += 1;
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    pub fn recording(keyframes: usize) -> SyntheticRecording {
        SyntheticRecording::new(SyntheticConfig {
            keyframes,
            lidar_points: 128,
            radar_points: 16,
            image_width: 16,
            image_height: 12,
            ..Default::default()
        })
    }

    pub fn scene_loop(
        store: Arc<dyn SampleStore>,
        config: &StreamerConfig,
    ) -> (SceneLoop, SceneLoopHandle) {
        let publisher = build_publisher(store.as_ref(), &config.server).unwrap();
        let scene = store.load_scene(&SceneSelector::Index(0)).unwrap();
        SceneLoop::new(store, scene, config, publisher).unwrap()
    }

    pub fn subscription_of(frame: &OutboundFrame) -> Option<u32> {
        match frame {
            OutboundFrame::Binary(data) => {
                let mut id = [0u8; 4];
                id.copy_from_slice(&data[1..5]);
                Some(u32::from_le_bytes(id))
            }
            OutboundFrame::Text(_) => None,
        }
    }

    pub fn payload_json(frame: &OutboundFrame) -> serde_json::Value {
        match frame {
            OutboundFrame::Binary(data) => serde_json::from_slice(&data[13..]).unwrap(),
            OutboundFrame::Text(text) => serde_json::from_str(text).unwrap(),
        }
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{EndOfScene, SelectionPolicy};

    #[test]
    fn test_config_drives_streamer_settings() {
        let config = ConfigLoader::load_from_str(
            r#"
            [scene]
            end_of_scene = "loop"

            [sync]
            policy = "nearest"
            max_staleness_ms = 120

            [server]
            port = 9100
            session_queue_capacity = 16
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.scene.end_of_scene, EndOfScene::Loop);
        assert_eq!(config.sync.policy, SelectionPolicy::Nearest);
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.encoder.lidar.max_points, 3000);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        ChannelId, EndOfScene, OutboundFrame, SampleStore, SceneSelector, StreamerConfig, Topic,
    };
    use dispatcher::{ClientMessage, Subscription};
    use encoder::schema::{CompressedImage, FrameTransforms, SceneUpdate};
    use scene_store::ManifestSampleStore;

    use crate::support::*;

    /// Full run: synthetic store -> SceneLoop::run -> one recording viewer
    #[tokio::test]
    async fn test_e2e_synthetic_run() {
        let store: Arc<dyn SampleStore> = Arc::new(recording(5).into_store());
        let mut config = StreamerConfig::default();
        config.scene.end_of_scene = EndOfScene::Stop;
        config.sync.speed = 50.0;
        config.server.session_queue_capacity = 512;

        let (scene_loop, _handle) = scene_loop(Arc::clone(&store), &config);
        let registry = Arc::clone(scene_loop.publisher().registry());
        let ticks = scene_loop.clock().tick_count();

        let transport = RecordingTransport::default();
        let frames = Arc::clone(&transport.frames);
        let link = scene_loop.publisher().connector().connect(transport).unwrap();
        assert!(link.subscribe_all());

        let summary = tokio::time::timeout(Duration::from_secs(10), scene_loop.run())
            .await
            .unwrap();
        assert_eq!(summary.metrics.total_ticks, ticks);
        assert_eq!(summary.publisher.dropped, 0);

        let frames = frames.lock().unwrap();

        // handshake first
        let server_info = payload_json(&frames[0]);
        assert_eq!(server_info["op"], "serverInfo");
        let advertise = payload_json(&frames[1]);
        assert_eq!(advertise["op"], "advertise");
        assert_eq!(advertise["channels"].as_array().unwrap().len(), registry.len());

        let mut per_topic: HashMap<String, usize> = HashMap::new();
        for frame in frames.iter() {
            if let Some(sub) = subscription_of(frame) {
                let spec = registry.get(sub).expect("subscription maps to a channel");
                *per_topic.entry(spec.topic.to_string()).or_default() += 1;
            }
        }

        assert_eq!(per_topic.get("/tf"), Some(&(ticks as usize)));
        assert_eq!(per_topic.get("/annotations"), Some(&(ticks as usize)));
        for camera in ["CAMERA_FRONT", "CAMERA_BACK", "CAMERA_LEFT_FRONT"] {
            assert_eq!(per_topic.get(&format!("/camera/{camera}/camera_info")), Some(&1));
        }
        assert!(per_topic.get("/lidar/LIDAR_LEFT").copied().unwrap_or(0) >= ticks as usize - 1);
    }

    /// Every camera frame published in a tick has a matching /tf entry
    /// (same frame id, same timestamp) in that tick's batch.
    #[tokio::test]
    async fn test_tf_matches_published_frames() {
        let store: Arc<dyn SampleStore> = Arc::new(recording(4).into_store());
        let mut config = StreamerConfig::default();
        config.server.session_queue_capacity = 512;
        let (mut scene_loop, _handle) = scene_loop(store, &config);
        let registry = Arc::clone(scene_loop.publisher().registry());

        let transport = RecordingTransport::default();
        let frames = Arc::clone(&transport.frames);
        let link = scene_loop.publisher().connector().connect(transport).unwrap();
        link.subscribe_all();

        while let Some(tick) = scene_loop.next_tick() {
            scene_loop.process_tick(tick);
            tokio::task::yield_now().await;
        }
        scene_loop.shutdown().await;

        let frames = frames.lock().unwrap();
        let mut pending: Vec<CompressedImage> = Vec::new();
        let mut batches = 0;

        for frame in frames.iter() {
            let Some(sub) = subscription_of(frame) else {
                continue;
            };
            let OutboundFrame::Binary(data) = frame else {
                continue;
            };
            match &registry.get(sub).unwrap().topic {
                Topic::Camera(_) => {
                    pending.push(serde_json::from_slice(&data[13..]).unwrap());
                }
                Topic::Transforms => {
                    let batch: FrameTransforms = serde_json::from_slice(&data[13..]).unwrap();
                    assert!(batch.transforms.iter().all(|t| t.parent_frame_id == "world"));
                    assert!(batch.transforms.iter().any(|t| t.child_frame_id == "base_link"));
                    for image in pending.drain(..) {
                        assert!(
                            batch.transforms.iter().any(|t| t.child_frame_id == image.frame_id
                                && t.timestamp == image.timestamp),
                            "no /tf entry for {} at {:?}",
                            image.frame_id,
                            image.timestamp
                        );
                    }
                    batches += 1;
                }
                _ => {}
            }
        }

        assert_eq!(batches, 4);
        assert!(pending.is_empty());
    }

    /// A viewer that never drains its queue does not hold back a healthy one
    #[tokio::test]
    async fn test_slow_session_isolation() {
        let store: Arc<dyn SampleStore> = Arc::new(recording(6).into_store());
        let mut config = StreamerConfig::default();
        config.server.session_queue_capacity = 4;
        let (mut scene_loop, _handle) = scene_loop(store, &config);

        let tf = scene_loop
            .publisher()
            .registry()
            .id_of(&Topic::Transforms)
            .unwrap();

        let healthy = RecordingTransport::default();
        let healthy_frames = Arc::clone(&healthy.frames);
        let healthy_link = scene_loop.publisher().connector().connect(healthy).unwrap();
        healthy_link.forward(ClientMessage::Subscribe {
            subscriptions: vec![Subscription { id: 7, channel_id: tf }],
        });

        let slow = GatedTransport::closed();
        let slow_link = scene_loop.publisher().connector().connect(slow.clone()).unwrap();
        slow_link.subscribe_all();

        let mut dropped = 0;
        let mut ticks = 0;
        while let Some(tick) = scene_loop.next_tick() {
            let report = scene_loop.process_tick(tick);
            dropped += report.dropped;
            ticks += 1;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // the stalled viewer is still connected and dropping
        assert!(dropped > 0);
        assert_eq!(scene_loop.publisher().active_session_count(), 2);

        let delivered_tf = healthy_frames
            .lock()
            .unwrap()
            .iter()
            .filter(|f| subscription_of(f) == Some(7))
            .count();
        assert_eq!(delivered_tf, ticks);

        slow.open();
        scene_loop.shutdown().await;
        assert!(*slow.sent.lock().unwrap() > 0);
    }

    /// Scene reload through the handle: new scene announced, calibration
    /// latched again, old scene no longer selected.
    #[tokio::test]
    async fn test_scene_reload_via_handle() {
        let store: Arc<dyn SampleStore> = Arc::new(recording(5).into_store());
        let scene_one = store.load_scene(&SceneSelector::Index(1)).unwrap();
        let mut config = StreamerConfig::default();
        config.scene.end_of_scene = EndOfScene::Loop;
        config.sync.speed = 50.0;
        config.server.session_queue_capacity = 1024;
        let (scene_loop, handle) = scene_loop(store, &config);
        let registry = Arc::clone(scene_loop.publisher().registry());

        let transport = RecordingTransport::default();
        let frames = Arc::clone(&transport.frames);
        let link = scene_loop.publisher().connector().connect(transport).unwrap();
        link.subscribe_all();

        let task = tokio::spawn(scene_loop.run());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let summary = handle.change_scene(SceneSelector::Index(1)).await.unwrap();
        assert_eq!(summary.id, scene_one.id);
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop();
        task.await.unwrap();

        let frames = frames.lock().unwrap();
        let camera_info = registry
            .id_of(&Topic::CameraInfo(ChannelId::new("CAMERA_FRONT")))
            .unwrap();
        let camera_front = registry
            .id_of(&Topic::Camera(ChannelId::new("CAMERA_FRONT")))
            .unwrap();

        assert_eq!(
            frames
                .iter()
                .filter(|f| subscription_of(f) == Some(camera_info))
                .count(),
            2
        );

        let status_at = frames
            .iter()
            .position(|f| matches!(f, OutboundFrame::Text(t) if t.contains("Streaming scene scene-0001")))
            .expect("scene change announced");

        let (first, last) = scene_one.time_span().unwrap();
        for frame in &frames[status_at..] {
            if subscription_of(frame) == Some(camera_front) {
                let image: CompressedImage = serde_json::from_value(payload_json(frame)).unwrap();
                let ns = image.timestamp.sec * 1_000_000_000 + image.timestamp.nsec as u64;
                assert!(ns >= first.as_nanos() && ns <= last.as_nanos());
            }
        }
    }

    /// Synthetic recording exported as a manifest dataset and streamed back
    #[tokio::test]
    async fn test_e2e_manifest_dataset() {
        let dir = tempfile::tempdir().unwrap();
        recording(4).export(dir.path()).unwrap();

        let store: Arc<dyn SampleStore> = Arc::new(ManifestSampleStore::open(dir.path()).unwrap());
        assert_eq!(store.scene_count(), 2);
        assert_eq!(store.sensors().len(), 17);

        let config = StreamerConfig::default();
        let (mut scene_loop, _handle) = scene_loop(store, &config);
        let channels = scene_loop.scene().channels.len();

        let first = scene_loop.next_tick().unwrap();
        scene_loop.process_tick(first);
        let second = scene_loop.next_tick().unwrap();
        let report = scene_loop.process_tick(second);

        assert_eq!(report.selected, channels);
        assert!(report.resolve_failures.is_empty());
        assert_eq!(report.encode_failures, 0);
        assert_eq!(report.annotations, 6);
    }

    /// Lidar points arrive in the world frame
    #[tokio::test]
    async fn test_lidar_published_in_world_frame() {
        let store: Arc<dyn SampleStore> = Arc::new(recording(3).into_store());
        let mut config = StreamerConfig::default();
        config.server.session_queue_capacity = 512;
        config.encoder.lidar.max_points = 50;
        let (mut scene_loop, _handle) = scene_loop(store, &config);
        let lidar = scene_loop
            .publisher()
            .registry()
            .id_of(&Topic::Lidar(ChannelId::new("LIDAR_TOP_FRONT")))
            .unwrap();

        let transport = RecordingTransport::default();
        let frames = Arc::clone(&transport.frames);
        let link = scene_loop.publisher().connector().connect(transport).unwrap();
        link.subscribe_all();

        while let Some(tick) = scene_loop.next_tick() {
            scene_loop.process_tick(tick);
        }
        scene_loop.shutdown().await;

        let frames = frames.lock().unwrap();
        let update: SceneUpdate = frames
            .iter()
            .find(|f| subscription_of(f) == Some(lidar))
            .map(|f| serde_json::from_value(payload_json(f)).unwrap())
            .expect("lidar batch published");

        let entity = &update.entities[0];
        assert_eq!(entity.frame_id, "world");
        assert_eq!(entity.spheres.len(), 50);
    }
}
