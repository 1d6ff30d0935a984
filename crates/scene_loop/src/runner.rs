//! SceneLoop - drives publish ticks over the loaded scene

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    ContractError, EndOfScene, Modality, SampleStore, Scene, SceneSelector, SceneSummary,
    StreamerConfig, SyncConfig, Timestamp, WireMessage, EGO_FRAME,
};
use dispatcher::{PublisherStats, Status, StreamPublisher};
use encoder::{PayloadEncoder, ResolvedBox, ResolvedFrame};
use observability::{MetricsSummary, TickMetricsAggregator};
use sync_engine::{AnnotationIndex, FrameSynchronizer, TickClock};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};
use transform_resolver::TransformResolver;

use crate::handle::{LoopCommand, SceneLoopHandle};
use crate::history::TickHistory;
use crate::report::TickReport;

/// Lower bound on the wall period between ticks
const MIN_WALL_PERIOD: Duration = Duration::from_millis(1);

/// Ticks between progress log lines
const PROGRESS_EVERY: u64 = 100;

/// Everything derived from one scene; built completely before it replaces
/// the streaming scene.
#[derive(Debug)]
struct LoadedScene {
    scene: Arc<Scene>,
    resolver: TransformResolver,
    annotations: AnnotationIndex,
    /// One `camera_info` message per camera, latched per session
    camera_info: Vec<WireMessage>,
    clock: TickClock,
}

impl LoadedScene {
    fn build(
        scene: Arc<Scene>,
        sync: &SyncConfig,
        encoder: &PayloadEncoder,
    ) -> Result<Self, ContractError> {
        let clock = TickClock::for_keyframes(&scene.keyframes, sync.publish_rate_hz, sync.speed)
            .ok_or_else(|| ContractError::scene_load(&scene.id, "scene has no keyframes"))?;
        let resolver = TransformResolver::from_scene(&scene);
        let annotations = AnnotationIndex::new(&scene.annotations);
        let camera_info = camera_info_messages(&scene, encoder, clock.span().0);

        Ok(Self {
            scene,
            resolver,
            annotations,
            camera_info,
            clock,
        })
    }
}

fn camera_info_messages(
    scene: &Scene,
    encoder: &PayloadEncoder,
    timestamp: Timestamp,
) -> Vec<WireMessage> {
    scene
        .channels_of(Modality::Camera)
        .filter_map(|channel| {
            let first = channel.samples().first()?;
            let calibration = first
                .calibration
                .clone()
                .or_else(|| scene.calibrations.get(&first.frame_id).cloned())?;
            match encoder.encode_camera_info(&channel.id, &calibration, timestamp) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(channel = %channel.id, error = %e, "No camera_info for channel");
                    None
                }
            }
        })
        .collect()
}

/// Totals of a finished run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub scenes_loaded: u64,
    pub tick_overruns: u64,
    pub publisher: PublisherStats,
    pub metrics: MetricsSummary,
}

/// Tick driver: one producer feeding the stream publisher
///
/// Per tick: admit sessions and apply control events, select samples,
/// resolve and encode each present channel, publish latched `camera_info`,
/// then `/annotations` and the `/tf` batch, then reap closed sessions and
/// record metrics.
pub struct SceneLoop {
    store: Arc<dyn SampleStore>,
    sync: SyncConfig,
    end_of_scene: EndOfScene,
    current: LoadedScene,
    synchronizer: FrameSynchronizer,
    encoder: PayloadEncoder,
    publisher: StreamPublisher,
    aggregator: TickMetricsAggregator,
    history: TickHistory,
    scenes_loaded: u64,
    commands: mpsc::UnboundedReceiver<LoopCommand>,
    commands_open: bool,
}

impl SceneLoop {
    /// Build a loop over an already loaded initial scene.
    ///
    /// # Errors
    /// `SceneLoadFailure` when the scene has no keyframes.
    pub fn new(
        store: Arc<dyn SampleStore>,
        scene: Arc<Scene>,
        config: &StreamerConfig,
        mut publisher: StreamPublisher,
    ) -> Result<(Self, SceneLoopHandle), ContractError> {
        let encoder = PayloadEncoder::new(config.encoder.clone());
        let current = LoadedScene::build(scene, &config.sync, &encoder)?;

        let mut synchronizer = FrameSynchronizer::from_config(&config.sync);
        synchronizer.load_scene(&current.scene);
        publisher.reset_latched();

        let summary = current.scene.summary();
        observability::record_scene_loaded(&summary.id, current.scene.channels.len());
        info!(
            store = store.name(),
            scene = %summary.id,
            name = %summary.name,
            ticks = current.clock.tick_count(),
            period_ms = current.clock.wall_period().as_secs_f64() * 1000.0,
            "Scene loop ready"
        );

        let (tx, commands) = mpsc::unbounded_channel();
        let scene_loop = Self {
            store,
            sync: config.sync.clone(),
            end_of_scene: config.scene.end_of_scene,
            current,
            synchronizer,
            encoder,
            publisher,
            aggregator: TickMetricsAggregator::new(),
            history: TickHistory::default(),
            scenes_loaded: 1,
            commands,
            commands_open: true,
        };
        Ok((scene_loop, SceneLoopHandle::new(tx)))
    }

    pub fn scene(&self) -> &Arc<Scene> {
        &self.current.scene
    }

    pub fn publisher(&self) -> &StreamPublisher {
        &self.publisher
    }

    pub fn synchronizer(&self) -> &FrameSynchronizer {
        &self.synchronizer
    }

    pub fn clock(&self) -> &TickClock {
        &self.current.clock
    }

    pub fn history(&self) -> &TickHistory {
        &self.history
    }

    pub fn aggregator(&self) -> &TickMetricsAggregator {
        &self.aggregator
    }

    /// Next tick of the current scene pass
    pub fn next_tick(&mut self) -> Option<Timestamp> {
        self.current.clock.next_tick()
    }

    /// Run one tick.
    ///
    /// Never waits on a session; every failure stays local to its channel
    /// or session and is reported in the returned `TickReport`.
    #[instrument(
        name = "scene_loop_tick",
        level = "debug",
        skip(self),
        fields(scene = %self.current.scene.id)
    )]
    pub fn process_tick(&mut self, tick: Timestamp) -> TickReport {
        let started = Instant::now();
        let mut report = TickReport::new(tick);

        report.admitted = self.publisher.admit_pending();
        report.control_events = self.publisher.apply_control();

        let selection = self.synchronizer.select_samples(tick);
        let resolver = &self.current.resolver;
        let mut frames = Vec::with_capacity(selection.selected_count() + 1);

        match resolver.ego_pose_at(tick) {
            Ok(ego_to_world) => frames.push(ResolvedFrame::new(EGO_FRAME, tick, ego_to_world)),
            Err(e) => debug!(error = %e, "No ego pose at tick"),
        }

        for (channel, sample) in selection.selected() {
            report.selected += 1;

            let sensor_to_world = match resolver.resolve(&sample.frame_id, sample.timestamp) {
                Ok(transform) => transform,
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Channel skipped this tick");
                    report.resolve_failures.push(channel.clone());
                    continue;
                }
            };

            match self.encoder.encode_sample(sample, &sensor_to_world) {
                Ok(message) => publish_message(&mut self.publisher, &message, false, &mut report),
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Encode failed");
                    observability::record_encode_failure(sample.modality().as_str());
                    report.encode_failures += 1;
                }
            }

            frames.push(ResolvedFrame::new(
                sample.frame_id.clone(),
                sample.timestamp,
                sensor_to_world,
            ));
        }

        for (channel, reason) in selection.absent() {
            debug!(channel = %channel, reason = reason.as_str(), "Channel absent");
            report.absent.push((channel.clone(), reason));
        }

        for message in &self.current.camera_info {
            publish_message(&mut self.publisher, message, true, &mut report);
        }

        if let Some((keyframe, active)) = self.current.annotations.active_at(tick) {
            let boxes: Vec<ResolvedBox<'_>> = active
                .iter()
                .filter_map(|annotation| match resolver.resolve_box(annotation) {
                    Ok(box_to_world) => Some(ResolvedBox {
                        annotation,
                        box_to_world,
                    }),
                    Err(e) => {
                        debug!(object = %annotation.object_id, error = %e, "Annotation skipped");
                        None
                    }
                })
                .collect();

            if !boxes.is_empty() {
                trace!(%keyframe, boxes = boxes.len(), "annotations active");
                match self.encoder.encode_annotations(&boxes, tick) {
                    Ok(message) => {
                        report.annotations = boxes.len();
                        publish_message(&mut self.publisher, &message, false, &mut report);
                    }
                    Err(e) => {
                        warn!(error = %e, "Annotation encode failed");
                        observability::record_encode_failure("annotations");
                        report.encode_failures += 1;
                    }
                }
            }
        }

        if !frames.is_empty() {
            match self.encoder.encode_transforms(&frames, tick) {
                Ok(message) => {
                    report.frames = frames.len();
                    publish_message(&mut self.publisher, &message, false, &mut report);
                }
                Err(e) => {
                    warn!(error = %e, "Transform encode failed");
                    observability::record_encode_failure("tf");
                    report.encode_failures += 1;
                }
            }
        }

        self.synchronizer.record(&selection);
        report.reaped = self.publisher.reap_closed();
        report.active_sessions = self.publisher.active_session_count();
        report.duration = started.elapsed();

        let record = report.to_record();
        observability::record_tick(&record);
        self.aggregator.update(&record);
        if self.history.push(report.duration, self.current.clock.wall_period()) {
            debug!(
                duration_ms = record.duration_ms,
                "Tick took longer than the publish period"
            );
        }

        report
    }

    /// Load a scene from the store and switch to it.
    ///
    /// # Errors
    /// `SceneLoadFailure` when the store cannot supply the scene or it has no
    /// keyframes; the current scene keeps streaming.
    #[instrument(name = "scene_loop_change_scene", skip(self), fields(selector = %selector))]
    pub async fn change_scene(
        &mut self,
        selector: SceneSelector,
    ) -> Result<SceneSummary, ContractError> {
        let result = match load_scene(Arc::clone(&self.store), &selector).await {
            Ok(scene) => self.install_scene(scene),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            observability::record_scene_load_failure();
            warn!(
                error = %e,
                current = %self.current.scene.id,
                "Scene change failed, keeping current scene"
            );
            self.publisher
                .broadcast_status(Status::warning(format!("Scene {selector} unavailable: {e}")));
        }
        result
    }

    /// Switch to an already loaded scene.
    ///
    /// Rebuilds the resolver, annotation index and calibration cache, reloads
    /// the synchronizer and restarts the clock. Latched `camera_info` goes
    /// out again to every session.
    pub fn install_scene(&mut self, scene: Arc<Scene>) -> Result<SceneSummary, ContractError> {
        let loaded = LoadedScene::build(scene, &self.sync, &self.encoder)?;

        self.synchronizer.load_scene(&loaded.scene);
        self.publisher.reset_latched();

        let summary = loaded.scene.summary();
        observability::record_scene_loaded(&summary.id, loaded.scene.channels.len());
        self.publisher.broadcast_status(Status::info(format!(
            "Streaming scene {} ({})",
            summary.name, summary.id
        )));
        info!(
            scene = %summary.id,
            name = %summary.name,
            keyframes = summary.keyframe_count,
            ticks = loaded.clock.tick_count(),
            "Scene installed"
        );

        self.current = loaded;
        self.scenes_loaded += 1;
        Ok(summary)
    }

    /// Drive ticks until stopped, then shut the publisher down.
    pub async fn run(mut self) -> RunSummary {
        let mut period = self.current.clock.wall_period();
        let mut interval = ticker(period);

        loop {
            tokio::select! {
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(LoopCommand::ChangeScene { selector, reply }) => {
                        let result = self.change_scene(selector).await;
                        let _ = reply.send(result);
                    }
                    Some(LoopCommand::Stop) => {
                        info!("Stop requested");
                        break;
                    }
                    None => self.commands_open = false,
                },
                _ = interval.tick() => {
                    if !self.step().await {
                        break;
                    }
                }
            }

            let current = self.current.clock.wall_period();
            if current != period {
                period = current;
                interval = ticker(period);
            }
        }

        self.shutdown().await
    }

    /// One interval tick of `run`; false once streaming should end.
    async fn step(&mut self) -> bool {
        if let Some(tick) = self.current.clock.next_tick() {
            let report = self.process_tick(tick);
            let issued = self.current.clock.issued();
            if issued % PROGRESS_EVERY == 0 {
                info!(
                    scene = %self.current.scene.id,
                    tick = issued,
                    of = self.current.clock.tick_count(),
                    sessions = report.active_sessions,
                    mean_tick_ms = self
                        .history
                        .mean()
                        .map(|d| d.as_secs_f64() * 1000.0)
                        .unwrap_or_default(),
                    "Streaming"
                );
            }
            return true;
        }

        match self.end_of_scene {
            EndOfScene::Loop => {
                debug!(scene = %self.current.scene.id, "Restarting scene");
                self.current.clock.restart();
                true
            }
            EndOfScene::Next => {
                self.advance().await;
                true
            }
            EndOfScene::Stop => {
                info!(scene = %self.current.scene.id, "End of scene, stopping");
                false
            }
        }
    }

    /// Move to the following scene, wrapping at the end of the store
    async fn advance(&mut self) {
        let count = self.store.scene_count().max(1);
        let next = (self.current.scene.index + 1) % count;
        if self.change_scene(SceneSelector::Index(next)).await.is_err() {
            self.current.clock.restart();
        }
    }

    /// Drain and close every session, then release the scene.
    #[instrument(name = "scene_loop_shutdown", skip(self))]
    pub async fn shutdown(self) -> RunSummary {
        let SceneLoop {
            publisher,
            current,
            aggregator,
            history,
            scenes_loaded,
            ..
        } = self;

        let publisher_stats = publisher.stats();
        publisher.shutdown().await;
        drop(current);

        let summary = RunSummary {
            scenes_loaded,
            tick_overruns: history.overruns(),
            publisher: publisher_stats,
            metrics: aggregator.summary(),
        };
        info!(
            ticks = summary.metrics.total_ticks,
            scenes = summary.scenes_loaded,
            delivered = summary.publisher.delivered,
            dropped = summary.publisher.dropped,
            "Scene loop stopped"
        );
        summary
    }
}

fn publish_message(
    publisher: &mut StreamPublisher,
    message: &WireMessage,
    latched: bool,
    report: &mut TickReport,
) {
    let outcome = if latched {
        publisher.publish_latched(message)
    } else {
        publisher.publish(message)
    };
    if latched && outcome.delivered == 0 && outcome.dropped == 0 {
        return;
    }
    report.messages += 1;
    report.delivered += outcome.delivered;
    report.dropped += outcome.dropped;
    observability::record_message_published(message.topic.kind(), outcome.delivered, outcome.dropped);
}

/// Store reads happen on the blocking pool, off the tick task
async fn load_scene(
    store: Arc<dyn SampleStore>,
    selector: &SceneSelector,
) -> Result<Arc<Scene>, ContractError> {
    let request = selector.clone();
    tokio::task::spawn_blocking(move || store.load_scene(&request))
        .await
        .map_err(|e| ContractError::scene_load(selector, e.to_string()))?
}

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period.max(MIN_WALL_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
