//! Frame synchronizer: one sample per channel per publish tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use contracts::{ChannelId, Sample, Scene, SelectionPolicy, SensorChannel, SyncConfig, Timestamp};
use tracing::{debug, instrument};

use crate::selection::{AbsenceReason, SampleRef, Selection, TickSelection};

/// Running counters since the last scene load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub ticks: u64,
    pub selected: u64,
    pub absent_no_sample: u64,
    pub absent_stale: u64,
}

/// Picks, per channel, the sample to publish at a tick
///
/// Selection is a pure function of (loaded scene, tick, policy, bound):
/// calling `select_samples` twice with the same tick yields the same result.
#[derive(Debug)]
pub struct FrameSynchronizer {
    policy: SelectionPolicy,
    max_staleness: Duration,
    scene_id: Option<String>,
    channels: BTreeMap<ChannelId, Arc<SensorChannel>>,
    stats: SyncStats,
}

impl FrameSynchronizer {
    pub fn new(policy: SelectionPolicy, max_staleness: Duration) -> Self {
        Self {
            policy,
            max_staleness,
            scene_id: None,
            channels: BTreeMap::new(),
            stats: SyncStats::default(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.policy, config.max_staleness())
    }

    /// Replace the channel set with a new scene's and reset all counters.
    ///
    /// Nothing from the previous scene can be selected afterwards.
    #[instrument(name = "sync_load_scene", skip_all, fields(scene = %scene.id))]
    pub fn load_scene(&mut self, scene: &Scene) {
        self.channels = scene.channels.clone();
        self.scene_id = Some(scene.id.clone());
        self.stats = SyncStats::default();
        debug!(channels = self.channels.len(), "synchronizer loaded scene");
    }

    pub fn scene_id(&self) -> Option<&str> {
        self.scene_id.as_deref()
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn max_staleness(&self) -> Duration {
        self.max_staleness
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Selection for every loaded channel at `tick`.
    #[instrument(level = "trace", name = "sync_select", skip(self), fields(tick = %tick))]
    pub fn select_samples(&self, tick: Timestamp) -> TickSelection {
        self.select_samples_within(tick, self.max_staleness)
    }

    /// Selection at `tick` under an explicit staleness bound
    pub fn select_samples_within(&self, tick: Timestamp, max_staleness: Duration) -> TickSelection {
        let channels = self
            .channels
            .iter()
            .map(|(id, channel)| (id.clone(), self.select_channel(channel, tick, max_staleness)))
            .collect();
        TickSelection { tick, channels }
    }

    /// Fold a tick's outcome into the counters and metrics.
    pub fn record(&mut self, selection: &TickSelection) {
        self.stats.ticks += 1;
        for (id, sel) in &selection.channels {
            match sel {
                Selection::Selected(_) => self.stats.selected += 1,
                Selection::Absent(reason) => {
                    match reason {
                        AbsenceReason::NoSample => self.stats.absent_no_sample += 1,
                        AbsenceReason::Stale { age } => {
                            self.stats.absent_stale += 1;
                            debug!(
                                channel = %id,
                                age_ms = age.as_millis() as u64,
                                max_ms = self.max_staleness.as_millis() as u64,
                                "stale sample skipped"
                            );
                        }
                    }
                    metrics::counter!(
                        "scene_streamer_channel_absent_total",
                        "channel" => id.to_string(),
                        "reason" => reason.as_str()
                    )
                    .increment(1);
                }
            }
        }
    }

    fn select_channel(
        &self,
        channel: &Arc<SensorChannel>,
        tick: Timestamp,
        max_staleness: Duration,
    ) -> Selection {
        let samples = channel.samples();
        let candidate = match self.policy {
            SelectionPolicy::AtOrBefore => at_or_before(samples, tick),
            SelectionPolicy::Nearest => nearest(samples, tick),
        };

        let Some(index) = candidate else {
            return Selection::Absent(AbsenceReason::NoSample);
        };

        let age = samples[index].timestamp.abs_diff(tick);
        if age > max_staleness {
            Selection::Absent(AbsenceReason::Stale { age })
        } else {
            Selection::Selected(SampleRef::new(channel.clone(), index))
        }
    }
}

/// Latest timestamp <= tick; among equal timestamps the first stored wins
fn at_or_before(samples: &[Sample], tick: Timestamp) -> Option<usize> {
    let last = samples
        .partition_point(|s| s.timestamp <= tick)
        .checked_sub(1)?;
    let stamp = samples[last].timestamp;
    Some(samples.partition_point(|s| s.timestamp < stamp))
}

/// Closest sample on either side; ties go to the earlier sample
fn nearest(samples: &[Sample], tick: Timestamp) -> Option<usize> {
    let before = at_or_before(samples, tick);
    let after = samples.partition_point(|s| s.timestamp <= tick);
    let after = (after < samples.len()).then_some(after);

    match (before, after) {
        (Some(b), Some(a)) => {
            let db = samples[b].timestamp.abs_diff(tick);
            let da = samples[a].timestamp.abs_diff(tick);
            Some(if da < db { a } else { b })
        }
        (b, a) => b.or(a),
    }
}
