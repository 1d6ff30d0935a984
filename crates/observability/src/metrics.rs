//! Scene streamer metrics
//!
//! Per-tick counters, gauges and histograms under the `scene_streamer_*`
//! prefix, plus an in-memory aggregator summarised at shutdown.

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// What one tick did, as seen by the metrics layer
#[derive(Debug, Clone, Default)]
pub struct TickRecord {
    /// Wall time spent processing the tick (ms)
    pub duration_ms: f64,
    /// Channels with a selected sample
    pub selected: usize,
    /// Absent channels with their reason
    pub absent: Vec<(String, &'static str)>,
    /// Channels whose transform could not be resolved
    pub resolve_failures: Vec<String>,
    /// Session deliveries queued
    pub delivered: usize,
    /// Session deliveries dropped on full queues
    pub dropped: usize,
    /// Active sessions at the end of the tick
    pub active_sessions: usize,
}

/// Record one tick.
///
/// # Example
///
/// ```ignore
/// let report = scene_loop.process_tick(tick);
/// observability::metrics::record_tick(&report.to_record());
/// ```
pub fn record_tick(record: &TickRecord) {
    counter!("scene_streamer_ticks_total").increment(1);
    histogram!("scene_streamer_tick_duration_ms").record(record.duration_ms);
    gauge!("scene_streamer_channels_selected").set(record.selected as f64);
    gauge!("scene_streamer_channels_absent").set(record.absent.len() as f64);
    gauge!("scene_streamer_active_sessions").set(record.active_sessions as f64);

    for channel in &record.resolve_failures {
        counter!(
            "scene_streamer_resolve_failures_total",
            "channel" => channel.clone()
        )
        .increment(1);
    }
}

/// Record one message fan-out
pub fn record_message_published(topic_kind: &'static str, delivered: usize, dropped: usize) {
    counter!("scene_streamer_messages_encoded_total", "topic" => topic_kind).increment(1);
    if delivered > 0 {
        counter!("scene_streamer_messages_published_total", "topic" => topic_kind)
            .increment(delivered as u64);
    }
    if dropped > 0 {
        counter!("scene_streamer_messages_dropped_total", "topic" => topic_kind)
            .increment(dropped as u64);
    }
}

/// Record an encoder failure
pub fn record_encode_failure(topic_kind: &'static str) {
    counter!("scene_streamer_encode_failures_total", "topic" => topic_kind).increment(1);
}

/// Record a scene switch
pub fn record_scene_loaded(scene_id: &str, channels: usize) {
    counter!("scene_streamer_scenes_loaded_total").increment(1);
    gauge!("scene_streamer_scene_channels", "scene" => scene_id.to_string()).set(channels as f64);
}

/// Record a failed scene load
pub fn record_scene_load_failure() {
    counter!("scene_streamer_scene_load_failures_total").increment(1);
}

/// Tick metrics aggregator
///
/// Aggregates in memory so a summary can be printed at shutdown.
#[derive(Debug, Clone, Default)]
pub struct TickMetricsAggregator {
    pub total_ticks: u64,

    pub total_delivered: u64,

    pub total_dropped: u64,

    /// Ticks with at least one absent channel
    pub ticks_with_absent: u64,

    pub resolve_failures: u64,

    pub tick_duration_stats: RunningStats,

    pub selected_stats: RunningStats,

    /// Absences per channel
    pub absent_counts: BTreeMap<String, u64>,

    /// Absences per reason
    pub absent_reasons: BTreeMap<&'static str, u64>,
}

impl TickMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, record: &TickRecord) {
        self.total_ticks += 1;
        self.total_delivered += record.delivered as u64;
        self.total_dropped += record.dropped as u64;
        self.resolve_failures += record.resolve_failures.len() as u64;

        if !record.absent.is_empty() {
            self.ticks_with_absent += 1;
            for (channel, reason) in &record.absent {
                *self.absent_counts.entry(channel.clone()).or_insert(0) += 1;
                *self.absent_reasons.entry(*reason).or_insert(0) += 1;
            }
        }

        self.tick_duration_stats.push(record.duration_ms);
        self.selected_stats.push(record.selected as f64);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_ticks: self.total_ticks,
            total_delivered: self.total_delivered,
            total_dropped: self.total_dropped,
            ticks_with_absent: self.ticks_with_absent,
            resolve_failures: self.resolve_failures,
            drop_rate: if self.total_delivered + self.total_dropped > 0 {
                self.total_dropped as f64 / (self.total_delivered + self.total_dropped) as f64
                    * 100.0
            } else {
                0.0
            },
            absent_rate: if self.total_ticks > 0 {
                self.ticks_with_absent as f64 / self.total_ticks as f64 * 100.0
            } else {
                0.0
            },
            tick_duration_ms: StatsSummary::from(&self.tick_duration_stats),
            channels_selected: StatsSummary::from(&self.selected_stats),
            absent_counts: self.absent_counts.clone(),
            absent_reasons: self.absent_reasons.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Summary of a streaming run
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_ticks: u64,
    pub total_delivered: u64,
    pub total_dropped: u64,
    pub ticks_with_absent: u64,
    pub resolve_failures: u64,
    pub drop_rate: f64,
    pub absent_rate: f64,
    pub tick_duration_ms: StatsSummary,
    pub channels_selected: StatsSummary,
    pub absent_counts: BTreeMap<String, u64>,
    pub absent_reasons: BTreeMap<&'static str, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Streaming Summary ===")?;
        writeln!(f, "Total ticks: {}", self.total_ticks)?;
        writeln!(f, "Messages delivered: {}", self.total_delivered)?;
        writeln!(
            f,
            "Messages dropped: {} ({:.2}%)",
            self.total_dropped, self.drop_rate
        )?;
        writeln!(
            f,
            "Ticks with absent channels: {} ({:.2}%)",
            self.ticks_with_absent, self.absent_rate
        )?;
        writeln!(f, "Resolve failures: {}", self.resolve_failures)?;
        writeln!(f, "Tick duration (ms): {}", self.tick_duration_ms)?;
        writeln!(f, "Channels selected: {}", self.channels_selected)?;

        if !self.absent_reasons.is_empty() {
            writeln!(f, "Absences by reason:")?;
            for (reason, count) in &self.absent_reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }
        if !self.absent_counts.is_empty() {
            writeln!(f, "Absences by channel:")?;
            for (channel, count) in &self.absent_counts {
                writeln!(f, "  {}: {}", channel, count)?;
            }
        }

        Ok(())
    }
}

/// Summary statistics
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
