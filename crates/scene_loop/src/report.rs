//! Per-tick report

use std::time::Duration;

use contracts::{ChannelId, Timestamp};
use observability::TickRecord;
use sync_engine::AbsenceReason;

/// What one tick published
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: Timestamp,

    /// Sessions admitted before the tick
    pub admitted: usize,

    /// Control events applied before the tick
    pub control_events: usize,

    /// Channels with a selected sample
    pub selected: usize,

    pub absent: Vec<(ChannelId, AbsenceReason)>,

    /// Channels skipped because their frame could not be resolved
    pub resolve_failures: Vec<ChannelId>,

    pub encode_failures: usize,

    /// Messages handed to the publisher
    pub messages: usize,

    /// Session deliveries queued
    pub delivered: usize,

    /// Session deliveries dropped on full queues
    pub dropped: usize,

    /// Annotation boxes in the `/annotations` message
    pub annotations: usize,

    /// Frames in the `/tf` batch
    pub frames: usize,

    /// Closed sessions reclaimed after the tick
    pub reaped: usize,

    pub active_sessions: usize,

    pub duration: Duration,
}

impl TickReport {
    pub fn new(tick: Timestamp) -> Self {
        Self {
            tick,
            ..Default::default()
        }
    }

    pub fn is_absent(&self, channel: &str) -> bool {
        self.absent.iter().any(|(id, _)| id.as_str() == channel)
    }

    pub fn to_record(&self) -> TickRecord {
        TickRecord {
            duration_ms: self.duration.as_secs_f64() * 1000.0,
            selected: self.selected,
            absent: self
                .absent
                .iter()
                .map(|(id, reason)| (id.to_string(), reason.as_str()))
                .collect(),
            resolve_failures: self.resolve_failures.iter().map(|id| id.to_string()).collect(),
            delivered: self.delivered,
            dropped: self.dropped,
            active_sessions: self.active_sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_record() {
        let report = TickReport {
            selected: 15,
            absent: vec![(
                ChannelId::new("RADAR_LEFT_SIDE"),
                AbsenceReason::Stale {
                    age: Duration::from_millis(300),
                },
            )],
            resolve_failures: vec![ChannelId::new("LIDAR_LEFT")],
            delivered: 4,
            duration: Duration::from_micros(2500),
            ..TickReport::new(Timestamp::from_micros(1_000))
        };

        let record = report.to_record();
        assert_eq!(record.selected, 15);
        assert_eq!(record.absent, vec![("RADAR_LEFT_SIDE".to_string(), "stale")]);
        assert_eq!(record.resolve_failures, vec!["LIDAR_LEFT".to_string()]);
        assert!((record.duration_ms - 2.5).abs() < 1e-9);
        assert!(report.is_absent("RADAR_LEFT_SIDE"));
        assert!(!report.is_absent("LIDAR_LEFT"));
    }
}
