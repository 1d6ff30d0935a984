//! Publish tick clock.

use std::time::Duration;

use contracts::Timestamp;

/// Cadence used when a scene has fewer than two keyframes
pub const FALLBACK_RATE_HZ: f64 = 10.0;

/// Generates the dataset-time ticks of one scene pass
///
/// Ticks run from the first to the last keyframe in steps of `step`
/// (dataset time). `wall_period` is the real time between ticks, `step`
/// scaled by the playback speed.
#[derive(Debug, Clone)]
pub struct TickClock {
    start: Timestamp,
    end: Timestamp,
    step: Duration,
    wall_period: Duration,
    next_index: u64,
}

impl TickClock {
    pub fn new(start: Timestamp, end: Timestamp, step: Duration, speed: f64) -> Self {
        let step = step.max(Duration::from_micros(1));
        let speed = if speed > 0.0 { speed } else { 1.0 };
        Self {
            start,
            end: end.max(start),
            step,
            wall_period: Duration::try_from_secs_f64(step.as_secs_f64() / speed).unwrap_or(step),
            next_index: 0,
        }
    }

    /// Clock over a scene's keyframe span.
    ///
    /// Cadence is `publish_rate_hz` when set, otherwise the median keyframe
    /// spacing. Returns None for a scene without keyframes.
    pub fn for_keyframes(
        keyframes: &[Timestamp],
        publish_rate_hz: Option<f64>,
        speed: f64,
    ) -> Option<Self> {
        let start = *keyframes.first()?;
        let end = *keyframes.last()?;
        let keyframe_step = || {
            median_spacing(keyframes)
                .unwrap_or_else(|| Duration::from_secs_f64(1.0 / FALLBACK_RATE_HZ))
        };
        // rates whose period does not fit a Duration fall back to keyframe spacing
        let step = publish_rate_hz
            .filter(|hz| *hz > 0.0)
            .and_then(|hz| Duration::try_from_secs_f64(1.0 / hz).ok())
            .unwrap_or_else(keyframe_step);
        Some(Self::new(start, end, step, speed))
    }

    /// Next tick, or None once past the last keyframe
    pub fn next_tick(&mut self) -> Option<Timestamp> {
        let offset = self.step.checked_mul(u32::try_from(self.next_index).ok()?)?;
        let tick = self.start.saturating_add(offset);
        if tick > self.end {
            return None;
        }
        self.next_index += 1;
        Some(tick)
    }

    /// Rewind to the first keyframe
    pub fn restart(&mut self) {
        self.next_index = 0;
    }

    /// Ticks already issued in this pass
    pub fn issued(&self) -> u64 {
        self.next_index
    }

    /// Total ticks in one pass
    pub fn tick_count(&self) -> u64 {
        let span = self.end.as_micros() - self.start.as_micros();
        span / (self.step.as_micros() as u64).max(1) + 1
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn wall_period(&self) -> Duration {
        self.wall_period
    }

    pub fn span(&self) -> (Timestamp, Timestamp) {
        (self.start, self.end)
    }
}

/// Median spacing of consecutive distinct keyframes
pub fn median_spacing(keyframes: &[Timestamp]) -> Option<Duration> {
    let mut gaps: Vec<u64> = keyframes
        .windows(2)
        .map(|w| w[1].as_micros().saturating_sub(w[0].as_micros()))
        .filter(|gap| *gap > 0)
        .collect();
    if gaps.is_empty() {
        return None;
    }
    gaps.sort_unstable();
    Some(Duration::from_micros(gaps[gaps.len() / 2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kf(stamps: &[u64]) -> Vec<Timestamp> {
        stamps.iter().copied().map(Timestamp::from_micros).collect()
    }

    #[test]
    fn test_median_spacing() {
        let keyframes = kf(&[0, 100_000, 200_000, 700_000, 800_000]);
        assert_eq!(median_spacing(&keyframes), Some(Duration::from_millis(100)));
        assert_eq!(median_spacing(&kf(&[5])), None);
    }

    #[test]
    fn test_ticks_cover_keyframe_span() {
        let keyframes = kf(&[1_000_000, 1_500_000, 2_000_000]);
        let mut clock = TickClock::for_keyframes(&keyframes, None, 1.0).unwrap();
        let ticks: Vec<u64> = std::iter::from_fn(|| clock.next_tick())
            .map(Timestamp::as_micros)
            .collect();
        assert_eq!(ticks, vec![1_000_000, 1_500_000, 2_000_000]);
        assert_eq!(clock.tick_count(), 3);
        assert!(clock.next_tick().is_none());

        clock.restart();
        assert_eq!(clock.next_tick(), Some(Timestamp::from_micros(1_000_000)));
    }

    #[test]
    fn test_publish_rate_overrides_keyframes() {
        let keyframes = kf(&[0, 500_000]);
        let mut clock = TickClock::for_keyframes(&keyframes, Some(10.0), 1.0).unwrap();
        assert_eq!(clock.step(), Duration::from_millis(100));
        let count = std::iter::from_fn(|| clock.next_tick()).count();
        assert_eq!(count, 6);
    }

    #[test]
    fn test_speed_scales_wall_period() {
        let keyframes = kf(&[0, 100_000, 200_000]);
        let clock = TickClock::for_keyframes(&keyframes, None, 2.0).unwrap();
        assert_eq!(clock.wall_period(), Duration::from_millis(50));
    }

    #[test]
    fn test_single_keyframe_uses_fallback_rate() {
        let mut clock = TickClock::for_keyframes(&kf(&[42]), None, 1.0).unwrap();
        assert_eq!(clock.step(), Duration::from_millis(100));
        assert_eq!(clock.next_tick(), Some(Timestamp::from_micros(42)));
        assert!(clock.next_tick().is_none());
    }

    #[test]
    fn test_extreme_rate_and_speed_do_not_panic() {
        let keyframes = kf(&[0, 100_000, 200_000]);

        let clock = TickClock::for_keyframes(&keyframes, Some(1e-300), 1.0).unwrap();
        assert_eq!(clock.step(), Duration::from_millis(100));

        let clock = TickClock::for_keyframes(&keyframes, None, 1e-300).unwrap();
        assert_eq!(clock.wall_period(), Duration::from_millis(100));
        assert_eq!(clock.tick_count(), 3);
    }

    #[test]
    fn test_no_keyframes() {
        assert!(TickClock::for_keyframes(&[], None, 1.0).is_none());
    }
}
