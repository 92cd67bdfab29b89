use std::fmt;
use std::time::{Duration, Instant};

/// Link statistics measured once per heartbeat round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetStatsSnapshot {
    pub frames_per_sec: f32,
    pub kib_per_sec: f32,
    pub latency: Duration,
}

impl fmt::Display for NetStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fps={} / kb/s={:.2} / time={}",
            self.frames_per_sec,
            self.kib_per_sec,
            self.latency.as_millis()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TrafficRates {
    pub frames_per_sec: f32,
    pub kib_per_sec: f32,
}

/// Counts inbound frames and bytes between heartbeats.
#[derive(Debug)]
pub(crate) struct TrafficCounters {
    interval_start: Instant,
    frames: u32,
    bytes: u64,
}

impl TrafficCounters {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            interval_start: now,
            frames: 0,
            bytes: 0,
        }
    }

    pub(crate) fn record_bytes(&mut self, len: usize) {
        self.bytes = self.bytes.saturating_add(len as u64);
    }

    pub(crate) fn record_frame(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    pub(crate) fn restart(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    /// Rates over the time actually elapsed since the last call, then resets.
    pub(crate) fn take_rates(&mut self, now: Instant) -> TrafficRates {
        let elapsed = now.saturating_duration_since(self.interval_start);
        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);

        let rates = TrafficRates {
            frames_per_sec: self.frames as f32 / elapsed_seconds,
            kib_per_sec: self.bytes as f32 / 1024.0 / elapsed_seconds,
        };

        self.restart(now);
        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_use_elapsed_time_and_reset() {
        let base = Instant::now();
        let mut counters = TrafficCounters::new(base);
        for _ in 0..20 {
            counters.record_frame();
            counters.record_bytes(1024);
        }

        let rates = counters.take_rates(base + Duration::from_secs(10));
        assert!((rates.frames_per_sec - 2.0).abs() < 0.001);
        assert!((rates.kib_per_sec - 2.0).abs() < 0.001);

        let idle = counters.take_rates(base + Duration::from_secs(20));
        assert_eq!(idle.frames_per_sec, 0.0);
        assert_eq!(idle.kib_per_sec, 0.0);
    }

    #[test]
    fn stats_text_matches_status_line_layout() {
        let snapshot = NetStatsSnapshot {
            frames_per_sec: 4.0,
            kib_per_sec: 1.5,
            latency: Duration::from_millis(42),
        };
        assert_eq!(snapshot.to_string(), "fps=4 / kb/s=1.50 / time=42");
    }
}
