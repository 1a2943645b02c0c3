//! Wall-clock time for deadlines.

use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time that advances with the tokio timer.
///
/// Anchored to a wall time once, then moved by tokio's monotonic clock, so
/// deadlines agree with `tokio::time::sleep` (including paused test time).
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    wall: DateTime<Utc>,
    start: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            wall,
            start: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Duration::from_std(self.start.elapsed()).unwrap_or_else(|_| Duration::zero());
        self.wall + elapsed
    }
}

/// Time left until `deadline`, `None` once it has passed
pub fn remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Option<std::time::Duration> {
    let left = deadline - now;
    if left <= Duration::zero() {
        return None;
    }
    left.to_std().ok()
}

/// Seconds as a chrono duration, at millisecond precision
pub fn seconds(secs: f32) -> Duration {
    Duration::milliseconds((f64::from(secs) * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let clock = TokioClock::starting_at(start);
        tokio::time::advance(std::time::Duration::from_secs(90)).await;
        assert_eq!(clock.now(), start + Duration::seconds(90));
    }

    #[test]
    fn test_remaining() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            remaining(now + Duration::seconds(5), now),
            Some(std::time::Duration::from_secs(5))
        );
        assert_eq!(remaining(now, now), None);
        assert_eq!(remaining(now - Duration::seconds(50), now), None);
    }

    #[test]
    fn test_seconds() {
        assert_eq!(seconds(600.0), Duration::seconds(600));
        assert_eq!(seconds(1.5), Duration::milliseconds(1500));
    }
}
