use std::time::{Duration, Instant};

use serde::Serialize;

use crate::scale::Tala;

pub const DEFAULT_BEAT_INTERVAL: Duration = Duration::from_millis(500);

/// Fixed-interval beat counter for the tala display.
///
/// The timer keeps its own schedule from the moment it starts and is not
/// tied to frame or audio timing, so the displayed beat may drift from what
/// is heard over a long session.
#[derive(Debug, Clone)]
pub struct BeatTimer {
    interval: Duration,
    started_at: Option<Instant>,
    ticks: u64,
}

impl Default for BeatTimer {
    fn default() -> Self {
        Self::new(DEFAULT_BEAT_INTERVAL)
    }
}

impl BeatTimer {
    /// Stopped timer. Intervals below one millisecond are rounded up.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            started_at: None,
            ticks: 0,
        }
    }

    /// (Re)starts the schedule at `now` with the count back at zero.
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.ticks = 0;
    }

    pub fn stop(&mut self) {
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Catches the counter up to `now`. Returns the new tick count when at
    /// least one interval elapsed since the last poll.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        let started_at = self.started_at?;
        let elapsed = now.saturating_duration_since(started_at);
        let due = (elapsed.as_nanos() / self.interval.as_nanos()) as u64;
        if due > self.ticks {
            self.ticks = due;
            Some(due)
        } else {
            None
        }
    }
}

/// Position within the tala cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BeatTick {
    pub beat: usize,
    pub strong: bool,
}

impl BeatTick {
    /// Beat `ticks` lands on, wrapped to the tala length.
    pub fn at(ticks: u64, tala: &Tala) -> Self {
        let beat = (ticks % tala.beats() as u64) as usize;
        Self {
            beat,
            strong: tala.is_strong(beat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::ScaleTable;

    #[test]
    fn counts_whole_intervals_only() {
        let mut timer = BeatTimer::default();
        let start = Instant::now();
        assert_eq!(timer.poll(start), None);

        timer.start(start);
        assert_eq!(timer.poll(start + Duration::from_millis(499)), None);
        assert_eq!(timer.poll(start + Duration::from_millis(500)), Some(1));
        assert_eq!(timer.poll(start + Duration::from_millis(900)), None);
        assert_eq!(timer.poll(start + Duration::from_millis(2100)), Some(4));
    }

    #[test]
    fn stopped_timer_never_ticks() {
        let mut timer = BeatTimer::default();
        let start = Instant::now();
        timer.start(start);
        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.poll(start + Duration::from_secs(10)), None);
    }

    #[test]
    fn beat_wraps_around_the_tala() {
        let table = ScaleTable::builtin();
        let rupaka = table.tala("rupaka").unwrap();
        assert_eq!(BeatTick::at(6, rupaka), BeatTick { beat: 0, strong: true });
        assert_eq!(BeatTick::at(7, rupaka), BeatTick { beat: 1, strong: false });
        assert_eq!(BeatTick::at(9, rupaka).beat, 3);
    }
}
