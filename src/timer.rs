//! A monotonic frame timer, for measuring per-frame `dt` to feed into
//! [`crate::ecs::World::tick`] and for ad hoc elapsed-time logging.

use std::time::Instant;

/// Tracks a start instant and the instant of the last [`FrameTimer::tick`],
/// mirroring the original engine's `FTimer`: `tick` returns the delta since
/// the previous tick (and resets it), `peek` returns the same delta without
/// resetting, and `elapsed` returns the delta since construction.
pub struct FrameTimer {
    start: Instant,
    previous: Instant,
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            previous: now,
        }
    }

    /// Seconds since the last `tick` (or construction, on the first
    /// call), and resets the reference point to now.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.previous).as_secs_f32();
        self.previous = now;
        delta
    }

    /// Seconds since the last `tick`, without resetting it.
    pub fn peek(&self) -> f32 {
        Instant::now().duration_since(self.previous).as_secs_f32()
    }

    /// Seconds since this timer was constructed.
    pub fn elapsed(&self) -> f32 {
        Instant::now().duration_since(self.start).as_secs_f32()
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn tick_reports_a_positive_delta_and_resets() {
        let mut timer = FrameTimer::new();
        sleep(Duration::from_millis(5));
        let first = timer.tick();
        assert!(first > 0.0);
        let second = timer.peek();
        assert!(second < first);
    }

    #[test]
    fn elapsed_grows_monotonically() {
        let timer = FrameTimer::new();
        let a = timer.elapsed();
        sleep(Duration::from_millis(2));
        let b = timer.elapsed();
        assert!(b >= a);
    }
}
