use std::time::Instant;

/// Source of wall-clock readings, in seconds.
///
/// Readings are expected to increase but need not; the clock tolerates ties
/// and regressions.
pub trait TimeSource {
    fn now(&self) -> f64;
}

impl<F: Fn() -> f64> TimeSource for F {
    fn now(&self) -> f64 {
        self()
    }
}

/// Seconds since the source was created, read from `Instant`.
#[derive(Debug, Copy, Clone)]
pub struct MonotonicSource {
    origin: Instant,
}

impl MonotonicSource {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicSource {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous tick; 0 on the first tick, never negative.
    pub dt: f64,

    /// Source reading taken at the tick.
    pub now: f64,

    /// Monotonic frame counter, starting at 0.
    pub frame_index: u64,
}

/// Frame clock producing `FrameTime` snapshots.
///
/// One clock per render loop. Deltas are not smoothed and no fixed timestep is
/// applied, so anything integrated from `dt` runs at frame-rate dependent speed.
#[derive(Debug, Clone)]
pub struct FrameClock<S: TimeSource = MonotonicSource> {
    source: S,
    /// `None` until the first tick.
    last: Option<f64>,
    frame_index: u64,
    max_dt: Option<f64>,
}

impl FrameClock<MonotonicSource> {
    pub fn new() -> Self {
        Self::with_source(MonotonicSource::new())
    }
}

impl Default for FrameClock<MonotonicSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TimeSource> FrameClock<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            last: None,
            frame_index: 0,
            max_dt: None,
        }
    }

    /// Caps every delta at `max_dt` seconds, e.g. to survive debugger pauses.
    pub fn with_max_delta(mut self, max_dt: f64) -> Self {
        self.max_dt = Some(max_dt);
        self
    }

    /// Forgets the previous reading; the next tick reports a zero delta again.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// True once `tick` has been called.
    pub fn is_running(&self) -> bool {
        self.last.is_some()
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        let now = self.source.now();

        let mut dt = match self.last {
            None => 0.0,
            Some(last) => now - last,
        };
        if dt < 0.0 {
            log::debug!("time source went back {:.6}s; clamping delta to 0", -dt);
            dt = 0.0;
        } else if dt.is_nan() {
            dt = 0.0;
        }
        if let Some(max) = self.max_dt {
            dt = dt.min(max);
        }

        self.last = Some(now);

        let ft = FrameTime {
            dt,
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Replays readings in order, repeating the last one.
    fn scripted(readings: &[f64]) -> impl Fn() -> f64 {
        let queue = RefCell::new(readings.to_vec());
        move || {
            let mut q = queue.borrow_mut();
            if q.len() > 1 { q.remove(0) } else { q[0] }
        }
    }

    #[test]
    fn first_tick_is_zero() {
        let mut clock = FrameClock::with_source(scripted(&[5.0, 5.5]));
        assert!(!clock.is_running());

        let first = clock.tick();
        assert_eq!(first.dt, 0.0);
        assert_eq!(first.frame_index, 0);
        assert!(clock.is_running());

        let second = clock.tick();
        assert_eq!(second.dt, 0.5);
        assert_eq!(second.frame_index, 1);
    }

    #[test]
    fn regressions_and_ties_clamp_to_zero() {
        let mut clock = FrameClock::with_source(scripted(&[1.0, 2.0, 1.5, 1.5, 1.75]));
        let deltas: Vec<f64> = (0..5).map(|_| clock.tick().dt).collect();
        assert_eq!(deltas, vec![0.0, 1.0, 0.0, 0.0, 0.25]);
    }

    #[test]
    fn nan_reading_yields_zero_delta() {
        let mut clock = FrameClock::with_source(scripted(&[1.0, f64::NAN, 2.0]));
        clock.tick();
        assert_eq!(clock.tick().dt, 0.0);
        assert_eq!(clock.tick().dt, 0.0);
    }

    #[test]
    fn max_delta_caps_long_stalls() {
        let mut clock = FrameClock::with_source(scripted(&[0.0, 10.0])).with_max_delta(0.25);
        clock.tick();
        assert_eq!(clock.tick().dt, 0.25);
    }

    #[test]
    fn reset_restarts_from_zero() {
        let mut clock = FrameClock::with_source(scripted(&[0.0, 1.0, 3.0]));
        clock.tick();
        clock.tick();
        clock.reset();
        let ft = clock.tick();
        assert_eq!(ft.dt, 0.0);
        assert_eq!(ft.frame_index, 2);
    }

    #[test]
    fn monotonic_source_never_decreases() {
        let mut clock = FrameClock::new();
        for _ in 0..100 {
            assert!(clock.tick().dt >= 0.0);
        }
    }
}
