//! Monotonic stopwatch used by the wait engine.
//!
//! A [`Timer`] starts on construction and can be read while running: while
//! live, `duration()` reflects the time since start; once stopped, it is
//! frozen. The engine owns one `Timer` per wait call and lends its
//! timestamps to `TimeoutError` at failure time.

use std::time::{Duration, Instant};

/// A stopwatch over the monotonic clock.
///
/// Starts implicitly on construction. `duration()` works whether the timer
/// is running (computed live) or stopped (frozen at the stop timestamp).
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
    stop: Option<Instant>,
}

impl Timer {
    /// Starts a new timer at the current instant.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            stop: None,
        }
    }

    /// Stops the timer and returns the final duration.
    ///
    /// Stopping an already-stopped timer keeps the original stop timestamp.
    pub fn stop(&mut self) -> Duration {
        if self.stop.is_none() {
            self.stop = Some(Instant::now());
        }
        self.duration()
    }

    /// Restarts the timer from the current instant, clearing any stop.
    pub fn reset(&mut self) {
        self.start = Instant::now();
        self.stop = None;
    }

    /// The elapsed time: live if running, frozen once stopped.
    pub fn duration(&self) -> Duration {
        match self.stop {
            Some(stop) => stop.duration_since(self.start),
            None => self.start.elapsed(),
        }
    }

    /// The instant the timer was started (or last reset).
    pub fn start_time(&self) -> Instant {
        self.start
    }

    /// The instant the timer was stopped, if it has been.
    pub fn stop_time(&self) -> Option<Instant> {
        self.stop
    }

    /// Whether the timer is still running.
    pub fn is_running(&self) -> bool {
        self.stop.is_none()
    }

    /// Whether at least `timeout` has elapsed.
    pub fn expired(&self, timeout: Duration) -> bool {
        self.duration() >= timeout
    }

    /// Time left before `timeout` elapses; zero once expired.
    pub fn remaining(&self, timeout: Duration) -> Duration {
        timeout.saturating_sub(self.duration())
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `body` under a fresh [`Timer`] and returns its value together with
/// the stopped timer.
///
/// The timer is passed into the body so it can be read mid-flight:
///
/// ```
/// use bide::timing;
///
/// let (value, timer) = timing(|t| {
///     assert!(t.is_running());
///     42
/// });
/// assert_eq!(value, 42);
/// assert!(!timer.is_running());
/// ```
pub fn timing<T>(body: impl FnOnce(&Timer) -> T) -> (T, Timer) {
    let mut timer = Timer::new();
    let value = body(&timer);
    timer.stop();
    (value, timer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_duration_live_while_running() {
        let timer = Timer::new();
        thread::sleep(Duration::from_millis(20));
        let first = timer.duration();
        assert!(first >= Duration::from_millis(20));
        thread::sleep(Duration::from_millis(10));
        assert!(timer.duration() > first);
    }

    #[test]
    fn test_duration_frozen_after_stop() {
        let mut timer = Timer::new();
        thread::sleep(Duration::from_millis(10));
        let stopped = timer.stop();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(timer.duration(), stopped);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut timer = Timer::new();
        let first = timer.stop();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(timer.stop(), first);
    }

    #[test]
    fn test_reset_restarts() {
        let mut timer = Timer::new();
        thread::sleep(Duration::from_millis(20));
        timer.stop();
        timer.reset();
        assert!(timer.is_running());
        assert!(timer.duration() < Duration::from_millis(20));
    }

    #[test]
    fn test_expired_and_remaining() {
        let timer = Timer::new();
        assert!(!timer.expired(Duration::from_secs(60)));
        assert!(timer.remaining(Duration::from_secs(60)) > Duration::from_secs(59));
        thread::sleep(Duration::from_millis(15));
        assert!(timer.expired(Duration::from_millis(10)));
        assert_eq!(timer.remaining(Duration::from_millis(10)), Duration::ZERO);
    }

    #[test]
    fn test_timing_returns_value_and_stopped_timer() {
        let (value, timer) = timing(|_| "done");
        assert_eq!(value, "done");
        assert!(!timer.is_running());
        assert!(timer.stop_time().is_some());
    }

    #[test]
    fn test_timing_spans_body() {
        let ((), timer) = timing(|_| thread::sleep(Duration::from_millis(25)));
        assert!(timer.duration() >= Duration::from_millis(25));
    }
}
