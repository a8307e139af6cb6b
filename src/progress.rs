//! Progress-stall polling: time out on lack of advancement, not duration.
//!
//! [`iter_wait_progress`] watches a getter's value across polls. Any
//! observed change resets the stall clock; the wait fails only when the
//! value has not moved within `advance_timeout` (or when an optional
//! `total_timeout` hard cap elapses, progress or not). Completion is
//! decided by a caller-supplied finish sentinel.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{TimeoutError, WaitError};
use crate::timer::Timer;
use crate::wait::DEFAULT_SLEEP;

/// Configuration for a progress wait.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Maximum time allowed with no observed change in the tracked value.
    pub advance_timeout: Duration,
    /// Interval separating polls; the first poll is always immediate.
    pub sleep: Duration,
    /// Optional hard cap on the whole wait, regardless of progress.
    pub total_timeout: Option<Duration>,
}

impl ProgressConfig {
    /// A config with the given advance timeout, [`DEFAULT_SLEEP`], and no
    /// total cap.
    pub fn new(advance_timeout: Duration) -> Self {
        Self {
            advance_timeout,
            sleep: DEFAULT_SLEEP,
            total_timeout: None,
        }
    }

    /// Sets the interval between polls.
    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Caps the whole wait regardless of progress.
    pub fn with_total_timeout(mut self, total_timeout: Duration) -> Self {
        self.total_timeout = Some(total_timeout);
        self
    }
}

/// Snapshot of one progress poll.
#[derive(Debug, Clone)]
pub struct ProgressState<V> {
    /// The value observed on this poll.
    pub current: V,
    /// The value observed on the previous poll, if any.
    pub previous: Option<V>,
    /// Whether the finish sentinel held for `current`.
    pub finished: bool,
    /// When the tracked value last changed (the wait's start until the
    /// first change is observed).
    pub last_change: Instant,
}

/// Lazily polls `get`, yielding a [`ProgressState`] per poll until `done`
/// holds for the observed value.
///
/// The first poll is immediate; subsequent polls are separated by at least
/// `config.sleep`. Any difference from the previously observed value —
/// regressions included — counts as advancement and resets the stall clock.
///
/// Failure yields `Err(WaitError::Timeout)` with a message prefixed
/// `"advanced but failed to finish"`. When `advance_timeout` and
/// `total_timeout` expire on the same poll, `advance_timeout` takes
/// precedence and the stall wording is reported.
///
/// ```
/// use std::time::Duration;
/// use bide::{iter_wait_progress, ProgressConfig};
///
/// let mut remaining = 3i32;
/// let config = ProgressConfig::new(Duration::from_secs(10))
///     .with_sleep(Duration::from_millis(10));
/// let last = iter_wait_progress(
///     || {
///         remaining -= 1;
///         remaining
///     },
///     |v| *v <= 0,
///     config,
/// )
/// .collect::<Result<Vec<_>, _>>()
/// .unwrap();
/// assert!(last.last().unwrap().finished);
/// ```
pub fn iter_wait_progress<V, G, D>(get: G, done: D, config: ProgressConfig) -> ProgressIter<V, G, D>
where
    V: PartialEq + Clone + fmt::Debug,
    G: FnMut() -> V,
    D: FnMut(&V) -> bool,
{
    ProgressIter {
        get,
        done,
        config,
        overall: Timer::new(),
        stall: Timer::new(),
        previous: None,
        polls: 0,
        fused: false,
    }
}

/// The lazy sequence produced by [`iter_wait_progress`].
pub struct ProgressIter<V, G, D> {
    get: G,
    done: D,
    config: ProgressConfig,
    overall: Timer,
    stall: Timer,
    previous: Option<V>,
    polls: u64,
    fused: bool,
}

impl<V, G, D> ProgressIter<V, G, D> {
    fn give_up(&mut self, message: String) -> WaitError {
        let duration = self.overall.stop();
        warn!(message = %message, ?duration, "progress wait gave up");
        WaitError::Timeout(TimeoutError {
            message,
            duration,
            start_time: self.overall.start_time(),
            stop_time: self
                .overall
                .stop_time()
                .unwrap_or_else(|| self.overall.start_time()),
        })
    }
}

impl<V, G, D> Iterator for ProgressIter<V, G, D>
where
    V: PartialEq + Clone + fmt::Debug,
    G: FnMut() -> V,
    D: FnMut(&V) -> bool,
{
    type Item = Result<ProgressState<V>, WaitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }

        if self.polls == 0 {
            // Measure from the first poll, not from construction.
            self.overall.reset();
            self.stall.reset();
        } else {
            thread::sleep(self.config.sleep);
        }
        self.polls += 1;

        let current = (self.get)();
        let changed = self
            .previous
            .as_ref()
            .map(|previous| *previous != current)
            .unwrap_or(true);
        if changed {
            self.stall.reset();
        }
        let finished = (self.done)(&current);
        trace!(current = ?current, changed, finished, poll = self.polls, "progress poll");

        let state = ProgressState {
            current: current.clone(),
            previous: self.previous.replace(current),
            finished,
            last_change: self.stall.start_time(),
        };

        if finished {
            let duration = self.overall.stop();
            debug!(?duration, polls = self.polls, "progress wait finished");
            self.fused = true;
            return Some(Ok(state));
        }

        // Stall check wins over the total cap when both expire together.
        if self.stall.expired(self.config.advance_timeout) {
            self.fused = true;
            let message = format!(
                "advanced but failed to finish: no advance past {:?} for {:?}",
                state.current,
                self.stall.duration(),
            );
            return Some(Err(self.give_up(message)));
        }
        if let Some(total) = self.config.total_timeout {
            if self.overall.expired(total) {
                self.fused = true;
                let message = format!(
                    "advanced but failed to finish within the total budget of {total:?}"
                );
                return Some(Err(self.give_up(message)));
            }
        }

        Some(Ok(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    #[test]
    fn test_countdown_finishes() {
        let mut value = 3i32;
        let states: Vec<_> = iter_wait_progress(
            || {
                value -= 1;
                value
            },
            |v| *v <= 0,
            ProgressConfig::new(Duration::from_secs(10)).with_sleep(TICK),
        )
        .collect::<Result<_, _>>()
        .expect("countdown should finish");
        assert_eq!(states.len(), 3);
        assert!(states.last().unwrap().finished);
        assert!(states[..states.len() - 1].iter().all(|s| !s.finished));
    }

    #[test]
    fn test_first_poll_is_immediate() {
        let timer = Timer::new();
        let mut iter = iter_wait_progress(
            || 1,
            |_| false,
            ProgressConfig::new(Duration::from_secs(10)).with_sleep(Duration::from_millis(200)),
        );
        iter.next().unwrap().unwrap();
        assert!(timer.duration() < Duration::from_millis(200));
        // Subsequent polls wait out the sleep first.
        iter.next().unwrap().unwrap();
        assert!(timer.duration() >= Duration::from_millis(200));
    }

    #[test]
    fn test_stalled_value_times_out_with_stall_wording() {
        let result: Result<Vec<_>, _> = iter_wait_progress(
            || 42,
            |_| false,
            ProgressConfig::new(Duration::from_millis(50)).with_sleep(TICK),
        )
        .collect();
        match result {
            Err(WaitError::Timeout(err)) => {
                assert!(err.message.starts_with("advanced but failed to finish"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_total_timeout_fires_despite_progress() {
        let mut value = 1000i64;
        let result: Result<Vec<_>, _> = iter_wait_progress(
            || {
                value -= 1;
                value
            },
            |v| *v <= 0,
            ProgressConfig::new(Duration::from_secs(10))
                .with_sleep(TICK)
                .with_total_timeout(Duration::from_millis(50)),
        )
        .collect();
        match result {
            Err(WaitError::Timeout(err)) => {
                assert!(err.message.starts_with("advanced but failed to finish"));
                assert!(err.duration >= Duration::from_millis(50));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_regression_counts_as_advancement() {
        // Value oscillates, never settling: the stall clock keeps
        // resetting until the total cap fires.
        let mut flip = false;
        let result: Result<Vec<_>, _> = iter_wait_progress(
            || {
                flip = !flip;
                flip as i32
            },
            |_| false,
            ProgressConfig::new(Duration::from_millis(40))
                .with_sleep(TICK)
                .with_total_timeout(Duration::from_millis(100)),
        )
        .collect();
        match result {
            Err(WaitError::Timeout(err)) => {
                assert!(err.duration >= Duration::from_millis(100));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_states_carry_previous_value() {
        let mut value = 2i32;
        let states: Vec<_> = iter_wait_progress(
            || {
                value -= 1;
                value
            },
            |v| *v <= 0,
            ProgressConfig::new(Duration::from_secs(10)).with_sleep(TICK),
        )
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(states[0].previous, None);
        assert_eq!(states[0].current, 1);
        assert_eq!(states[1].previous, Some(1));
        assert_eq!(states[1].current, 0);
    }

    #[test]
    fn test_iterator_is_fused_after_finish() {
        let mut iter = iter_wait_progress(
            || 0,
            |v| *v == 0,
            ProgressConfig::new(Duration::from_secs(10)).with_sleep(TICK),
        );
        assert!(iter.next().unwrap().unwrap().finished);
        assert!(iter.next().is_none());
    }
}
