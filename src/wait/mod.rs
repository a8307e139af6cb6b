//! The wait/retry engine.
//!
//! [`iter_wait`] is the state machine: a lazy, single-pass iterator that
//! polls a predicate with capped sleeps in between and defers all timeout
//! and failure handling to the point the caller resumes consumption.
//! [`wait_until`] drives it to completion; [`wait`], [`repeat`] and
//! [`waiting`] are the predicate-less conveniences built on the same
//! sleep/timer primitives.

use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{NotSatisfied, TimeoutError, WaitError};
use crate::predicate::{Attempt, AttemptInfo, FnPoller, Poller};
use crate::timer::Timer;

/// Sleep interval applied between attempts when none is configured.
pub const DEFAULT_SLEEP: Duration = Duration::from_millis(500);

/// The failure message attached to a wait.
///
/// Required whenever a predicate is polled: a wait that can time out must
/// say what it was waiting for. [`Message::None`] is the explicit opt-out;
/// [`Message::Lazy`] defers rendering to the moment of failure so the text
/// can capture live diagnostic state.
pub enum Message {
    /// No message was configured. Polling a predicate in this state is a
    /// usage error.
    Unset,
    /// Explicitly opted out; a generic timeout message is synthesized.
    None,
    /// A fixed message.
    Text(String),
    /// Rendered only at the failure site.
    Lazy(Box<dyn Fn() -> String>),
}

impl Message {
    fn is_unset(&self) -> bool {
        matches!(self, Message::Unset)
    }

    /// Renders the message at failure time.
    fn resolve(&self, timeout: Duration) -> String {
        match self {
            Message::Text(text) => text.clone(),
            Message::Lazy(render) => render(),
            Message::Unset | Message::None => {
                format!("condition still unsatisfied after {timeout:?}")
            }
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Unset => f.write_str("Message::Unset"),
            Message::None => f.write_str("Message::None"),
            Message::Text(text) => f.debug_tuple("Message::Text").field(text).finish(),
            Message::Lazy(_) => f.write_str("Message::Lazy(..)"),
        }
    }
}

/// Configuration for one wait call.
///
/// ```
/// use std::time::Duration;
/// use bide::WaitConfig;
///
/// let config = WaitConfig::new(Duration::from_secs(5))
///     .with_sleep(Duration::from_millis(100))
///     .with_message("service never became healthy");
/// ```
#[derive(Debug)]
pub struct WaitConfig {
    /// Maximum wall-clock budget for the whole wait.
    pub timeout: Duration,
    /// Interval between attempts, capped so it never overshoots `timeout`.
    pub sleep: Duration,
    /// Failure message; required unless explicitly opted out.
    pub message: Message,
    /// Whether exhausting the budget yields an error (`iter_wait` only);
    /// when false the sequence simply ends.
    pub throw: bool,
}

impl WaitConfig {
    /// A config with the given budget, [`DEFAULT_SLEEP`], no message, and
    /// `throw` enabled.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sleep: DEFAULT_SLEEP,
            message: Message::Unset,
            throw: true,
        }
    }

    /// Sets the interval between attempts.
    pub fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Sets a fixed failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Message::Text(message.into());
        self
    }

    /// Sets a failure message rendered only at the failure site, so it can
    /// capture state the predicate mutated on its last invocation.
    pub fn with_lazy_message(mut self, render: impl Fn() -> String + 'static) -> Self {
        self.message = Message::Lazy(Box::new(render));
        self
    }

    /// Explicitly opts out of a failure message.
    pub fn without_message(mut self) -> Self {
        self.message = Message::None;
        self
    }

    /// Ends the iteration silently on budget exhaustion instead of
    /// yielding an error.
    pub fn without_throw(mut self) -> Self {
        self.throw = false;
        self
    }
}

/// Blocks for the full budget. The predicate-less form of a wait:
/// unconditional success once the duration elapses.
pub fn wait(timeout: Duration) {
    thread::sleep(timeout);
}

/// Polls `pred` until it is satisfied or `config.timeout` elapses.
///
/// Returns the predicate's value on success. On failure returns, in order
/// of precedence: the usage error for a missing message, the predicate's
/// fatal error, its most recent [`NotSatisfied`] reason verbatim, or a
/// synthesized [`TimeoutError`].
///
/// ```
/// use std::time::Duration;
/// use bide::{wait_until, WaitConfig};
///
/// let mut polls = 0;
/// let ready = wait_until(
///     WaitConfig::new(Duration::from_secs(1))
///         .with_sleep(Duration::from_millis(10))
///         .with_message("counter never reached 3"),
///     |_| {
///         polls += 1;
///         polls >= 3
///     },
/// );
/// assert!(ready.is_ok());
/// ```
pub fn wait_until<T, A, F>(config: WaitConfig, pred: F) -> Result<T, WaitError>
where
    A: Into<Attempt<T>>,
    F: FnMut(&AttemptInfo) -> A,
{
    wait_until_with(config, FnPoller::new(pred))
}

/// [`wait_until`] for an arbitrary [`Poller`], such as an [`AllOf`] group.
///
/// [`AllOf`]: crate::predicate::AllOf
pub fn wait_until_with<T, P: Poller<T>>(config: WaitConfig, poller: P) -> Result<T, WaitError> {
    let mut iter = iter_wait_with(
        WaitConfig {
            throw: true,
            ..config
        },
        poller,
    );
    loop {
        match iter.next() {
            Some(Ok(Some(value))) => return Ok(value),
            Some(Ok(None)) => {}
            Some(Err(err)) => return Err(err),
            // Unreachable with throw forced on; treat as exhaustion anyway.
            None => return Err(iter.give_up()),
        }
    }
}

/// Lazily polls `pred`, yielding one item per attempt.
///
/// Items are `Ok(None)` for an unsatisfied intermediate attempt,
/// `Ok(Some(value))` on success, and `Err(..)` on failure, after which the
/// iterator is fused. The sequence is single-pass and non-restartable; the
/// sleep between attempts happens when the caller resumes consumption.
pub fn iter_wait<T, A, F>(config: WaitConfig, pred: F) -> WaitIter<T, FnPoller<F>>
where
    A: Into<Attempt<T>>,
    F: FnMut(&AttemptInfo) -> A,
{
    iter_wait_with(config, FnPoller::new(pred))
}

/// [`iter_wait`] for an arbitrary [`Poller`], such as an [`AllOf`] group.
///
/// [`AllOf`]: crate::predicate::AllOf
pub fn iter_wait_with<T, P: Poller<T>>(config: WaitConfig, poller: P) -> WaitIter<T, P> {
    WaitIter {
        config,
        pred: poller,
        timer: Timer::new(),
        attempt: 0,
        pending: None,
        done: false,
        _value: std::marker::PhantomData,
    }
}

/// The lazy polling sequence produced by [`iter_wait`].
pub struct WaitIter<T, P> {
    config: WaitConfig,
    pred: P,
    timer: Timer,
    attempt: u64,
    pending: Option<NotSatisfied>,
    done: bool,
    _value: std::marker::PhantomData<fn() -> T>,
}

impl<T, P> WaitIter<T, P> {
    /// Synthesizes the budget-exhaustion error: the pending
    /// [`NotSatisfied`] reason verbatim if one exists, otherwise a
    /// [`TimeoutError`] with the resolved message and the timer's window.
    fn give_up(&mut self) -> WaitError {
        let duration = self.timer.stop();
        if let Some(reason) = self.pending.take() {
            warn!(%reason, ?duration, "wait gave up with pending reason");
            return WaitError::NotSatisfied(reason);
        }
        let message = self.config.message.resolve(self.config.timeout);
        warn!(message = %message, ?duration, "wait timed out");
        WaitError::Timeout(TimeoutError {
            message,
            duration,
            start_time: self.timer.start_time(),
            // stop() above guarantees a stop timestamp.
            stop_time: self.timer.stop_time().unwrap_or_else(|| self.timer.start_time()),
        })
    }
}

impl<T, P: Poller<T>> Iterator for WaitIter<T, P> {
    type Item = Result<Option<T>, WaitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.attempt == 0 {
            // Usage check before any predicate call or sleep. A sequence
            // that cannot fail (throw disabled) needs no failure message.
            if self.config.message.is_unset() && self.config.throw {
                self.done = true;
                return Some(Err(WaitError::MessageRequired));
            }
            // The timer was started at construction; restart it so a
            // lazily consumed iterator measures from the first poll.
            self.timer.reset();
        } else {
            let nap = self.config.sleep.min(self.timer.remaining(self.config.timeout));
            if !nap.is_zero() {
                thread::sleep(nap);
            }
        }

        // Decided before the invocation: once the budget is spent, this is
        // the last scheduled attempt.
        let is_final = self.timer.expired(self.config.timeout);
        self.attempt += 1;
        let info = AttemptInfo {
            number: self.attempt,
            elapsed: self.timer.duration(),
            is_final,
        };
        trace!(attempt = info.number, elapsed = ?info.elapsed, is_final, "polling predicate");

        match self.pred.poll(&info) {
            Attempt::Satisfied(value) => {
                let duration = self.timer.stop();
                debug!(attempt = info.number, ?duration, "wait satisfied");
                self.done = true;
                return Some(Ok(Some(value)));
            }
            Attempt::Pending => {}
            Attempt::NotSatisfied(reason) => {
                trace!(%reason, "predicate not satisfied yet");
                self.pending = Some(reason);
            }
            Attempt::Fatal(err) => {
                self.done = true;
                return Some(Err(err));
            }
        }

        if is_final {
            self.done = true;
            if !self.config.throw {
                return None;
            }
            return Some(Err(self.give_up()));
        }
        Some(Ok(None))
    }
}

/// Invokes `callback` on every tick for the duration of `timeout`,
/// ignoring its return value. The first tick is immediate; success is
/// unconditional once the budget elapses.
pub fn repeat(timeout: Duration, sleep: Duration, mut callback: impl FnMut()) {
    let timer = Timer::new();
    loop {
        callback();
        let remaining = timer.remaining(timeout);
        if remaining.is_zero() {
            return;
        }
        thread::sleep(sleep.min(remaining));
    }
}

/// Runs `body` and then sleeps whatever is left of `budget`, so the whole
/// scope spans at least `budget` of wall-clock time.
///
/// Time spent inside `body` — including sleeps performed by nested waits —
/// counts against the budget, so nothing is double-waited. The top-up runs
/// on every exit path: a panic unwinding out of `body` still leaves the
/// scope spanning the full budget.
pub fn waiting<T>(budget: Duration, body: impl FnOnce() -> T) -> T {
    struct TopUp {
        timer: Timer,
        budget: Duration,
    }

    impl Drop for TopUp {
        fn drop(&mut self) {
            let remainder = self.timer.remaining(self.budget);
            if !remainder.is_zero() {
                trace!(?remainder, "topping scope up to its time budget");
                thread::sleep(remainder);
            }
        }
    }

    let _top_up = TopUp {
        timer: Timer::new(),
        budget,
    };
    body()
}
