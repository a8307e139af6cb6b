//! Error taxonomy for the wait engine.
//!
//! Three failure families surface from a wait:
//!
//! - [`WaitError::MessageRequired`] — a usage error, reported before any
//!   polling or sleeping begins and never retried.
//! - [`NotSatisfied`] — a "condition not met *yet*" signal a predicate may
//!   return instead of a bare pending verdict, carrying diagnostic context.
//!   It is retried until the budget runs out and then returned verbatim.
//! - [`TimeoutError`] — synthesized when the budget is exhausted and no
//!   `NotSatisfied` reason is pending; borrows the timestamps of the timer
//!   that owned the wait.
//!
//! Arbitrary predicate failures abort the wait immediately through
//! [`WaitError::Aborted`].

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

/// A predicate's signal that its condition does not hold yet.
///
/// Unlike a plain pending verdict, a `NotSatisfied` carries diagnostic
/// context that survives to the caller if the wait's budget runs out: the
/// engine retains the most recent one and returns it unchanged instead of a
/// synthesized [`TimeoutError`].
///
/// ```
/// use bide::NotSatisfied;
///
/// let reason = NotSatisfied::because("replica lag").with("lag_ms", 1800);
/// assert_eq!(reason.get("lag_ms"), Some("1800"));
/// ```
#[derive(Debug, Clone, Default, Error)]
pub struct NotSatisfied {
    label: Option<String>,
    context: Vec<(String, String)>,
}

impl NotSatisfied {
    /// An anonymous not-yet-satisfied signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal labeled with the condition it describes.
    pub fn because(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            context: Vec::new(),
        }
    }

    /// Attaches a diagnostic key/value pair. Pairs keep insertion order.
    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.push((key.into(), value.to_string()));
        self
    }

    /// The label given to [`NotSatisfied::because`], if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Looks up a diagnostic value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The diagnostic pairs in insertion order.
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }
}

impl fmt::Display for NotSatisfied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "condition not satisfied: {label}")?,
            None => write!(f, "condition not satisfied")?,
        }
        if !self.context.is_empty() {
            write!(f, " (")?;
            for (i, (k, v)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{k}={v}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A wait that exhausted its time budget.
///
/// Carries the resolved failure message plus the owning timer's
/// start/stop timestamps and measured duration.
#[derive(Debug, Clone, Error)]
#[error("{message} (gave up after {duration:?})")]
pub struct TimeoutError {
    /// Human-readable failure message, resolved at the moment of failure.
    pub message: String,
    /// Total time spent waiting, as measured by the wait's own timer.
    pub duration: Duration,
    /// When the wait began.
    pub start_time: Instant,
    /// When the wait gave up.
    pub stop_time: Instant,
}

/// Any failure surfaced by the wait engine.
#[derive(Debug, Error)]
pub enum WaitError {
    /// A predicate was supplied without a failure message. This is a
    /// programmer-facing contract violation, reported before any polling.
    #[error("`message` is required when waiting on a predicate; use `without_message()` to opt out")]
    MessageRequired,

    /// The time budget ran out with no pending [`NotSatisfied`] reason.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The time budget ran out; the predicate's most recent
    /// [`NotSatisfied`] reason is returned verbatim.
    #[error(transparent)]
    NotSatisfied(#[from] NotSatisfied),

    /// The predicate failed outright; the wait was aborted without retry.
    #[error("wait aborted: {0}")]
    Aborted(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl WaitError {
    /// Wraps an arbitrary failure as an immediate abort.
    pub fn aborted(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        WaitError::Aborted(Box::new(source))
    }

    /// Whether this is the missing-message usage error.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, WaitError::MessageRequired)
    }

    /// The timeout payload, if the budget ran out without a pending reason.
    pub fn as_timeout(&self) -> Option<&TimeoutError> {
        match self {
            WaitError::Timeout(err) => Some(err),
            _ => None,
        }
    }

    /// The verbatim [`NotSatisfied`] reason, if one was pending at failure.
    pub fn as_not_satisfied(&self) -> Option<&NotSatisfied> {
        match self {
            WaitError::NotSatisfied(reason) => Some(reason),
            _ => None,
        }
    }
}
