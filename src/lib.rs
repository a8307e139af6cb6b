//! bide - cooperative polling and retry primitives
//!
//! Repeatedly evaluate a predicate (or just sleep) until it succeeds, a
//! timeout elapses, or progress stalls, with configurable sleep intervals,
//! lazily rendered failure messages, and a final-attempt notification to
//! the predicate. Everything is single-threaded and blocking: the only
//! suspension points are `std::thread::sleep` calls.
//!
//! # Quick start
//!
//! ```
//! use std::time::Duration;
//! use bide::{wait_until, WaitConfig};
//!
//! let mut attempts = 0;
//! let result = wait_until(
//!     WaitConfig::new(Duration::from_secs(2))
//!         .with_sleep(Duration::from_millis(20))
//!         .with_message("worker never drained its queue"),
//!     |_| {
//!         attempts += 1;
//!         attempts >= 2
//!     },
//! );
//! assert!(result.is_ok());
//! ```
//!
//! The main entry points:
//!
//! - [`wait_until`] / [`iter_wait`] — the retry engine, eager and lazy.
//! - [`iter_wait_progress`] — time out on *lack of advancement* of an
//!   observed value rather than total elapsed time.
//! - [`wait`], [`repeat`], [`waiting`], [`timing`] — sleep and stopwatch
//!   conveniences built on the same primitives.

pub mod error;
pub mod logging;
pub mod predicate;
pub mod progress;
pub mod timer;
pub mod wait;

pub use error::{NotSatisfied, TimeoutError, WaitError};
pub use predicate::{AllOf, Attempt, AttemptInfo, FnPoller, Poller};
pub use progress::{iter_wait_progress, ProgressConfig, ProgressIter, ProgressState};
pub use timer::{timing, Timer};
pub use wait::{
    iter_wait, iter_wait_with, repeat, wait, wait_until, wait_until_with, waiting, Message,
    WaitConfig, WaitIter, DEFAULT_SLEEP,
};
