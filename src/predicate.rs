//! Predicate invocation adapter.
//!
//! The wait engine talks to predicates through the [`Poller`] trait,
//! implemented by [`FnPoller`] (which adapts a closure) and by [`AllOf`]
//! groups. The engine's entry points accept bare closures and wrap them
//! themselves, so the closure's return type only has to convert into an
//! [`Attempt`]; closures may return:
//!
//! - `bool` — `true` is satisfied, `false` keeps polling;
//! - `Option<T>` — `Some(value)` is satisfied with a value;
//! - [`NotSatisfied`] — keep polling, retaining the diagnostic reason;
//! - `Result<T, WaitError>` — `Ok` is satisfied, any `Err` aborts the wait
//!   (this is how nested waits propagate, see below);
//! - [`Attempt`] itself, for full control.
//!
//! # Nested waits
//!
//! A [`NotSatisfied`] is a retry signal only when the predicate returns it
//! as its own verdict. When it escapes an *inner* wait's error path — a
//! nested `wait_until` that exhausted its own budget — the `Result`
//! conversion maps it to [`Attempt::Fatal`], so it is fatal to every
//! enclosing wait. The reason is consumed as a retry signal at most once,
//! by the innermost wait that owns it.

use std::time::Duration;

use crate::error::{NotSatisfied, WaitError};

/// Details about one predicate invocation.
#[derive(Debug, Clone, Copy)]
pub struct AttemptInfo {
    /// 1-based invocation counter within the current wait.
    pub number: u64,
    /// Time elapsed since the wait started, sampled before the invocation.
    pub elapsed: Duration,
    /// True exactly once: on the last scheduled invocation before the
    /// wait's budget is declared exhausted.
    pub is_final: bool,
}

/// Outcome of a single predicate invocation.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The condition holds; the wait succeeds with this value.
    Satisfied(T),
    /// The condition does not hold yet; keep polling.
    Pending,
    /// The condition does not hold yet; keep polling, but retain this
    /// reason to surface if the budget runs out.
    NotSatisfied(NotSatisfied),
    /// The wait cannot succeed; abort immediately without retry.
    Fatal(WaitError),
}

impl Attempt<()> {
    /// A fatal outcome from an arbitrary error value.
    pub fn fatal(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Attempt::Fatal(WaitError::aborted(source))
    }
}

impl From<bool> for Attempt<()> {
    fn from(satisfied: bool) -> Self {
        if satisfied {
            Attempt::Satisfied(())
        } else {
            Attempt::Pending
        }
    }
}

impl<T> From<Option<T>> for Attempt<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Attempt::Satisfied(value),
            None => Attempt::Pending,
        }
    }
}

impl<T> From<NotSatisfied> for Attempt<T> {
    fn from(reason: NotSatisfied) -> Self {
        Attempt::NotSatisfied(reason)
    }
}

impl<T> From<Result<T, WaitError>> for Attempt<T> {
    fn from(result: Result<T, WaitError>) -> Self {
        match result {
            Ok(value) => Attempt::Satisfied(value),
            // Errors out of a nested wait are fatal here, including a
            // NotSatisfied the inner wait already gave up on.
            Err(err) => Attempt::Fatal(err),
        }
    }
}

/// A pollable condition.
///
/// Implemented by [`FnPoller`] for closures and by [`AllOf`] groups. The
/// engine's entry points take closures directly and wrap them in
/// [`FnPoller`]; the `*_with` variants accept any `Poller`.
pub trait Poller<T> {
    /// Evaluates the condition once.
    fn poll(&mut self, attempt: &AttemptInfo) -> Attempt<T>;
}

impl<T, P: Poller<T> + ?Sized> Poller<T> for &mut P {
    fn poll(&mut self, attempt: &AttemptInfo) -> Attempt<T> {
        (**self).poll(attempt)
    }
}

/// Adapts a closure into a [`Poller`].
///
/// The closure's return type only has to convert into an [`Attempt`], so
/// plain `bool`/`Option`/`Result` predicates work unchanged.
pub struct FnPoller<F> {
    f: F,
}

impl<F> FnPoller<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, A, F> Poller<T> for FnPoller<F>
where
    F: FnMut(&AttemptInfo) -> A,
    A: Into<Attempt<T>>,
{
    fn poll(&mut self, attempt: &AttemptInfo) -> Attempt<T> {
        (self.f)(attempt).into()
    }
}

/// An ordered group of predicates that must all be satisfied on the same
/// poll.
///
/// Every member is invoked on every poll, left to right, with the same
/// [`AttemptInfo`] — there is no short-circuiting, so side-effecting members
/// still run after an earlier one came up unsatisfied. The only exception is
/// a [`Attempt::Fatal`] outcome, which aborts the sweep immediately.
///
/// The group verdict is `Satisfied(())` only if every member was satisfied;
/// otherwise the most recent [`NotSatisfied`] reason observed during the
/// sweep is retained, falling back to a bare `Pending`.
///
/// Groups must not be empty.
pub struct AllOf<'a> {
    members: Vec<Box<dyn Poller<()> + 'a>>,
}

impl<'a> AllOf<'a> {
    /// An empty group, to be populated with [`AllOf::and`].
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Appends a member predicate given as a closure.
    pub fn and<A, F>(mut self, member: F) -> Self
    where
        A: Into<Attempt<()>>,
        F: FnMut(&AttemptInfo) -> A,
        F: 'a,
    {
        self.members.push(Box::new(FnPoller::new(member)));
        self
    }

    /// Appends a member given as a custom [`Poller`].
    pub fn and_poller(mut self, member: impl Poller<()> + 'a) -> Self {
        self.members.push(Box::new(member));
        self
    }

    /// Number of member predicates.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<'a> Default for AllOf<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Poller<()> for AllOf<'a> {
    fn poll(&mut self, attempt: &AttemptInfo) -> Attempt<()> {
        debug_assert!(!self.members.is_empty(), "AllOf group must not be empty");
        let mut satisfied = true;
        let mut reason: Option<NotSatisfied> = None;
        for member in &mut self.members {
            match member.poll(attempt) {
                Attempt::Satisfied(()) => {}
                Attempt::Pending => satisfied = false,
                Attempt::NotSatisfied(ns) => {
                    satisfied = false;
                    reason = Some(ns);
                }
                Attempt::Fatal(err) => return Attempt::Fatal(err),
            }
        }
        if satisfied {
            Attempt::Satisfied(())
        } else {
            match reason {
                Some(ns) => Attempt::NotSatisfied(ns),
                None => Attempt::Pending,
            }
        }
    }
}
