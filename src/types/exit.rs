//! The terminal result of a fiber.
//!
//! An [`Exit`] is either the value the fiber produced or the full [`Cause`]
//! of its failure. Joining several exits combines their causes, so nothing
//! observed by a child fiber is lost on the way to its parent.

use core::fmt;
use std::hash::Hash;

use crate::cause::{Cause, Defect};
use crate::types::FiberId;

/// The outcome of a completed fiber.
#[derive(Clone)]
pub enum Exit<E, A> {
    /// The fiber produced a value.
    Success(A),
    /// The fiber failed; the cause says how.
    Failure(Cause<E>),
}

impl<E, A> Exit<E, A> {
    /// A successful exit.
    #[must_use]
    pub const fn succeed(value: A) -> Self {
        Self::Success(value)
    }

    /// An exit failed with an expected error.
    #[must_use]
    pub const fn fail(error: E) -> Self {
        Self::Failure(Cause::Fail(error))
    }

    /// An exit failed with an arbitrary cause.
    #[must_use]
    pub const fn fail_cause(cause: Cause<E>) -> Self {
        Self::Failure(cause)
    }

    /// An exit failed with a defect.
    #[must_use]
    pub fn die(defect: impl Into<Defect>) -> Self {
        Self::Failure(Cause::die(defect))
    }

    /// An exit interrupted by `fiber_id`.
    #[must_use]
    pub const fn interrupt(fiber_id: FiberId) -> Self {
        Self::Failure(Cause::Interrupt(fiber_id))
    }

    /// Returns true for [`Exit::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true for [`Exit::Failure`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns true if the failure cause contains an interruption.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.cause().is_some_and(Cause::is_interrupted)
    }

    /// The success value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&A> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// The failure cause, if any.
    #[must_use]
    pub const fn cause(&self) -> Option<&Cause<E>> {
        match self {
            Self::Success(_) => None,
            Self::Failure(cause) => Some(cause),
        }
    }

    /// Maps the success value.
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> Exit<E, B> {
        match self {
            Self::Success(value) => Exit::Success(f(value)),
            Self::Failure(cause) => Exit::Failure(cause),
        }
    }

    /// Maps every expected error in the cause.
    pub fn map_error<E2>(self, f: impl FnMut(&E) -> E2) -> Exit<E2, A> {
        match self {
            Self::Success(value) => Exit::Success(value),
            Self::Failure(cause) => Exit::Failure(cause.map(f)),
        }
    }

    /// Chains a computation on the success value.
    pub fn and_then<B>(self, f: impl FnOnce(A) -> Exit<E, B>) -> Exit<E, B> {
        match self {
            Self::Success(value) => f(value),
            Self::Failure(cause) => Exit::Failure(cause),
        }
    }

    /// Combines two exits of concurrently running work. Two failures are
    /// merged with [`Cause::parallel`].
    pub fn zip_with<B, C>(self, that: Exit<E, B>, f: impl FnOnce(A, B) -> C) -> Exit<E, C> {
        self.zip_with_causes(that, f, Cause::parallel)
    }

    /// Like [`zip_with`](Self::zip_with), but for work that ran one after the
    /// other. Two failures are merged with [`Cause::sequential`].
    pub fn zip_with_sequential<B, C>(
        self,
        that: Exit<E, B>,
        f: impl FnOnce(A, B) -> C,
    ) -> Exit<E, C> {
        self.zip_with_causes(that, f, Cause::sequential)
    }

    fn zip_with_causes<B, C>(
        self,
        that: Exit<E, B>,
        f: impl FnOnce(A, B) -> C,
        combine: fn(Cause<E>, Cause<E>) -> Cause<E>,
    ) -> Exit<E, C> {
        match (self, that) {
            (Self::Success(a), Exit::Success(b)) => Exit::Success(f(a, b)),
            (Self::Failure(left), Exit::Failure(right)) => Exit::Failure(combine(left, right)),
            (Self::Failure(cause), Exit::Success(_)) | (Self::Success(_), Exit::Failure(cause)) => {
                Exit::Failure(cause)
            }
        }
    }

    /// Converts into a `Result`, keeping the full cause on failure.
    pub fn into_result(self) -> Result<A, Cause<E>> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(cause) => Err(cause),
        }
    }
}

impl<E, A> From<Result<A, E>> for Exit<E, A> {
    fn from(result: Result<A, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::fail(error),
        }
    }
}

impl<E: fmt::Debug, A: fmt::Debug> fmt::Debug for Exit<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(value) => f.debug_tuple("Success").field(value).finish(),
            Self::Failure(cause) => f.debug_tuple("Failure").field(cause).finish(),
        }
    }
}

impl<E: Eq + Hash, A: PartialEq> PartialEq for Exit<E, A> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Success(a), Self::Success(b)) => a == b,
            (Self::Failure(a), Self::Failure(b)) => a == b,
            _ => false,
        }
    }
}

impl<E: Eq + Hash, A: Eq> Eq for Exit<E, A> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(id: u64) -> FiberId {
        FiberId::runtime(id, 0)
    }

    #[test]
    fn constructors_and_predicates() {
        let ok: Exit<&str, i32> = Exit::succeed(1);
        assert!(ok.is_success());
        assert_eq!(ok.value(), Some(&1));
        assert!(ok.cause().is_none());

        let failed: Exit<&str, i32> = Exit::fail("e");
        assert!(failed.is_failure());
        assert!(!failed.is_interrupted());

        let interrupted: Exit<&str, i32> = Exit::interrupt(fid(4));
        assert!(interrupted.is_interrupted());
        assert!(Exit::<&str, i32>::die("d").cause().is_some_and(Cause::is_die));
    }

    #[test]
    fn map_and_map_error() {
        let ok: Exit<&str, i32> = Exit::succeed(2);
        assert_eq!(ok.map(|n| n * 3), Exit::succeed(6));

        let failed: Exit<&str, i32> = Exit::fail("bad");
        let mapped = failed.map_error(|e| e.len());
        assert_eq!(mapped, Exit::fail(3));
    }

    #[test]
    fn zip_with_combines_failures_in_parallel() {
        let a: Exit<&str, i32> = Exit::fail("a");
        let b: Exit<&str, i32> = Exit::fail("b");
        let zipped = a.zip_with(b, |x, y| x + y);
        assert_eq!(
            zipped,
            Exit::fail_cause(Cause::parallel(Cause::fail("b"), Cause::fail("a")))
        );

        let ok: Exit<&str, i32> = Exit::succeed(1);
        let other: Exit<&str, i32> = Exit::succeed(2);
        assert_eq!(ok.zip_with(other, |x, y| x + y), Exit::succeed(3));
    }

    #[test]
    fn zip_with_sequential_keeps_order() {
        let a: Exit<&str, i32> = Exit::fail("a");
        let b: Exit<&str, i32> = Exit::fail("b");
        let zipped = a.zip_with_sequential(b, |x, y| x + y);
        assert_eq!(
            zipped,
            Exit::fail_cause(Cause::sequential(Cause::fail("a"), Cause::fail("b")))
        );
        assert_ne!(
            zipped,
            Exit::fail_cause(Cause::sequential(Cause::fail("b"), Cause::fail("a")))
        );
    }

    #[test]
    fn one_failure_wins_over_success() {
        let ok: Exit<&str, i32> = Exit::succeed(1);
        let failed: Exit<&str, i32> = Exit::fail("x");
        assert_eq!(ok.zip_with(failed, |x, y| x + y), Exit::fail("x"));
    }

    #[test]
    fn result_round_trip() {
        let exit: Exit<String, u8> = Err("nope".to_string()).into();
        let result = exit.into_result();
        assert_eq!(
            result.expect_err("failed").failure_option().map(String::as_str),
            Some("nope")
        );
        let exit: Exit<String, u8> = Ok(5).into();
        assert_eq!(exit.into_result().ok(), Some(5));
    }

    #[test]
    fn and_then_short_circuits() {
        let failed: Exit<&str, i32> = Exit::fail("stop");
        let mut called = false;
        let out = failed.and_then(|n| {
            called = true;
            Exit::succeed(n + 1)
        });
        assert!(!called);
        assert!(out.is_failure());
    }
}
