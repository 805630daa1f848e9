//! Fiber handles.
//!
//! A fiber is a lightweight unit of concurrent work. This module defines how
//! the outside world observes one: its identity, whether it is done, its
//! eventual [`Exit`], and how to ask it to stop. Schedulers own the
//! [`RuntimeFiber`]s; everything else is a synthetic fiber derived from
//! other fibers (`map`, `or_else`, `zip`) or built from a known exit
//! (`done`, `never`).
//!
//! Interruption is cooperative: [`FiberHandle::interrupt_as_fork`] only
//! records the request, and the scheduler completes the fiber with an
//! interrupt cause at its next yield point.

pub mod derived;
pub mod refs;
pub mod runtime;

use std::future::Future;
use std::sync::Arc;

use crate::types::{Exit, FiberId};

pub use derived::{
    Done, MapEffect, Mapped, Never, OrElse, ZipWith, await_all, die, done, fail, fail_cause,
    interrupt_all_as, interrupt_as, interrupted, join, never, succeed,
};
pub use refs::{FiberRef, FiberRefs};
pub use runtime::{AwaitExit, RuntimeFiber};

/// A value of one of two types, produced by [`Fiber::or_else_either`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Either<L, R> {
    /// Produced by the primary fiber.
    Left(L),
    /// Produced by the fallback fiber.
    Right(R),
}

/// The type-erased part of a fiber: identity, status and interruption.
///
/// Object safe, so heterogeneous fibers can be stored together (e.g. the
/// children of a fiber).
pub trait FiberHandle: Send + Sync {
    /// The fiber's identity.
    fn id(&self) -> FiberId;

    /// Whether the fiber has completed.
    fn is_done(&self) -> bool;

    /// Asks the fiber to stop on behalf of `fiber_id` without waiting.
    fn interrupt_as_fork(&self, fiber_id: FiberId);

    /// Fibers forked by this one that are still running.
    fn children(&self) -> Vec<Arc<dyn FiberHandle>>;
}

/// A fiber whose exit can be observed.
pub trait Fiber: FiberHandle {
    /// Expected error type.
    type Error: Send + Sync + 'static;
    /// Success value type.
    type Value: Send + Sync + 'static;

    /// Waits for the fiber to complete.
    fn await_exit(&self) -> impl Future<Output = Exit<Self::Error, Self::Value>> + Send + '_;

    /// The exit if the fiber is done, without waiting.
    fn poll_exit(&self) -> Option<Exit<Self::Error, Self::Value>>;

    /// Merges the fiber's fiber-local values into `parent`.
    fn inherit_all(&self, parent: &mut FiberRefs);

    /// Maps the success value.
    fn map<B, F>(self, f: F) -> Mapped<Self, F>
    where
        Self: Sized,
        F: Fn(Self::Value) -> B + Send + Sync,
        B: Send + Sync + 'static,
    {
        Mapped::new(self, f)
    }

    /// Maps the success value with a function that may itself fail.
    fn map_effect<B, F>(self, f: F) -> MapEffect<Self, F>
    where
        Self: Sized,
        F: Fn(Self::Value) -> Exit<Self::Error, B> + Send + Sync,
        B: Send + Sync + 'static,
    {
        MapEffect::new(self, f)
    }

    /// Falls back to `that` if this fiber fails.
    fn or_else<T>(self, that: T) -> OrElse<Self, T>
    where
        Self: Sized,
        T: Fiber<Error = Self::Error, Value = Self::Value>,
    {
        OrElse::new(self, that)
    }

    /// Like [`or_else`](Self::or_else), tagging which fiber produced the
    /// value.
    #[allow(clippy::type_complexity)]
    fn or_else_either<T>(
        self,
        that: T,
    ) -> OrElse<
        Mapped<Self, fn(Self::Value) -> Either<Self::Value, T::Value>>,
        Mapped<T, fn(T::Value) -> Either<Self::Value, T::Value>>,
    >
    where
        Self: Sized,
        T: Fiber<Error = Self::Error>,
    {
        let left: fn(Self::Value) -> Either<Self::Value, T::Value> = Either::Left;
        let right: fn(T::Value) -> Either<Self::Value, T::Value> = Either::Right;
        OrElse::new(self.map(left), that.map(right))
    }

    /// Runs alongside `that`, combining both values with `f`. Failures are
    /// combined in parallel.
    fn zip_with<T, C, F>(self, that: T, f: F) -> ZipWith<Self, T, F>
    where
        Self: Sized,
        T: Fiber<Error = Self::Error>,
        F: Fn(Self::Value, T::Value) -> C + Send + Sync,
        C: Send + Sync + 'static,
    {
        ZipWith::new(self, that, f)
    }

    /// [`zip_with`](Self::zip_with) into a tuple.
    #[allow(clippy::type_complexity)]
    fn zip<T>(self, that: T) -> ZipWith<Self, T, fn(Self::Value, T::Value) -> (Self::Value, T::Value)>
    where
        Self: Sized,
        T: Fiber<Error = Self::Error>,
    {
        let pair: fn(Self::Value, T::Value) -> (Self::Value, T::Value) = |a, b| (a, b);
        ZipWith::new(self, that, pair)
    }
}
