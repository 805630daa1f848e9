//! Synthetic fibers.
//!
//! These fibers own no state of their own beyond the fibers and functions
//! they close over. Each operation is defined in terms of the underlying
//! fibers.

use core::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{Fiber, FiberHandle, FiberRefs};
use crate::cause::{Cause, Defect};
use crate::types::{Exit, FiberId};

// -------------------------------------------------------------------------
// Known exits
// -------------------------------------------------------------------------

/// A fiber that has already completed with a known exit.
///
/// It has no identity, no children, no fiber-local values, and ignores
/// interruption.
#[derive(Clone)]
pub struct Done<E, A> {
    exit: Exit<E, A>,
}

impl<E: fmt::Debug, A: fmt::Debug> fmt::Debug for Done<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Done").field(&self.exit).finish()
    }
}

/// A fiber completed with `exit`.
#[must_use]
pub fn done<E, A>(exit: Exit<E, A>) -> Done<E, A> {
    Done { exit }
}

/// A fiber completed with `value`.
#[must_use]
pub fn succeed<E, A>(value: A) -> Done<E, A> {
    done(Exit::Success(value))
}

/// A fiber failed with `error`.
#[must_use]
pub fn fail<E, A>(error: E) -> Done<E, A> {
    done(Exit::fail(error))
}

/// A fiber failed with `cause`.
#[must_use]
pub fn fail_cause<E, A>(cause: Cause<E>) -> Done<E, A> {
    done(Exit::Failure(cause))
}

/// A fiber that died with `defect`.
#[must_use]
pub fn die<E, A>(defect: impl Into<Defect>) -> Done<E, A> {
    done(Exit::die(defect))
}

/// A fiber interrupted by `fiber_id`.
#[must_use]
pub fn interrupted<E, A>(fiber_id: FiberId) -> Done<E, A> {
    done(Exit::interrupt(fiber_id))
}

impl<E, A> FiberHandle for Done<E, A>
where
    E: Send + Sync,
    A: Send + Sync,
{
    fn id(&self) -> FiberId {
        FiberId::None
    }

    fn is_done(&self) -> bool {
        true
    }

    fn interrupt_as_fork(&self, _fiber_id: FiberId) {}

    fn children(&self) -> Vec<Arc<dyn FiberHandle>> {
        Vec::new()
    }
}

impl<E, A> Fiber for Done<E, A>
where
    E: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    type Error = E;
    type Value = A;

    fn await_exit(&self) -> impl Future<Output = Exit<E, A>> + Send + '_ {
        std::future::ready(self.exit.clone())
    }

    fn poll_exit(&self) -> Option<Exit<E, A>> {
        Some(self.exit.clone())
    }

    fn inherit_all(&self, _parent: &mut FiberRefs) {}
}

/// A fiber that never completes.
pub struct Never<E, A> {
    _marker: PhantomData<fn() -> (E, A)>,
}

impl<E, A> fmt::Debug for Never<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Never")
    }
}

/// A fiber that never completes.
#[must_use]
pub fn never<E, A>() -> Never<E, A> {
    Never {
        _marker: PhantomData,
    }
}

impl<E, A> FiberHandle for Never<E, A> {
    fn id(&self) -> FiberId {
        FiberId::None
    }

    fn is_done(&self) -> bool {
        false
    }

    fn interrupt_as_fork(&self, _fiber_id: FiberId) {}

    fn children(&self) -> Vec<Arc<dyn FiberHandle>> {
        Vec::new()
    }
}

impl<E, A> Fiber for Never<E, A>
where
    E: Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    type Error = E;
    type Value = A;

    fn await_exit(&self) -> impl Future<Output = Exit<E, A>> + Send + '_ {
        futures_lite::future::pending()
    }

    fn poll_exit(&self) -> Option<Exit<E, A>> {
        None
    }

    fn inherit_all(&self, _parent: &mut FiberRefs) {}
}

// -------------------------------------------------------------------------
// Single-fiber views
// -------------------------------------------------------------------------

/// See [`Fiber::map`].
pub struct Mapped<F, G> {
    fiber: F,
    f: G,
}

impl<F, G> Mapped<F, G> {
    pub(crate) const fn new(fiber: F, f: G) -> Self {
        Self { fiber, f }
    }
}

impl<F: FiberHandle, G: Send + Sync> FiberHandle for Mapped<F, G> {
    fn id(&self) -> FiberId {
        self.fiber.id()
    }

    fn is_done(&self) -> bool {
        self.fiber.is_done()
    }

    fn interrupt_as_fork(&self, fiber_id: FiberId) {
        self.fiber.interrupt_as_fork(fiber_id);
    }

    fn children(&self) -> Vec<Arc<dyn FiberHandle>> {
        self.fiber.children()
    }
}

impl<F, G, B> Fiber for Mapped<F, G>
where
    F: Fiber,
    G: Fn(F::Value) -> B + Send + Sync,
    B: Send + Sync + 'static,
{
    type Error = F::Error;
    type Value = B;

    fn await_exit(&self) -> impl Future<Output = Exit<F::Error, B>> + Send + '_ {
        async move { self.fiber.await_exit().await.map(&self.f) }
    }

    fn poll_exit(&self) -> Option<Exit<F::Error, B>> {
        self.fiber.poll_exit().map(|exit| exit.map(&self.f))
    }

    fn inherit_all(&self, parent: &mut FiberRefs) {
        self.fiber.inherit_all(parent);
    }
}

/// See [`Fiber::map_effect`].
pub struct MapEffect<F, G> {
    fiber: F,
    f: G,
}

impl<F, G> MapEffect<F, G> {
    pub(crate) const fn new(fiber: F, f: G) -> Self {
        Self { fiber, f }
    }
}

impl<F: FiberHandle, G: Send + Sync> FiberHandle for MapEffect<F, G> {
    fn id(&self) -> FiberId {
        self.fiber.id()
    }

    fn is_done(&self) -> bool {
        self.fiber.is_done()
    }

    fn interrupt_as_fork(&self, fiber_id: FiberId) {
        self.fiber.interrupt_as_fork(fiber_id);
    }

    fn children(&self) -> Vec<Arc<dyn FiberHandle>> {
        self.fiber.children()
    }
}

impl<F, G, B> Fiber for MapEffect<F, G>
where
    F: Fiber,
    G: Fn(F::Value) -> Exit<F::Error, B> + Send + Sync,
    B: Send + Sync + 'static,
{
    type Error = F::Error;
    type Value = B;

    fn await_exit(&self) -> impl Future<Output = Exit<F::Error, B>> + Send + '_ {
        async move { self.fiber.await_exit().await.and_then(&self.f) }
    }

    fn poll_exit(&self) -> Option<Exit<F::Error, B>> {
        self.fiber.poll_exit().map(|exit| exit.and_then(&self.f))
    }

    fn inherit_all(&self, parent: &mut FiberRefs) {
        self.fiber.inherit_all(parent);
    }
}

// -------------------------------------------------------------------------
// Two-fiber views
// -------------------------------------------------------------------------

fn both_children(left: &dyn FiberHandle, right: &dyn FiberHandle) -> Vec<Arc<dyn FiberHandle>> {
    let mut children = left.children();
    children.extend(right.children());
    children
}

/// See [`Fiber::or_else`].
pub struct OrElse<L, R> {
    left: L,
    right: R,
}

impl<L, R> OrElse<L, R> {
    pub(crate) const fn new(left: L, right: R) -> Self {
        Self { left, right }
    }
}

impl<L, R> FiberHandle for OrElse<L, R>
where
    L: Fiber,
    R: Fiber<Error = L::Error, Value = L::Value>,
{
    fn id(&self) -> FiberId {
        self.left.id().get_or_else(&self.right.id())
    }

    fn is_done(&self) -> bool {
        self.poll_exit().is_some()
    }

    fn interrupt_as_fork(&self, fiber_id: FiberId) {
        self.left.interrupt_as_fork(fiber_id.clone());
        self.right.interrupt_as_fork(fiber_id);
    }

    fn children(&self) -> Vec<Arc<dyn FiberHandle>> {
        both_children(&self.left, &self.right)
    }
}

impl<L, R> Fiber for OrElse<L, R>
where
    L: Fiber,
    R: Fiber<Error = L::Error, Value = L::Value>,
{
    type Error = L::Error;
    type Value = L::Value;

    fn await_exit(&self) -> impl Future<Output = Exit<L::Error, L::Value>> + Send + '_ {
        async move {
            let (left, right) =
                futures_lite::future::zip(self.left.await_exit(), self.right.await_exit()).await;
            if left.is_success() { left } else { right }
        }
    }

    fn poll_exit(&self) -> Option<Exit<L::Error, L::Value>> {
        let left = self.left.poll_exit()?;
        if left.is_success() {
            Some(left)
        } else {
            self.right.poll_exit()
        }
    }

    fn inherit_all(&self, parent: &mut FiberRefs) {
        self.right.inherit_all(parent);
        self.left.inherit_all(parent);
    }
}

/// See [`Fiber::zip_with`].
pub struct ZipWith<L, R, G> {
    left: L,
    right: R,
    f: G,
}

impl<L, R, G> ZipWith<L, R, G> {
    pub(crate) const fn new(left: L, right: R, f: G) -> Self {
        Self { left, right, f }
    }
}

impl<L, R, G> FiberHandle for ZipWith<L, R, G>
where
    L: FiberHandle,
    R: FiberHandle,
    G: Send + Sync,
{
    fn id(&self) -> FiberId {
        self.left.id().get_or_else(&self.right.id())
    }

    fn is_done(&self) -> bool {
        self.left.is_done() && self.right.is_done()
    }

    fn interrupt_as_fork(&self, fiber_id: FiberId) {
        self.left.interrupt_as_fork(fiber_id.clone());
        self.right.interrupt_as_fork(fiber_id);
    }

    fn children(&self) -> Vec<Arc<dyn FiberHandle>> {
        both_children(&self.left, &self.right)
    }
}

impl<L, R, G, C> Fiber for ZipWith<L, R, G>
where
    L: Fiber,
    R: Fiber<Error = L::Error>,
    G: Fn(L::Value, R::Value) -> C + Send + Sync,
    C: Send + Sync + 'static,
{
    type Error = L::Error;
    type Value = C;

    fn await_exit(&self) -> impl Future<Output = Exit<L::Error, C>> + Send + '_ {
        async move {
            let (left, right) =
                futures_lite::future::zip(self.left.await_exit(), self.right.await_exit()).await;
            left.zip_with(right, &self.f)
        }
    }

    fn poll_exit(&self) -> Option<Exit<L::Error, C>> {
        let left = self.left.poll_exit()?;
        let right = self.right.poll_exit()?;
        Some(left.zip_with(right, &self.f))
    }

    fn inherit_all(&self, parent: &mut FiberRefs) {
        self.right.inherit_all(parent);
        self.left.inherit_all(parent);
    }
}

// -------------------------------------------------------------------------
// Free functions
// -------------------------------------------------------------------------

/// Waits for `fiber`, merges its fiber-local values into `parent`, and
/// returns its value or the full cause of its failure.
pub async fn join<F: Fiber>(
    fiber: &F,
    parent: &mut FiberRefs,
) -> Result<F::Value, Cause<F::Error>> {
    let exit = fiber.await_exit().await;
    fiber.inherit_all(parent);
    exit.into_result()
}

/// Interrupts `fiber` on behalf of `fiber_id` and waits for it to finish.
///
/// The fiber may still succeed if it completes before it honors the request.
pub async fn interrupt_as<F: Fiber>(fiber: &F, fiber_id: FiberId) -> Exit<F::Error, F::Value> {
    fiber.interrupt_as_fork(fiber_id);
    fiber.await_exit().await
}

/// Waits for every fiber, in order.
pub async fn await_all<F: Fiber>(fibers: &[F]) -> Vec<Exit<F::Error, F::Value>> {
    let mut exits = Vec::with_capacity(fibers.len());
    for fiber in fibers {
        exits.push(fiber.await_exit().await);
    }
    exits
}

/// Requests interruption of every fiber on behalf of `fiber_id`, then waits
/// for all of them.
pub async fn interrupt_all_as<F: Fiber>(
    fibers: &[F],
    fiber_id: FiberId,
) -> Vec<Exit<F::Error, F::Value>> {
    for fiber in fibers {
        fiber.interrupt_as_fork(fiber_id.clone());
    }
    await_all(fibers).await
}
