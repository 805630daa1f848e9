//! The fiber handle owned by a scheduler.
//!
//! A [`RuntimeFiber`] is the shared state of one running fiber: its id, the
//! interrupt requests it has received, the fibers it forked, its fiber-local
//! values, and eventually its [`Exit`]. The scheduler that runs the fiber
//! drives it through [`complete`](RuntimeFiber::complete) and polls
//! [`interrupt_requested`](RuntimeFiber::interrupt_requested) at its yield
//! points; everything else observes it through the [`Fiber`] trait.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::{Fiber, FiberHandle, FiberRefs};
use crate::tracing_compat::{debug, trace};
use crate::types::{Exit, FiberId};

enum State<E, A> {
    Running {
        interruptors: FiberId,
        waiters: SmallVec<[Waker; 2]>,
    },
    Done(Exit<E, A>),
}

/// Registry of live child fibers.
#[derive(Default)]
struct Children {
    live: Mutex<Vec<Arc<dyn FiberHandle>>>,
}

impl Children {
    fn remove(&self, id: &FiberId) {
        self.live.lock().retain(|child| child.id() != *id);
    }
}

struct Shared<E, A> {
    id: FiberId,
    state: Mutex<State<E, A>>,
    children: Arc<Children>,
    parent: Option<Weak<Children>>,
    fiber_refs: Mutex<FiberRefs>,
}

/// A fiber whose lifecycle is driven by a scheduler.
///
/// Cloning yields another handle to the same fiber.
pub struct RuntimeFiber<E, A> {
    shared: Arc<Shared<E, A>>,
}

impl<E, A> Clone for RuntimeFiber<E, A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E, A> RuntimeFiber<E, A>
where
    E: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    /// A root fiber with a fresh id, starting from `fiber_refs`.
    #[must_use]
    pub fn new(fiber_refs: &FiberRefs) -> Self {
        Self::with_id(FiberId::unsafe_make(), fiber_refs, None)
    }

    /// A child of `parent` with a fresh id. The child inherits a copy of the
    /// parent's fiber-local values and is tracked in
    /// [`children`](FiberHandle::children) until it completes.
    #[must_use]
    pub fn fork_from<E2, A2>(parent: &RuntimeFiber<E2, A2>) -> Self
    where
        E2: Clone + Send + Sync + 'static,
        A2: Clone + Send + Sync + 'static,
    {
        let parent_refs = parent.fiber_refs();
        let child = Self::with_id(
            FiberId::unsafe_make(),
            &parent_refs,
            Some(Arc::downgrade(&parent.shared.children)),
        );
        parent.add_child(Arc::new(child.clone()));
        trace!(fiber_id = %child.shared.id, parent = %parent.shared.id, "fiber forked");
        child
    }

    fn with_id(id: FiberId, fiber_refs: &FiberRefs, parent: Option<Weak<Children>>) -> Self {
        trace!(fiber_id = %id, "fiber created");
        Self {
            shared: Arc::new(Shared {
                fiber_refs: Mutex::new(fiber_refs.fork_as(&id)),
                id,
                state: Mutex::new(State::Running {
                    interruptors: FiberId::None,
                    waiters: SmallVec::new(),
                }),
                children: Arc::new(Children::default()),
                parent,
            }),
        }
    }

    /// Tracks `child` as a live child of this fiber.
    pub fn add_child(&self, child: Arc<dyn FiberHandle>) {
        self.shared.children.live.lock().push(child);
    }

    /// Stops tracking the child with id `child`.
    pub fn remove_child(&self, child: &FiberId) {
        self.shared.children.remove(child);
    }

    /// Records the fiber's exit. The first completion wins; later calls
    /// return `false` and change nothing.
    pub fn complete(&self, exit: Exit<E, A>) -> bool {
        let waiters = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                State::Done(_) => return false,
                State::Running { waiters, .. } => {
                    let waiters = std::mem::take(waiters);
                    *state = State::Done(exit);
                    waiters
                }
            }
        };
        debug!(
            fiber_id = %self.shared.id,
            waiters = waiters.len(),
            "fiber completed"
        );
        for waker in waiters {
            waker.wake();
        }
        if let Some(parent) = self.shared.parent.as_ref().and_then(Weak::upgrade) {
            parent.remove(&self.shared.id);
        }
        true
    }

    /// Completes the fiber as interrupted if an interrupt was requested.
    /// Returns whether it did.
    pub fn honor_interrupt(&self) -> bool {
        match self.interrupt_requested() {
            Some(by) => self.complete(Exit::interrupt(by)),
            None => false,
        }
    }

    /// The combined id of every fiber that asked this one to stop, while it
    /// is still running.
    #[must_use]
    pub fn interrupt_requested(&self) -> Option<FiberId> {
        match &*self.shared.state.lock() {
            State::Running { interruptors, .. } if !interruptors.is_none() => {
                Some(interruptors.clone())
            }
            _ => None,
        }
    }

    /// Snapshot of the fiber-local values.
    #[must_use]
    pub fn fiber_refs(&self) -> FiberRefs {
        self.shared.fiber_refs.lock().clone()
    }

    /// Replaces the fiber-local values.
    pub fn set_fiber_refs(&self, fiber_refs: FiberRefs) {
        *self.shared.fiber_refs.lock() = fiber_refs;
    }

    /// Applies `f` to the fiber-local values in place.
    pub fn update_fiber_refs(&self, f: impl FnOnce(&mut FiberRefs)) {
        f(&mut self.shared.fiber_refs.lock());
    }

    /// Future resolving to the exit once the fiber completes.
    #[must_use]
    pub fn exit_future(&self) -> AwaitExit<E, A> {
        AwaitExit {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E, A> FiberHandle for RuntimeFiber<E, A>
where
    E: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    fn id(&self) -> FiberId {
        self.shared.id.clone()
    }

    fn is_done(&self) -> bool {
        matches!(&*self.shared.state.lock(), State::Done(_))
    }

    fn interrupt_as_fork(&self, fiber_id: FiberId) {
        let mut state = self.shared.state.lock();
        if let State::Running { interruptors, .. } = &mut *state {
            *interruptors = interruptors.combine(&fiber_id);
            debug!(
                fiber_id = %self.shared.id,
                interruptor = %fiber_id,
                "interrupt requested"
            );
        }
    }

    fn children(&self) -> Vec<Arc<dyn FiberHandle>> {
        self.shared.children.live.lock().clone()
    }
}

impl<E, A> Fiber for RuntimeFiber<E, A>
where
    E: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    type Error = E;
    type Value = A;

    fn await_exit(&self) -> impl Future<Output = Exit<E, A>> + Send + '_ {
        self.exit_future()
    }

    fn poll_exit(&self) -> Option<Exit<E, A>> {
        match &*self.shared.state.lock() {
            State::Done(exit) => Some(exit.clone()),
            State::Running { .. } => None,
        }
    }

    fn inherit_all(&self, parent: &mut FiberRefs) {
        parent.join_as(&self.shared.fiber_refs.lock());
    }
}

impl<E, A> std::fmt::Debug for RuntimeFiber<E, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let done = matches!(&*self.shared.state.lock(), State::Done(_));
        f.debug_struct("RuntimeFiber")
            .field("id", &self.shared.id)
            .field("done", &done)
            .finish_non_exhaustive()
    }
}

/// Future returned by [`RuntimeFiber::exit_future`].
///
/// Dropping it before completion only forgets the registered waker.
pub struct AwaitExit<E, A> {
    shared: Arc<Shared<E, A>>,
}

impl<E: Clone, A: Clone> Future for AwaitExit<E, A> {
    type Output = Exit<E, A>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        match &mut *state {
            State::Done(exit) => Poll::Ready(exit.clone()),
            State::Running { waiters, .. } => {
                if !waiters.iter().any(|w| w.will_wake(cx.waker())) {
                    waiters.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cause::Cause;
    use crate::test_utils::{block_on, init_test_logging};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Wake;

    #[derive(Default)]
    struct WakeCounter {
        wakes: AtomicUsize,
    }

    impl Wake for WakeCounter {
        fn wake(self: Arc<Self>) {
            self.wakes.fetch_add(1, Ordering::Relaxed);
        }

        fn wake_by_ref(self: &Arc<Self>) {
            self.wakes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn init_test(test_name: &str) {
        init_test_logging();
        crate::test_phase!(test_name);
    }

    fn root() -> RuntimeFiber<&'static str, u32> {
        RuntimeFiber::new(&FiberRefs::empty())
    }

    #[test]
    fn await_exit_pends_until_completed_then_wakes_once() {
        init_test("await_exit_pends_until_completed_then_wakes_once");
        let fiber = root();
        let counter = Arc::new(WakeCounter::default());
        let waker = Waker::from(Arc::clone(&counter));
        let mut cx = Context::from_waker(&waker);
        let mut fut = Box::pin(fiber.exit_future());

        assert!(fut.as_mut().poll(&mut cx).is_pending());
        assert!(fut.as_mut().poll(&mut cx).is_pending());
        assert!(fiber.complete(Exit::succeed(7)));
        assert_eq!(counter.wakes.load(Ordering::Relaxed), 1);
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(exit) => crate::assert_exit_success!(exit, 7),
            Poll::Pending => unreachable!("completed fiber must be ready"),
        }
        crate::test_complete!("await_exit_pends_until_completed_then_wakes_once");
    }

    #[test]
    fn first_completion_wins() {
        init_test("first_completion_wins");
        let fiber = root();
        assert!(fiber.complete(Exit::succeed(1)));
        assert!(!fiber.complete(Exit::fail("late")));
        assert!(fiber.is_done());
        crate::assert_exit_success!(fiber.poll_exit().expect("done"), 1);
        crate::test_complete!("first_completion_wins");
    }

    #[test]
    fn interrupts_accumulate_until_honored() {
        init_test("interrupts_accumulate_until_honored");
        let fiber = root();
        assert!(fiber.interrupt_requested().is_none());
        fiber.interrupt_as_fork(FiberId::runtime(100, 0));
        fiber.interrupt_as_fork(FiberId::runtime(101, 0));
        let by = fiber.interrupt_requested().expect("requested");
        assert_eq!(by.ids().into_iter().collect::<Vec<_>>(), vec![100, 101]);
        assert!(!fiber.is_done());

        assert!(fiber.honor_interrupt());
        let exit = block_on(fiber.await_exit());
        crate::assert_exit_interrupted!(exit);
        assert_eq!(
            exit.cause().map(Cause::interruptor_ids).map(|s| s.len()),
            Some(2)
        );
        fiber.interrupt_as_fork(FiberId::runtime(102, 0));
        assert!(fiber.interrupt_requested().is_none());
        crate::test_complete!("interrupts_accumulate_until_honored");
    }

    #[test]
    fn children_are_tracked_until_completion() {
        init_test("children_are_tracked_until_completion");
        let parent = root();
        let child: RuntimeFiber<String, ()> = RuntimeFiber::fork_from(&parent);
        let ids: Vec<_> = parent.children().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![child.id()]);
        child.complete(Exit::succeed(()));
        assert!(parent.children().is_empty());
        crate::test_complete!("children_are_tracked_until_completion");
    }

    #[test]
    fn completion_from_another_thread_wakes_blocked_waiter() {
        init_test("completion_from_another_thread_wakes_blocked_waiter");
        let fiber = root();
        let remote = fiber.clone();
        let worker = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            remote.complete(Exit::succeed(42));
        });
        let exit = block_on(fiber.await_exit());
        worker.join().expect("worker thread");
        crate::assert_exit_success!(exit, 42);
        crate::test_complete!("completion_from_another_thread_wakes_blocked_waiter");
    }

    #[test]
    fn fork_copies_fiber_refs_under_child_id() {
        init_test("fork_copies_fiber_refs_under_child_id");
        let parent = root();
        let child: RuntimeFiber<&str, u32> = RuntimeFiber::fork_from(&parent);
        assert_eq!(child.fiber_refs().owner(), &child.id());
        assert_eq!(parent.fiber_refs().owner(), &parent.id());
        crate::test_complete!("fork_copies_fiber_refs_under_child_id");
    }
}
