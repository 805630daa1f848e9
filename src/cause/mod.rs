//! The failure algebra.
//!
//! A [`Cause`] records every way a computation failed: expected typed errors
//! (`Fail`), unexpected defects (`Die`), interruptions (`Interrupt`), and how
//! those happened relative to each other (`Sequential`, `Parallel`).
//!
//! Causes are immutable and share their subtrees, so cloning is cheap and
//! every fold below walks the tree with an explicit stack. Very deep causes,
//! such as the accumulated finalizer failures of a long-running fiber, never
//! recurse on the native stack, including when they are dropped.
//!
//! Equality is algebraic rather than structural: `Empty` is the identity of
//! both combinators, `Parallel` is associative and commutative, `Sequential`
//! is associative and distributes over `Parallel`. See [`Cause::flatten`].

mod defect;
mod equality;
mod exception;
mod reduce;
mod render;

use core::fmt;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::types::FiberId;

pub use defect::{AsRenderable, Defect, SpanAnnotation};
pub use equality::{CauseLeaf, Flattened};
pub use exception::{
    Exception, IllegalArgumentException, InterruptedException, InvalidPubSubCapacityException,
    NoSuchElementException, RuntimeException, is_illegal_argument_exception,
    is_interrupted_exception, is_invalid_pub_sub_capacity_exception,
    is_no_such_element_exception, is_runtime_exception,
};
pub use reduce::{CauseReducer, Nodes};
pub use render::{PrettyError, RenderOptions};

/// A lossless description of why a computation failed.
#[derive(Clone)]
pub enum Cause<E> {
    /// No failure. The identity of both combinators.
    Empty,
    /// An expected, typed failure.
    Fail(E),
    /// An unexpected defect.
    Die(Defect),
    /// Interruption by the given fiber(s).
    Interrupt(FiberId),
    /// `left` happened, then `right` happened (e.g. a finalizer failed after
    /// the main body had failed).
    Sequential(Arc<Cause<E>>, Arc<Cause<E>>),
    /// `left` and `right` happened concurrently.
    Parallel(Arc<Cause<E>>, Arc<Cause<E>>),
}

impl<E> Cause<E> {
    /// The cause with no failures.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Empty
    }

    /// An expected failure.
    #[must_use]
    pub const fn fail(error: E) -> Self {
        Self::Fail(error)
    }

    /// A defect.
    #[must_use]
    pub fn die(defect: impl Into<Defect>) -> Self {
        Self::Die(defect.into())
    }

    /// An interruption by `fiber_id`.
    #[must_use]
    pub const fn interrupt(fiber_id: FiberId) -> Self {
        Self::Interrupt(fiber_id)
    }

    /// `left` followed by `right`. Returns the other side unchanged if either
    /// side is `Empty`.
    #[must_use]
    pub fn sequential(left: Self, right: Self) -> Self {
        if left.is_empty_node() {
            return right;
        }
        if right.is_empty_node() {
            return left;
        }
        Self::Sequential(Arc::new(left), Arc::new(right))
    }

    /// `left` alongside `right`. Returns the other side unchanged if either
    /// side is `Empty`.
    #[must_use]
    pub fn parallel(left: Self, right: Self) -> Self {
        if left.is_empty_node() {
            return right;
        }
        if right.is_empty_node() {
            return left;
        }
        Self::Parallel(Arc::new(left), Arc::new(right))
    }

    /// True only for the `Empty` node itself. Use [`is_empty`](Self::is_empty)
    /// for the algebraic check.
    #[must_use]
    pub const fn is_empty_node(&self) -> bool {
        matches!(self, Self::Empty)
    }

    const fn is_composite(&self) -> bool {
        matches!(self, Self::Sequential(..) | Self::Parallel(..))
    }

    // ---------------------------------------------------------------------
    // Derived checks
    // ---------------------------------------------------------------------

    /// Number of `Fail`, `Die` and `Interrupt` leaves.
    #[must_use]
    pub fn size(&self) -> usize {
        self.iter().filter(|node| node.is_leaf()).count()
    }

    /// True when the cause holds no leaves at all, however it is nested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.find(|node| node.is_leaf().then_some(())).is_none()
    }

    /// True if any `Fail` leaf is present.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.failure_option().is_some()
    }

    /// True if any `Die` leaf is present.
    #[must_use]
    pub fn is_die(&self) -> bool {
        self.die_option().is_some()
    }

    /// True if any `Interrupt` leaf is present.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupt_option().is_some()
    }

    /// True if every leaf is an `Interrupt`. `Empty` counts as interrupted
    /// only.
    #[must_use]
    pub fn is_interrupted_only(&self) -> bool {
        self.find(|node| matches!(node, Self::Fail(_) | Self::Die(_)).then_some(()))
            .is_none()
    }

    const fn is_leaf(&self) -> bool {
        matches!(self, Self::Fail(_) | Self::Die(_) | Self::Interrupt(_))
    }

    // ---------------------------------------------------------------------
    // Collectors
    // ---------------------------------------------------------------------

    /// All expected errors, in left-to-right order.
    #[must_use]
    pub fn failures(&self) -> Vec<&E> {
        self.iter()
            .filter_map(|node| match node {
                Self::Fail(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    /// All defects, in left-to-right order.
    #[must_use]
    pub fn defects(&self) -> Vec<&Defect> {
        self.iter()
            .filter_map(|node| match node {
                Self::Die(defect) => Some(defect),
                _ => None,
            })
            .collect()
    }

    /// All interruptors, in left-to-right order.
    #[must_use]
    pub fn interruptors(&self) -> Vec<&FiberId> {
        self.iter()
            .filter_map(|node| match node {
                Self::Interrupt(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Numeric ids of every runtime fiber that interrupted, deduplicated.
    #[must_use]
    pub fn interruptor_ids(&self) -> BTreeSet<u64> {
        self.interruptors()
            .into_iter()
            .flat_map(FiberId::ids)
            .collect()
    }

    /// The leftmost expected error.
    #[must_use]
    pub fn failure_option(&self) -> Option<&E> {
        self.find(|node| match node {
            Self::Fail(error) => Some(error),
            _ => None,
        })
    }

    /// The leftmost defect.
    #[must_use]
    pub fn die_option(&self) -> Option<&Defect> {
        self.find(|node| match node {
            Self::Die(defect) => Some(defect),
            _ => None,
        })
    }

    /// The leftmost interruptor.
    #[must_use]
    pub fn interrupt_option(&self) -> Option<&FiberId> {
        self.find(|node| match node {
            Self::Interrupt(id) => Some(id),
            _ => None,
        })
    }

    /// The leftmost expected error, or the rest of the cause when there is
    /// none. The returned cause cannot contain `Fail` leaves.
    pub fn failure_or_cause(&self) -> Result<&E, Cause<Infallible>> {
        match self.failure_option() {
            Some(error) => Ok(error),
            None => Err(self.strip_failures()),
        }
    }

    /// Whether `that` occurs as a sub-cause of `self`, compared algebraically.
    /// `Empty` is contained in everything.
    #[must_use]
    pub fn contains(&self, that: &Self) -> bool
    where
        E: Eq + std::hash::Hash,
    {
        if that.is_empty_node() {
            return true;
        }
        self.iter().any(|node| node == that)
    }

    // ---------------------------------------------------------------------
    // Transformations
    // ---------------------------------------------------------------------

    /// Maps every expected error.
    #[must_use]
    pub fn map<E2>(&self, mut f: impl FnMut(&E) -> E2) -> Cause<E2> {
        self.flat_map(|error| Cause::Fail(f(error)))
    }

    /// Replaces every expected error by a cause.
    #[must_use]
    pub fn flat_map<E2>(&self, mut f: impl FnMut(&E) -> Cause<E2>) -> Cause<E2> {
        self.match_cause(
            || Cause::Empty,
            |error| f(error),
            |defect| Cause::Die(defect.clone()),
            |id| Cause::Interrupt(id.clone()),
            Cause::sequential,
            Cause::parallel,
        )
    }

    /// Drops every expected error, keeping defects and interruptions.
    #[must_use]
    pub fn strip_failures<E2>(&self) -> Cause<E2> {
        self.match_cause(
            || Cause::Empty,
            |_| Cause::Empty,
            |defect| Cause::Die(defect.clone()),
            |id| Cause::Interrupt(id.clone()),
            Cause::sequential,
            Cause::parallel,
        )
    }

    /// Keeps only the defects, or `None` if there are none.
    #[must_use]
    pub fn keep_defects(&self) -> Option<Self> {
        fn either<E>(
            left: Option<Cause<E>>,
            right: Option<Cause<E>>,
            combine: fn(Cause<E>, Cause<E>) -> Cause<E>,
        ) -> Option<Cause<E>> {
            match (left, right) {
                (Some(left), Some(right)) => Some(combine(left, right)),
                (left, right) => left.or(right),
            }
        }

        self.match_cause(
            || None,
            |_| None,
            |defect| Some(Self::Die(defect.clone())),
            |_| None,
            |left, right| either(left, right, Self::sequential),
            |left, right| either(left, right, Self::parallel),
        )
    }

    /// Rebuilds the cause bottom-up, dropping composite halves that fail
    /// `predicate`. Leaves are always kept.
    #[must_use]
    pub fn filter(&self, predicate: impl FnMut(&Self) -> bool) -> Self
    where
        E: Clone,
    {
        struct Filter<P>(P);

        impl<P> Filter<P> {
            fn keep<E>(
                &mut self,
                left: Cause<E>,
                right: Cause<E>,
                combine: fn(Cause<E>, Cause<E>) -> Cause<E>,
            ) -> Cause<E>
            where
                P: FnMut(&Cause<E>) -> bool,
            {
                match ((self.0)(&left), (self.0)(&right)) {
                    (true, true) => combine(left, right),
                    (true, false) => left,
                    (false, true) => right,
                    (false, false) => Cause::Empty,
                }
            }
        }

        impl<E: Clone, P: FnMut(&Cause<E>) -> bool> CauseReducer<(), E, Cause<E>> for Filter<P> {
            fn empty_case(&mut self, (): &()) -> Cause<E> {
                Cause::Empty
            }

            fn fail_case(&mut self, (): &(), error: &E) -> Cause<E> {
                Cause::Fail(error.clone())
            }

            fn die_case(&mut self, (): &(), defect: &Defect) -> Cause<E> {
                Cause::Die(defect.clone())
            }

            fn interrupt_case(&mut self, (): &(), fiber_id: &FiberId) -> Cause<E> {
                Cause::Interrupt(fiber_id.clone())
            }

            fn sequential_case(&mut self, (): &(), left: Cause<E>, right: Cause<E>) -> Cause<E> {
                self.keep(left, right, Cause::sequential)
            }

            fn parallel_case(&mut self, (): &(), left: Cause<E>, right: Cause<E>) -> Cause<E> {
                self.keep(left, right, Cause::parallel)
            }
        }

        self.reduce_with_context(&(), &mut Filter(predicate))
    }

    /// Splits the cause into its parallel strands, each a purely sequential
    /// chain of leaves.
    #[must_use]
    pub fn linearize(&self) -> Vec<Self>
    where
        E: Clone + Eq + std::hash::Hash,
    {
        let strands = self.match_cause(
            || SmallVec::<[Self; 2]>::new(),
            |error| smallvec::smallvec![Self::Fail(error.clone())],
            |defect| smallvec::smallvec![Self::Die(defect.clone())],
            |id| smallvec::smallvec![Self::Interrupt(id.clone())],
            |left, right| {
                if left.is_empty() {
                    return right;
                }
                if right.is_empty() {
                    return left;
                }
                let mut out = SmallVec::new();
                for l in &left {
                    for r in &right {
                        out.push(Self::sequential(l.clone(), r.clone()));
                    }
                }
                out
            },
            |mut left, right| {
                left.extend(right);
                left
            },
        );
        let mut unique: Vec<Self> = Vec::with_capacity(strands.len());
        for strand in strands {
            if !unique.contains(&strand) {
                unique.push(strand);
            }
        }
        unique
    }

    // ---------------------------------------------------------------------
    // Squashing
    // ---------------------------------------------------------------------

    /// Collapses the cause to a single defect: the leftmost expected error
    /// converted by `f`, else the first defect, else an
    /// [`InterruptedException`] naming every interruptor.
    #[must_use]
    pub fn squash_with(&self, f: impl FnOnce(&E) -> Defect) -> Defect {
        if let Some(error) = self.failure_option() {
            return f(error);
        }
        if let Some(defect) = self.defects().first() {
            return (*defect).clone();
        }
        let ids = self
            .interruptor_ids()
            .iter()
            .map(|id| format!("#{id}"))
            .collect::<Vec<_>>()
            .join(", ");
        Defect::from(InterruptedException::new(format!(
            "Interrupted by fibers: {ids}"
        )))
    }

    /// [`squash_with`](Self::squash_with) for causes whose errors already
    /// convert into defects.
    #[must_use]
    pub fn squash(&self) -> Defect
    where
        E: Clone + Into<Defect>,
    {
        self.squash_with(|error| error.clone().into())
    }
}

impl<E> Default for Cause<E> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<E> From<Defect> for Cause<E> {
    fn from(defect: Defect) -> Self {
        Self::Die(defect)
    }
}

impl<E> Drop for Cause<E> {
    fn drop(&mut self) {
        let (Self::Sequential(left, right) | Self::Parallel(left, right)) = self else {
            return;
        };
        if !left.is_composite() && !right.is_composite() {
            return;
        }
        // Detach uniquely owned subtrees onto a heap stack so dropping a deep
        // chain never recurses. Detached nodes are left with `Empty` children.
        let placeholder: Arc<Self> = Arc::new(Self::Empty);
        let mut pending = vec![
            std::mem::replace(left, Arc::clone(&placeholder)),
            std::mem::replace(right, Arc::clone(&placeholder)),
        ];
        while let Some(node) = pending.pop() {
            let Some(mut node) = Arc::into_inner(node) else {
                continue;
            };
            if let Self::Sequential(left, right) | Self::Parallel(left, right) = &mut node {
                pending.push(std::mem::replace(left, Arc::clone(&placeholder)));
                pending.push(std::mem::replace(right, Arc::clone(&placeholder)));
            }
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for Cause<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Token<'a, E> {
            Node(&'a Cause<E>),
            Text(&'static str),
        }

        let mut stack = vec![Token::Node(self)];
        while let Some(token) = stack.pop() {
            let node = match token {
                Token::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Token::Node(node) => node,
            };
            match node {
                Self::Empty => f.write_str("Empty")?,
                Self::Fail(error) => write!(f, "Fail({error:?})")?,
                Self::Die(defect) => write!(f, "Die({defect:?})")?,
                Self::Interrupt(id) => write!(f, "Interrupt({id:?})")?,
                Self::Sequential(left, right) | Self::Parallel(left, right) => {
                    f.write_str(if matches!(node, Self::Sequential(..)) {
                        "Sequential("
                    } else {
                        "Parallel("
                    })?;
                    stack.push(Token::Text(")"));
                    stack.push(Token::Node(right));
                    stack.push(Token::Text(", "));
                    stack.push(Token::Node(left));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn init_test(test_name: &str) {
        init_test_logging();
        crate::test_phase!(test_name);
    }

    fn fid(id: u64) -> FiberId {
        FiberId::runtime(id, 0)
    }

    fn deep_sequential(depth: usize) -> Cause<u32> {
        let mut cause = Cause::fail(0);
        for _ in 1..depth {
            cause = Cause::sequential(cause, Cause::fail(1));
        }
        cause
    }

    #[test]
    fn constructors_annihilate_empty() {
        init_test("constructors_annihilate_empty");
        let fail: Cause<&str> = Cause::fail("x");
        assert!(matches!(
            Cause::sequential(Cause::empty(), fail.clone()),
            Cause::Fail("x")
        ));
        assert!(matches!(
            Cause::parallel(fail.clone(), Cause::empty()),
            Cause::Fail("x")
        ));
        assert!(matches!(
            Cause::<&str>::sequential(Cause::empty(), Cause::empty()),
            Cause::Empty
        ));
        crate::test_complete!("constructors_annihilate_empty");
    }

    #[test]
    fn size_counts_leaves_only() {
        init_test("size_counts_leaves_only");
        let cause = Cause::parallel(
            Cause::sequential(Cause::fail("a"), Cause::die("boom")),
            Cause::interrupt(fid(1)),
        );
        assert_eq!(cause.size(), 3);
        assert_eq!(Cause::<&str>::empty().size(), 0);
        crate::test_complete!("size_counts_leaves_only");
    }

    #[test]
    fn is_empty_sees_through_nesting() {
        init_test("is_empty_sees_through_nesting");
        let nested: Cause<&str> = Cause::Sequential(
            Arc::new(Cause::Parallel(
                Arc::new(Cause::Empty),
                Arc::new(Cause::Empty),
            )),
            Arc::new(Cause::Empty),
        );
        assert!(nested.is_empty());
        assert!(!nested.is_empty_node());
        assert!(!Cause::<&str>::fail("x").is_empty());
        crate::test_complete!("is_empty_sees_through_nesting");
    }

    #[test]
    fn predicates() {
        init_test("predicates");
        let cause = Cause::parallel(Cause::fail("a"), Cause::interrupt(fid(2)));
        assert!(cause.is_failure());
        assert!(cause.is_interrupted());
        assert!(!cause.is_die());
        assert!(!cause.is_interrupted_only());

        let interrupted: Cause<&str> =
            Cause::sequential(Cause::interrupt(fid(1)), Cause::interrupt(fid(2)));
        assert!(interrupted.is_interrupted_only());
        assert!(Cause::<&str>::empty().is_interrupted_only());
        assert!(!Cause::<&str>::die("d").is_interrupted_only());
        crate::test_complete!("predicates");
    }

    #[test]
    fn collectors_preserve_document_order() {
        init_test("collectors_preserve_document_order");
        let cause = Cause::sequential(
            Cause::parallel(Cause::fail(1), Cause::die("first")),
            Cause::parallel(Cause::fail(2), Cause::die("second")),
        );
        assert_eq!(cause.failures(), vec![&1, &2]);
        let defects: Vec<_> = cause.defects().iter().map(|d| d.as_text()).collect();
        assert_eq!(defects, vec![Some("first"), Some("second")]);
        assert_eq!(cause.failure_option(), Some(&1));
        assert_eq!(cause.die_option().and_then(Defect::as_text), Some("first"));
        crate::test_complete!("collectors_preserve_document_order");
    }

    #[test]
    fn interruptor_ids_are_deduplicated() {
        init_test("interruptor_ids_are_deduplicated");
        let cause: Cause<()> = Cause::parallel(
            Cause::interrupt(fid(5)),
            Cause::sequential(
                Cause::interrupt(fid(3)),
                Cause::interrupt(fid(5).combine(&fid(7))),
            ),
        );
        assert_eq!(cause.interruptors().len(), 3);
        assert_eq!(
            cause.interruptor_ids().into_iter().collect::<Vec<_>>(),
            vec![3, 5, 7]
        );
        crate::test_complete!("interruptor_ids_are_deduplicated");
    }

    #[test]
    fn failure_or_cause_strips_failures() {
        init_test("failure_or_cause_strips_failures");
        let failing = Cause::sequential(Cause::die("d"), Cause::fail("e"));
        assert_eq!(failing.failure_or_cause(), Ok(&"e"));

        let dying: Cause<&str> = Cause::parallel(Cause::die("d"), Cause::interrupt(fid(1)));
        let rest = dying.failure_or_cause().expect_err("no failures");
        assert_eq!(rest.size(), 2);
        assert!(rest.is_die());
        crate::test_complete!("failure_or_cause_strips_failures");
    }

    #[test]
    fn map_and_flat_map_replace_failures() {
        init_test("map_and_flat_map_replace_failures");
        let cause = Cause::sequential(Cause::fail(2), Cause::die("d"));
        let mapped = cause.map(|n| n * 10);
        assert_eq!(mapped.failures(), vec![&20]);
        assert!(mapped.is_die());

        let expanded = cause.flat_map(|n| Cause::parallel(Cause::fail(*n), Cause::fail(n + 1)));
        assert_eq!(expanded.failures(), vec![&2, &3]);

        let gone: Cause<u8> = cause.flat_map(|_| Cause::empty());
        assert_eq!(gone.size(), 1);
        crate::test_complete!("map_and_flat_map_replace_failures");
    }

    #[test]
    fn keep_defects() {
        init_test("keep_defects");
        let cause = Cause::parallel(
            Cause::sequential(Cause::fail("e"), Cause::die("a")),
            Cause::sequential(Cause::interrupt(fid(1)), Cause::die("b")),
        );
        let kept = cause.keep_defects().expect("has defects");
        assert_eq!(kept.size(), 2);
        assert!(!kept.is_failure());
        assert!(!kept.is_interrupted());
        assert!(Cause::<&str>::fail("e").keep_defects().is_none());
        crate::test_complete!("keep_defects");
    }

    #[test]
    fn filter_drops_rejected_halves() {
        init_test("filter_drops_rejected_halves");
        let cause = Cause::parallel(Cause::fail("keep"), Cause::interrupt(fid(1)));
        let filtered = cause.filter(|c| !c.is_interrupted());
        assert_eq!(filtered, Cause::fail("keep"));
        crate::test_complete!("filter_drops_rejected_halves");
    }

    #[test]
    fn linearize_distributes_sequential_over_parallel() {
        init_test("linearize_distributes_sequential_over_parallel");
        let cause = Cause::sequential(
            Cause::parallel(Cause::fail("a"), Cause::fail("b")),
            Cause::fail("c"),
        );
        let strands = cause.linearize();
        assert_eq!(strands.len(), 2);
        assert!(strands.contains(&Cause::sequential(Cause::fail("a"), Cause::fail("c"))));
        assert!(strands.contains(&Cause::sequential(Cause::fail("b"), Cause::fail("c"))));
        crate::test_complete!("linearize_distributes_sequential_over_parallel");
    }

    #[test]
    fn contains_finds_sub_causes() {
        init_test("contains_finds_sub_causes");
        let inner = Cause::parallel(Cause::fail("a"), Cause::fail("b"));
        let cause = Cause::sequential(inner.clone(), Cause::die("d"));
        assert!(cause.contains(&inner));
        assert!(cause.contains(&Cause::parallel(Cause::fail("b"), Cause::fail("a"))));
        assert!(cause.contains(&Cause::empty()));
        assert!(!cause.contains(&Cause::fail("z")));
        crate::test_complete!("contains_finds_sub_causes");
    }

    #[test]
    fn squash_prefers_failures_then_defects_then_interrupts() {
        init_test("squash_prefers_failures_then_defects_then_interrupts");
        let failing = Cause::parallel(Cause::die("d"), Cause::fail("boom"));
        assert_eq!(failing.squash_with(|e| Defect::from(*e)).as_text(), Some("boom"));

        let dying: Cause<&str> = Cause::sequential(Cause::interrupt(fid(1)), Cause::die("d"));
        assert_eq!(dying.squash_with(|e| Defect::from(*e)).as_text(), Some("d"));

        let interrupted: Cause<&str> =
            Cause::parallel(Cause::interrupt(fid(2)), Cause::interrupt(fid(1)));
        let defect = interrupted.squash_with(|e| Defect::from(*e));
        assert!(is_interrupted_exception(&defect));
        assert_eq!(
            defect
                .downcast_ref::<InterruptedException>()
                .map(InterruptedException::message),
            Some("Interrupted by fibers: #1, #2")
        );

        let empty = Cause::<&str>::empty().squash_with(|e| Defect::from(*e));
        assert!(is_interrupted_exception(&empty));
        crate::test_complete!("squash_prefers_failures_then_defects_then_interrupts");
    }

    #[test]
    fn squash_converts_errors() {
        let cause: Cause<&'static str> = Cause::fail("typed");
        assert_eq!(cause.squash().as_text(), Some("typed"));
    }

    #[test]
    fn debug_output_is_structural() {
        init_test("debug_output_is_structural");
        let cause = Cause::sequential(Cause::fail(1), Cause::interrupt(fid(4)));
        assert_eq!(
            format!("{cause:?}"),
            "Sequential(Fail(1), Interrupt(FiberId(#4@0)))"
        );
        crate::test_complete!("debug_output_is_structural");
    }

    #[test]
    fn deep_causes_drop_and_fold_without_overflow() {
        init_test("deep_causes_drop_and_fold_without_overflow");
        let cause = deep_sequential(100_000);
        assert_eq!(cause.size(), 100_000);
        let rendered = format!("{cause:?}");
        assert!(rendered.starts_with("Sequential(Sequential("));
        let shared = cause.clone();
        drop(cause);
        assert_eq!(shared.failures().len(), 100_000);
        drop(shared);
        crate::test_complete!("deep_causes_drop_and_fold_without_overflow");
    }

    #[test]
    fn deep_right_nested_parallel_drops() {
        let mut cause: Cause<u32> = Cause::fail(0);
        for n in 1..100_000 {
            cause = Cause::parallel(Cause::fail(n), cause);
        }
        assert!(cause.is_failure());
        drop(cause);
    }
}
