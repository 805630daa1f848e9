//! Stack-safe traversals over [`Cause`].
//!
//! Every traversal keeps its own work list on the heap. Leaves are visited
//! left to right in document order.

use smallvec::SmallVec;

use super::{Cause, Defect};
use crate::types::FiberId;

/// A fold over a cause with one handler per node kind.
///
/// Leaf handlers run in document order; composite handlers receive the
/// already reduced halves. `C` is a context value threaded unchanged through
/// every call.
pub trait CauseReducer<C, E, Z> {
    /// Handles `Empty`.
    fn empty_case(&mut self, context: &C) -> Z;
    /// Handles `Fail`.
    fn fail_case(&mut self, context: &C, error: &E) -> Z;
    /// Handles `Die`.
    fn die_case(&mut self, context: &C, defect: &Defect) -> Z;
    /// Handles `Interrupt`.
    fn interrupt_case(&mut self, context: &C, fiber_id: &FiberId) -> Z;
    /// Combines the reduced halves of a `Sequential` node.
    fn sequential_case(&mut self, context: &C, left: Z, right: Z) -> Z;
    /// Combines the reduced halves of a `Parallel` node.
    fn parallel_case(&mut self, context: &C, left: Z, right: Z) -> Z;
}

/// Pre-order iterator over every node of a cause, composites included.
pub struct Nodes<'a, E> {
    stack: SmallVec<[&'a Cause<E>; 16]>,
}

impl<'a, E> Iterator for Nodes<'a, E> {
    type Item = &'a Cause<E>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Cause::Sequential(left, right) | Cause::Parallel(left, right) = node {
            self.stack.push(right);
            self.stack.push(left);
        }
        Some(node)
    }
}

enum Step<Z> {
    Value(Z),
    Sequential,
    Parallel,
}

struct Match<A, B, C, D, F, G> {
    on_empty: A,
    on_fail: B,
    on_die: C,
    on_interrupt: D,
    on_sequential: F,
    on_parallel: G,
}

impl<E, Z, A, B, C, D, F, G> CauseReducer<(), E, Z> for Match<A, B, C, D, F, G>
where
    A: FnMut() -> Z,
    B: FnMut(&E) -> Z,
    C: FnMut(&Defect) -> Z,
    D: FnMut(&FiberId) -> Z,
    F: FnMut(Z, Z) -> Z,
    G: FnMut(Z, Z) -> Z,
{
    fn empty_case(&mut self, (): &()) -> Z {
        (self.on_empty)()
    }

    fn fail_case(&mut self, (): &(), error: &E) -> Z {
        (self.on_fail)(error)
    }

    fn die_case(&mut self, (): &(), defect: &Defect) -> Z {
        (self.on_die)(defect)
    }

    fn interrupt_case(&mut self, (): &(), fiber_id: &FiberId) -> Z {
        (self.on_interrupt)(fiber_id)
    }

    fn sequential_case(&mut self, (): &(), left: Z, right: Z) -> Z {
        (self.on_sequential)(left, right)
    }

    fn parallel_case(&mut self, (): &(), left: Z, right: Z) -> Z {
        (self.on_parallel)(left, right)
    }
}

impl<E> Cause<E> {
    /// Iterates every node in pre-order, left subtree first.
    #[must_use]
    pub fn iter(&self) -> Nodes<'_, E> {
        let mut stack = SmallVec::new();
        stack.push(self);
        Nodes { stack }
    }

    /// Folds over every node in pre-order. When `f` returns `None` the
    /// accumulator is kept unchanged. Every node is visited.
    pub fn reduce<Z>(&self, zero: Z, mut f: impl FnMut(&Z, &Self) -> Option<Z>) -> Z {
        self.iter()
            .fold(zero, |acc, node| f(&acc, node).unwrap_or(acc))
    }

    /// Returns the first `Some` produced by `f`, searching the left subtree
    /// before the right one and stopping at the first hit.
    pub fn find<'a, Z>(&'a self, mut f: impl FnMut(&'a Self) -> Option<Z>) -> Option<Z> {
        let mut stack: SmallVec<[&'a Self; 16]> = SmallVec::new();
        stack.push(self);
        while let Some(node) = stack.pop() {
            if let Some(found) = f(node) {
                return Some(found);
            }
            if let Self::Sequential(left, right) | Self::Parallel(left, right) = node {
                stack.push(right);
                stack.push(left);
            }
        }
        None
    }

    /// Bottom-up fold driven by a [`CauseReducer`].
    pub fn reduce_with_context<C, Z, R>(&self, context: &C, reducer: &mut R) -> Z
    where
        R: CauseReducer<C, E, Z>,
    {
        let mut input: Vec<&Self> = vec![self];
        let mut output: Vec<Step<Z>> = Vec::new();
        while let Some(node) = input.pop() {
            match node {
                Self::Empty => output.push(Step::Value(reducer.empty_case(context))),
                Self::Fail(error) => output.push(Step::Value(reducer.fail_case(context, error))),
                Self::Die(defect) => output.push(Step::Value(reducer.die_case(context, defect))),
                Self::Interrupt(id) => {
                    output.push(Step::Value(reducer.interrupt_case(context, id)));
                }
                Self::Sequential(left, right) => {
                    input.push(right);
                    input.push(left);
                    output.push(Step::Sequential);
                }
                Self::Parallel(left, right) => {
                    input.push(right);
                    input.push(left);
                    output.push(Step::Parallel);
                }
            }
        }

        // Replaying in reverse leaves the left result on top of the right one
        // whenever a composite marker is reached.
        let mut accumulator: Vec<Z> = Vec::new();
        while let Some(step) = output.pop() {
            match step {
                Step::Value(value) => accumulator.push(value),
                Step::Sequential => {
                    let (left, right) = pop_pair(&mut accumulator);
                    accumulator.push(reducer.sequential_case(context, left, right));
                }
                Step::Parallel => {
                    let (left, right) = pop_pair(&mut accumulator);
                    accumulator.push(reducer.parallel_case(context, left, right));
                }
            }
        }
        accumulator
            .pop()
            .unwrap_or_else(|| unreachable!("a cause always reduces to one value"))
    }

    /// Bottom-up fold with one closure per node kind.
    pub fn match_cause<Z>(
        &self,
        on_empty: impl FnMut() -> Z,
        on_fail: impl FnMut(&E) -> Z,
        on_die: impl FnMut(&Defect) -> Z,
        on_interrupt: impl FnMut(&FiberId) -> Z,
        on_sequential: impl FnMut(Z, Z) -> Z,
        on_parallel: impl FnMut(Z, Z) -> Z,
    ) -> Z {
        let mut reducer = Match {
            on_empty,
            on_fail,
            on_die,
            on_interrupt,
            on_sequential,
            on_parallel,
        };
        self.reduce_with_context(&(), &mut reducer)
    }
}

fn pop_pair<Z>(stack: &mut Vec<Z>) -> (Z, Z) {
    match (stack.pop(), stack.pop()) {
        (Some(left), Some(right)) => (left, right),
        _ => unreachable!("composite marker without two reduced halves"),
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

    struct Render;

    impl CauseReducer<&'static str, u8, String> for Render {
        fn empty_case(&mut self, _: &&'static str) -> String {
            "0".into()
        }

        fn fail_case(&mut self, prefix: &&'static str, error: &u8) -> String {
            format!("{prefix}{error}")
        }

        fn die_case(&mut self, _: &&'static str, _: &Defect) -> String {
            "die".into()
        }

        fn interrupt_case(&mut self, _: &&'static str, id: &FiberId) -> String {
            format!("int{id}")
        }

        fn sequential_case(&mut self, _: &&'static str, left: String, right: String) -> String {
            format!("({left} ; {right})")
        }

        fn parallel_case(&mut self, _: &&'static str, left: String, right: String) -> String {
            format!("({left} | {right})")
        }
    }

    #[test]
    fn reduce_with_context_keeps_left_right_order() {
        init_test("reduce_with_context_keeps_left_right_order");
        let cause = Cause::sequential(
            Cause::parallel(Cause::fail(1), Cause::fail(2)),
            Cause::sequential(Cause::die("d"), Cause::interrupt(fid(9))),
        );
        let rendered = cause.reduce_with_context(&"e", &mut Render);
        assert_eq!(rendered, "((e1 | e2) ; (die ; int#9))");
        crate::test_complete!("reduce_with_context_keeps_left_right_order");
    }

    #[test]
    fn reduce_visits_every_node_in_pre_order() {
        init_test("reduce_visits_every_node_in_pre_order");
        let cause = Cause::sequential(Cause::fail(1), Cause::parallel(Cause::fail(2), Cause::fail(3)));
        let seen = cause.reduce(Vec::new(), |acc, node| {
            let mut acc = acc.clone();
            acc.push(match node {
                Cause::Fail(n) => n.to_string(),
                Cause::Sequential(..) => "S".into(),
                Cause::Parallel(..) => "P".into(),
                _ => "?".into(),
            });
            Some(acc)
        });
        assert_eq!(seen, vec!["S", "1", "P", "2", "3"]);
        crate::test_complete!("reduce_visits_every_node_in_pre_order");
    }

    #[test]
    fn reduce_keeps_accumulator_on_none() {
        let cause: Cause<u8> = Cause::parallel(Cause::fail(4), Cause::die("d"));
        let sum = cause.reduce(0_u32, |acc, node| match node {
            Cause::Fail(n) => Some(acc + u32::from(*n)),
            _ => None,
        });
        assert_eq!(sum, 4);
    }

    #[test]
    fn find_stops_at_leftmost_hit() {
        init_test("find_stops_at_leftmost_hit");
        let cause = Cause::parallel(
            Cause::sequential(Cause::die("d"), Cause::fail(1)),
            Cause::fail(2),
        );
        let mut visited = 0;
        let found = cause.find(|node| {
            visited += 1;
            match node {
                Cause::Fail(n) => Some(*n),
                _ => None,
            }
        });
        assert_eq!(found, Some(1));
        assert_eq!(visited, 4);
        crate::test_complete!("find_stops_at_leftmost_hit");
    }

    #[test]
    fn match_cause_counts_leaf_kinds() {
        init_test("match_cause_counts_leaf_kinds");
        let cause: Cause<u8> = Cause::parallel(
            Cause::sequential(Cause::fail(1), Cause::die("x")),
            Cause::interrupt(fid(3)),
        );
        let (fails, dies, interrupts) = cause.match_cause(
            || (0, 0, 0),
            |_| (1, 0, 0),
            |_| (0, 1, 0),
            |_| (0, 0, 1),
            |l, r| (l.0 + r.0, l.1 + r.1, l.2 + r.2),
            |l, r| (l.0 + r.0, l.1 + r.1, l.2 + r.2),
        );
        assert_eq!((fails, dies, interrupts), (1, 1, 1));
        crate::test_complete!("match_cause_counts_leaf_kinds");
    }

    #[test]
    fn folds_are_stack_safe() {
        init_test("folds_are_stack_safe");
        let mut cause: Cause<u8> = Cause::fail(1);
        for _ in 1..100_000 {
            cause = Cause::sequential(cause, Cause::fail(1));
        }
        let failures = cause.reduce(0_usize, |acc, node| match node {
            Cause::Fail(_) => Some(acc + 1),
            _ => None,
        });
        assert_eq!(failures, 100_000);
        let depth = cause.match_cause(|| 0_usize, |_| 0, |_| 0, |_| 0, |l, r| l.max(r) + 1, |l, r| l.max(r) + 1);
        assert_eq!(depth, 99_999);
        assert!(cause.find(|node| matches!(node, Cause::Die(_)).then_some(())).is_none());
        crate::test_complete!("folds_are_stack_safe");
    }
}
