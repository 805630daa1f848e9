//! Algebraic equality for causes.
//!
//! Two causes are equal when they flatten to the same sequence of leaf sets.
//! Flattening rewrites the tree until it is a sequence of parallel layers:
//!
//! ```text
//! Sequential(Empty, r)            => r
//! Sequential(Sequential(a, b), c) => Sequential(a, Sequential(b, c))
//! Sequential(Parallel(a, b), c)   => Parallel(Sequential(a, c), Sequential(b, c))
//! Sequential(leaf, r)             => leaf now, r in the next layer
//! ```
//!
//! Rewrites are never materialised. Pending right-hand sides are kept as an
//! arena-backed continuation list, so leaves stay borrowed from the
//! original tree. Parallel branches that share a continuation would
//! evaluate the same suffix twice per layer; the next layer keeps each
//! `(head, continuation)` pair once, which keeps flattening polynomial.

use std::hash::{Hash, Hasher};

use hashbrown::HashSet;

use super::{Cause, Defect};
use crate::types::FiberId;

/// A borrowed leaf of a cause.
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum CauseLeaf<'a, E> {
    /// An expected error.
    Fail(&'a E),
    /// A defect.
    Die(&'a Defect),
    /// An interruption.
    Interrupt(&'a FiberId),
}

impl<E> Clone for CauseLeaf<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for CauseLeaf<'_, E> {}

/// The canonical form of a cause: one set of leaves per sequential layer.
///
/// Layers without leaves are dropped.
#[derive(Debug, PartialEq, Eq)]
pub struct Flattened<'a, E: Eq + Hash> {
    layers: Vec<HashSet<CauseLeaf<'a, E>>>,
}

impl<'a, E: Eq + Hash> Flattened<'a, E> {
    /// The layers, earliest first.
    #[must_use]
    pub fn layers(&self) -> &[HashSet<CauseLeaf<'a, E>>] {
        &self.layers
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when the cause had no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl<E: Eq + Hash> Hash for Flattened<'_, E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.layers.len());
        for layer in &self.layers {
            // Order-independent within a layer.
            let mut combined = 0_u64;
            for leaf in layer {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                leaf.hash(&mut hasher);
                combined = combined.wrapping_add(hasher.finish());
            }
            state.write_usize(layer.len());
            state.write_u64(combined);
        }
    }
}

/// A pending right-hand side and the index of the one after it.
struct Continuation<'a, E> {
    head: &'a Cause<E>,
    tail: Option<usize>,
}

/// Items for the next layer, each `(head, continuation)` pair kept once.
struct Pending<'a, E> {
    items: Vec<(&'a Cause<E>, Option<usize>)>,
    seen: HashSet<(*const Cause<E>, Option<usize>)>,
}

impl<'a, E> Pending<'a, E> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn push(&mut self, head: &'a Cause<E>, tail: Option<usize>) {
        if self.seen.insert((std::ptr::from_ref(head), tail)) {
            self.items.push((head, tail));
        }
    }
}

struct Flattener<'a, E> {
    continuations: Vec<Continuation<'a, E>>,
}

impl<'a, E: Eq + Hash> Flattener<'a, E> {
    /// Evaluates one layer item, adding its leaves to `layer` and deferring
    /// everything that happens after them to `next`.
    fn evaluate(
        &mut self,
        root: &'a Cause<E>,
        continuation: Option<usize>,
        layer: &mut HashSet<CauseLeaf<'a, E>>,
        next: &mut Pending<'a, E>,
    ) {
        let mut parallel = vec![(root, continuation)];
        while let Some((mut cause, mut continuation)) = parallel.pop() {
            loop {
                let leaf = match cause {
                    Cause::Empty => match continuation {
                        Some(index) => {
                            let pending = &self.continuations[index];
                            cause = pending.head;
                            continuation = pending.tail;
                            continue;
                        }
                        None => break,
                    },
                    Cause::Sequential(left, right) => {
                        self.continuations.push(Continuation {
                            head: &**right,
                            tail: continuation,
                        });
                        continuation = Some(self.continuations.len() - 1);
                        cause = &**left;
                        continue;
                    }
                    Cause::Parallel(left, right) => {
                        parallel.push((&**right, continuation));
                        cause = &**left;
                        continue;
                    }
                    Cause::Fail(error) => CauseLeaf::Fail(error),
                    Cause::Die(defect) => CauseLeaf::Die(defect),
                    Cause::Interrupt(id) => CauseLeaf::Interrupt(id),
                };
                layer.insert(leaf);
                if let Some(index) = continuation {
                    let pending = &self.continuations[index];
                    next.push(pending.head, pending.tail);
                }
                break;
            }
        }
    }
}

impl<E> Cause<E> {
    /// Canonical form used for equality and hashing.
    #[must_use]
    pub fn flatten(&self) -> Flattened<'_, E>
    where
        E: Eq + Hash,
    {
        let mut flattener = Flattener {
            continuations: Vec::new(),
        };
        let mut layers = Vec::new();
        let mut current = vec![(self, None)];
        while !current.is_empty() {
            let mut layer = HashSet::new();
            let mut next = Pending::new();
            for (cause, continuation) in current {
                flattener.evaluate(cause, continuation, &mut layer, &mut next);
            }
            if !layer.is_empty() {
                layers.push(layer);
            }
            current = next.items;
        }
        Flattened { layers }
    }
}

impl<E: Eq + Hash> PartialEq for Cause<E> {
    fn eq(&self, other: &Self) -> bool {
        if let (Self::Fail(a), Self::Fail(b)) = (self, other) {
            return a == b;
        }
        self.flatten() == other.flatten()
    }
}

impl<E: Eq + Hash> Eq for Cause<E> {}

impl<E: Eq + Hash> Hash for Cause<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.flatten().hash(state);
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

    fn hash_of(cause: &Cause<&str>) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        cause.hash(&mut hasher);
        hasher.finish()
    }

    fn fail(s: &'static str) -> Cause<&'static str> {
        Cause::fail(s)
    }

    #[test]
    fn parallel_is_commutative_and_associative() {
        init_test("parallel_is_commutative_and_associative");
        let a = Cause::parallel(fail("a"), fail("b"));
        let b = Cause::parallel(fail("b"), fail("a"));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let left = Cause::parallel(Cause::parallel(fail("a"), fail("b")), fail("c"));
        let right = Cause::parallel(fail("a"), Cause::parallel(fail("b"), fail("c")));
        assert_eq!(left, right);
        crate::test_complete!("parallel_is_commutative_and_associative");
    }

    #[test]
    fn sequential_is_associative_not_commutative() {
        init_test("sequential_is_associative_not_commutative");
        let left = Cause::sequential(Cause::sequential(fail("a"), fail("b")), fail("c"));
        let right = Cause::sequential(fail("a"), Cause::sequential(fail("b"), fail("c")));
        assert_eq!(left, right);
        assert_ne!(
            Cause::sequential(fail("a"), fail("b")),
            Cause::sequential(fail("b"), fail("a"))
        );
        crate::test_complete!("sequential_is_associative_not_commutative");
    }

    #[test]
    fn sequential_distributes_over_parallel() {
        init_test("sequential_distributes_over_parallel");
        let factored = Cause::sequential(Cause::parallel(fail("a"), fail("b")), fail("c"));
        let expanded = Cause::parallel(
            Cause::sequential(fail("a"), fail("c")),
            Cause::sequential(fail("b"), fail("c")),
        );
        assert_eq!(factored, expanded);
        assert_eq!(hash_of(&factored), hash_of(&expanded));
        crate::test_complete!("sequential_distributes_over_parallel");
    }

    #[test]
    fn raw_empty_nodes_are_ignored() {
        init_test("raw_empty_nodes_are_ignored");
        let raw: Cause<&str> = Cause::Sequential(
            std::sync::Arc::new(Cause::Empty),
            std::sync::Arc::new(Cause::Parallel(
                std::sync::Arc::new(fail("x")),
                std::sync::Arc::new(Cause::Empty),
            )),
        );
        assert_eq!(raw, fail("x"));
        assert_eq!(Cause::<&str>::empty().flatten().len(), 0);
        crate::test_complete!("raw_empty_nodes_are_ignored");
    }

    #[test]
    fn flatten_layers_follow_sequence() {
        init_test("flatten_layers_follow_sequence");
        let cause = Cause::sequential(
            Cause::parallel(fail("a"), fail("b")),
            Cause::sequential(fail("c"), Cause::parallel(fail("d"), fail("e"))),
        );
        let flat = cause.flatten();
        let sizes: Vec<_> = flat.layers().iter().map(HashSet::len).collect();
        assert_eq!(sizes, vec![2, 1, 2]);
        assert!(flat.layers()[1].contains(&CauseLeaf::Fail(&"c")));
        crate::test_complete!("flatten_layers_follow_sequence");
    }

    #[test]
    fn leaf_kinds_never_match_each_other() {
        let id = FiberId::runtime(1, 0);
        assert_ne!(Cause::<&str>::interrupt(id), Cause::die("x"));
        assert_ne!(fail("x"), Cause::die("x"));
        assert_eq!(Cause::<&str>::die("x"), Cause::die("x".to_string()));
    }

    #[test]
    fn shared_suffixes_flatten_once_per_layer() {
        init_test("shared_suffixes_flatten_once_per_layer");
        let build = || {
            (0..40u32).fold(Cause::fail(1_000), |rest, n| {
                Cause::sequential(Cause::parallel(Cause::fail(2 * n), Cause::fail(2 * n + 1)), rest)
            })
        };
        let left: Cause<u32> = build();
        let right: Cause<u32> = build();
        let flat = left.flatten();
        assert_eq!(flat.len(), 41);
        assert!(flat.layers()[..40].iter().all(|layer| layer.len() == 2));
        assert_eq!(left, right);
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        left.hash(&mut hasher);
        let mut other = std::collections::hash_map::DefaultHasher::new();
        right.hash(&mut other);
        assert_eq!(hasher.finish(), other.finish());
        crate::test_complete!("shared_suffixes_flatten_once_per_layer");
    }

    #[test]
    fn deep_equality_is_stack_safe() {
        let mut left: Cause<u32> = Cause::fail(0);
        let mut right: Cause<u32> = Cause::fail(0);
        for n in 1..20_000 {
            left = Cause::sequential(left, Cause::fail(n));
            right = Cause::sequential(right, Cause::fail(n));
        }
        assert_eq!(left, right);
    }
}
