//! Fiber identities.
//!
//! A [`FiberId`] names either a single running fiber or an unordered set of
//! fibers. The set form exists for interruption: when several fibers
//! interrupt the same target concurrently, their ids are combined and the
//! resulting `Interrupt` cause names all of them.
//!
//! `Composite` is a binary tree so that [`FiberId::combine`] is O(1), but it
//! is logically a set. Equality and hashing go through [`FiberId::to_set`],
//! so `combine(a, b) == combine(b, a)`, duplicates don't matter and a
//! composite naming one fiber equals that fiber's runtime id. Dropping a
//! composite walks it with a heap stack.

use core::fmt;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of fresh runtime ids. Initialized at process start, never reset.
static FIBER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity of one concrete fiber.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeFiberId {
    id: u64,
    start_time_millis: u64,
}

impl RuntimeFiberId {
    /// Creates a runtime id from its parts.
    #[inline]
    #[must_use]
    pub const fn new(id: u64, start_time_millis: u64) -> Self {
        Self {
            id,
            start_time_millis,
        }
    }

    /// The numeric id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u64 {
        self.id
    }

    /// Wall-clock milliseconds at which the fiber was created.
    #[inline]
    #[must_use]
    pub const fn start_time_millis(self) -> u64 {
        self.start_time_millis
    }
}

impl fmt::Debug for RuntimeFiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.id, self.start_time_millis)
    }
}

impl fmt::Display for RuntimeFiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

/// Identity of a fiber, or of a set of fibers.
#[derive(Clone)]
pub enum FiberId {
    /// No fiber. Identity for [`combine`](Self::combine).
    None,
    /// A single fiber.
    Runtime(RuntimeFiberId),
    /// The union of two ids.
    Composite(Arc<FiberId>, Arc<FiberId>),
}

impl FiberId {
    /// The empty id.
    #[inline]
    #[must_use]
    pub const fn none() -> Self {
        Self::None
    }

    /// A concrete fiber id.
    #[inline]
    #[must_use]
    pub const fn runtime(id: u64, start_time_millis: u64) -> Self {
        Self::Runtime(RuntimeFiberId::new(id, start_time_millis))
    }

    /// The union of two ids, without absorbing `None`.
    ///
    /// Prefer [`combine`](Self::combine) unless the raw node is needed.
    #[must_use]
    pub fn composite(left: Self, right: Self) -> Self {
        Self::Composite(Arc::new(left), Arc::new(right))
    }

    /// Mints a fresh runtime id stamped with the current wall-clock time.
    ///
    /// Safe to call from any number of threads concurrently: ids come from a
    /// single atomic counter and are never reused within a process.
    #[must_use]
    pub fn unsafe_make() -> Self {
        let id = FIBER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let start_time_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64);
        Self::runtime(id, start_time_millis)
    }

    /// Combines two ids. `None` on either side yields the other side.
    #[must_use]
    pub fn combine(&self, that: &Self) -> Self {
        match (self, that) {
            (Self::None, _) => that.clone(),
            (_, Self::None) => self.clone(),
            _ => Self::composite(self.clone(), that.clone()),
        }
    }

    /// Combines every id in `ids`, left to right.
    #[must_use]
    pub fn combine_all<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        ids.into_iter()
            .fold(Self::None, |acc, id| acc.combine(&id))
    }

    /// Returns `self` unless it is none, in which case `that`.
    #[must_use]
    pub fn get_or_else(&self, that: &Self) -> Self {
        if self.is_none() {
            that.clone()
        } else {
            self.clone()
        }
    }

    /// Returns true for `None` and for composites with no runtime members.
    #[must_use]
    pub fn is_none(&self) -> bool {
        match self {
            Self::None => true,
            Self::Runtime(_) => false,
            Self::Composite(..) => self.runtime_members().next().is_none(),
        }
    }

    /// The set of runtime ids this id names.
    #[must_use]
    pub fn to_set(&self) -> BTreeSet<RuntimeFiberId> {
        self.runtime_members().collect()
    }

    /// The numeric ids this id names.
    #[must_use]
    pub fn ids(&self) -> BTreeSet<u64> {
        self.runtime_members().map(RuntimeFiberId::id).collect()
    }

    /// Collapses this id to `None` if it names no fiber, otherwise to the
    /// combination of its members (duplicates removed).
    #[must_use]
    pub fn to_option(&self) -> Option<Self> {
        let mut members = self.to_set().into_iter();
        let first = Self::Runtime(members.next()?);
        Some(members.fold(first, |acc, member| acc.combine(&Self::Runtime(member))))
    }

    /// Diagnostic name: `#1,#2,#3`.
    #[must_use]
    pub fn thread_name(&self) -> String {
        self.ids()
            .iter()
            .map(|id| format!("#{id}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn runtime_members(&self) -> RuntimeMembers<'_> {
        let mut stack = SmallVec::new();
        stack.push(self);
        RuntimeMembers { stack }
    }
}

/// Walks a composite id with an explicit stack, yielding runtime members.
struct RuntimeMembers<'a> {
    stack: SmallVec<[&'a FiberId; 8]>,
}

impl Iterator for RuntimeMembers<'_> {
    type Item = RuntimeFiberId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            match id {
                FiberId::None => {}
                FiberId::Runtime(runtime) => return Some(*runtime),
                FiberId::Composite(left, right) => {
                    self.stack.push(right);
                    self.stack.push(left);
                }
            }
        }
        None
    }
}

impl Default for FiberId {
    fn default() -> Self {
        Self::None
    }
}

impl From<RuntimeFiberId> for FiberId {
    fn from(value: RuntimeFiberId) -> Self {
        Self::Runtime(value)
    }
}

impl PartialEq for FiberId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Runtime(a), Self::Runtime(b)) => a == b,
            (Self::None, Self::Runtime(_)) | (Self::Runtime(_), Self::None) => false,
            _ => self.to_set() == other.to_set(),
        }
    }
}

impl Eq for FiberId {}

impl Hash for FiberId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hashes the member set, so every shape naming the same fibers agrees.
        match self {
            Self::None => state.write_usize(0),
            Self::Runtime(runtime) => {
                state.write_usize(1);
                runtime.hash(state);
            }
            Self::Composite(..) => {
                let members = self.to_set();
                state.write_usize(members.len());
                for member in members {
                    member.hash(state);
                }
            }
        }
    }
}

impl Drop for FiberId {
    fn drop(&mut self) {
        let Self::Composite(left, right) = self else {
            return;
        };
        if !matches!(**left, Self::Composite(..)) && !matches!(**right, Self::Composite(..)) {
            return;
        }
        // Same scheme as dropping a deep `Cause`: detach uniquely owned
        // subtrees onto a heap stack, leaving `None` children behind.
        let placeholder = Arc::new(Self::None);
        let mut pending = vec![
            std::mem::replace(left, Arc::clone(&placeholder)),
            std::mem::replace(right, Arc::clone(&placeholder)),
        ];
        while let Some(node) = pending.pop() {
            let Some(mut node) = Arc::into_inner(node) else {
                continue;
            };
            if let Self::Composite(left, right) = &mut node {
                pending.push(std::mem::replace(left, Arc::clone(&placeholder)));
                pending.push(std::mem::replace(right, Arc::clone(&placeholder)));
            }
        }
    }
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "FiberId(None)"),
            Self::Runtime(runtime) => write!(f, "FiberId({runtime:?})"),
            Self::Composite(..) => f.debug_set().entries(self.to_set()).finish(),
        }
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.thread_name())
        }
    }
}
