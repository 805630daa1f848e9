//! Fiber-local values.
//!
//! A [`FiberRef`] names a value that every fiber carries. A fiber's values
//! live in its [`FiberRefs`]: forking copies them to the child, and joining a
//! child merges back only the values the child itself changed, using the
//! ref's join function.

use core::fmt;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::FiberId;

/// A typed key for a fiber-local value.
pub struct FiberRef<T> {
    name: &'static str,
    initial: T,
    join: fn(&T, &T) -> T,
}

fn child_wins<T: Clone>(_parent: &T, child: &T) -> T {
    child.clone()
}

impl<T: Clone> FiberRef<T> {
    /// A ref whose joined value is the child's.
    #[must_use]
    pub const fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            initial,
            join: child_wins::<T>,
        }
    }

    /// A ref that merges `(parent, child)` values with `join`.
    #[must_use]
    pub const fn with_join(name: &'static str, initial: T, join: fn(&T, &T) -> T) -> Self {
        Self {
            name,
            initial,
            join,
        }
    }

    /// Unique name of the ref.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Value seen by fibers that never set the ref.
    #[must_use]
    pub const fn initial(&self) -> &T {
        &self.initial
    }
}

impl<T: fmt::Debug> fmt::Debug for FiberRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberRef")
            .field("name", &self.name)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

trait ErasedValue: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn join(&self, child: &Arc<dyn ErasedValue>) -> Arc<dyn ErasedValue>;
}

struct Slot<T> {
    value: T,
    join: fn(&T, &T) -> T,
}

impl<T> ErasedValue for Slot<T>
where
    T: Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn join(&self, child: &Arc<dyn ErasedValue>) -> Arc<dyn ErasedValue> {
        match child.as_any().downcast_ref::<Self>() {
            Some(child) => Arc::new(Self {
                value: (self.join)(&self.value, &child.value),
                join: self.join,
            }),
            None => Arc::clone(child),
        }
    }
}

#[derive(Clone)]
struct Entry {
    value: Arc<dyn ErasedValue>,
    set_by: FiberId,
}

/// The fiber-local values of one fiber.
///
/// Cloning is cheap; the map is copied on first write.
#[derive(Clone)]
pub struct FiberRefs {
    owner: FiberId,
    entries: Arc<BTreeMap<&'static str, Entry>>,
}

impl FiberRefs {
    /// No values set, owned by no fiber.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            owner: FiberId::None,
            entries: Arc::new(BTreeMap::new()),
        }
    }

    /// The fiber these values belong to.
    #[must_use]
    pub const fn owner(&self) -> &FiberId {
        &self.owner
    }

    /// Number of refs set explicitly.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no ref has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The current value of `fiber_ref`, or its initial value.
    #[must_use]
    pub fn get<T>(&self, fiber_ref: &FiberRef<T>) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        self.entries
            .get(fiber_ref.name)
            .and_then(|entry| entry.value.as_any().downcast_ref::<Slot<T>>())
            .map_or_else(|| fiber_ref.initial.clone(), |slot| slot.value.clone())
    }

    /// Sets `fiber_ref` on behalf of the owning fiber.
    pub fn set<T>(&mut self, fiber_ref: &FiberRef<T>, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let entry = Entry {
            value: Arc::new(Slot {
                value,
                join: fiber_ref.join,
            }),
            set_by: self.owner.clone(),
        };
        Arc::make_mut(&mut self.entries).insert(fiber_ref.name, entry);
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with<T>(mut self, fiber_ref: &FiberRef<T>, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.set(fiber_ref, value);
        self
    }

    /// Applies `f` to the current value.
    pub fn update<T>(&mut self, fiber_ref: &FiberRef<T>, f: impl FnOnce(T) -> T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let next = f(self.get(fiber_ref));
        self.set(fiber_ref, next);
    }

    /// Removes an explicit value, restoring the initial one.
    pub fn reset<T>(&mut self, fiber_ref: &FiberRef<T>) {
        if self.entries.contains_key(fiber_ref.name) {
            Arc::make_mut(&mut self.entries).remove(fiber_ref.name);
        }
    }

    /// The values a child fiber `child` starts with.
    #[must_use]
    pub fn fork_as(&self, child: &FiberId) -> Self {
        Self {
            owner: child.clone(),
            entries: Arc::clone(&self.entries),
        }
    }

    /// Merges the values `child` changed since it was forked. Each merged
    /// value counts as set by this fiber afterwards.
    pub fn join_as(&mut self, child: &Self) {
        if Arc::ptr_eq(&self.entries, &child.entries) {
            return;
        }
        for (name, child_entry) in child.entries.iter() {
            if child_entry.set_by != child.owner {
                continue;
            }
            let value = match self.entries.get(name) {
                Some(parent_entry) => parent_entry.value.join(&child_entry.value),
                None => Arc::clone(&child_entry.value),
            };
            let entry = Entry {
                value,
                set_by: self.owner.clone(),
            };
            Arc::make_mut(&mut self.entries).insert(*name, entry);
        }
    }
}

impl Default for FiberRefs {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for FiberRefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberRefs")
            .field("owner", &self.owner)
            .field("refs", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
