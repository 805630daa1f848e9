//! Concurrency policy.
//!
//! Combinators that run many effects (`for_each`, `all`, `validate`, ...)
//! take an optional [`Concurrency`] and turn it into an
//! [`ExecutionStrategy`]. `Inherit` defers to the ambient setting carried in
//! the calling fiber's [`FiberRefs`] under [`CURRENT_CONCURRENCY`]; the refs
//! are always passed in explicitly.
//!
//! | requested            | ambient              | strategy         |
//! |----------------------|----------------------|------------------|
//! | absent               | -                    | sequential       |
//! | `Unbounded`          | -                    | unbounded        |
//! | `Fixed(n)`, `n > 1`  | -                    | bounded(n)       |
//! | `Fixed(0 \| 1)`      | -                    | sequential       |
//! | `Inherit`            | `Unbounded`          | unbounded        |
//! | `Inherit`            | `Fixed(n)`, `n > 1`  | bounded(n)       |
//! | `Inherit`            | anything else        | sequential       |

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::fiber::{FiberRef, FiberRefs};
use crate::tracing_compat::trace;

/// Requested degree of concurrency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ConcurrencyRepr", into = "ConcurrencyRepr")]
pub enum Concurrency {
    /// At most this many effects in flight.
    Fixed(usize),
    /// No limit.
    #[default]
    Unbounded,
    /// Whatever the calling fiber's ambient setting says.
    Inherit,
}

impl Concurrency {
    /// True for [`Concurrency::Inherit`].
    #[must_use]
    pub const fn is_inherit(self) -> bool {
        matches!(self, Self::Inherit)
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("unbounded"),
            Self::Inherit => f.write_str("inherit"),
        }
    }
}

impl FromStr for Concurrency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "unbounded" => Ok(Self::Unbounded),
            "inherit" => Ok(Self::Inherit),
            other => other
                .parse::<usize>()
                .map(Self::Fixed)
                .map_err(|_| Error::InvalidConcurrency {
                    value: trimmed.to_string(),
                }),
        }
    }
}

/// Wire form: a bare number or one of the words `unbounded` / `inherit`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ConcurrencyRepr {
    Number(usize),
    Word(String),
}

impl TryFrom<ConcurrencyRepr> for Concurrency {
    type Error = Error;

    fn try_from(repr: ConcurrencyRepr) -> Result<Self, Self::Error> {
        match repr {
            ConcurrencyRepr::Number(n) => Ok(Self::Fixed(n)),
            ConcurrencyRepr::Word(word) => word.parse(),
        }
    }
}

impl From<Concurrency> for ConcurrencyRepr {
    fn from(concurrency: Concurrency) -> Self {
        match concurrency {
            Concurrency::Fixed(n) => Self::Number(n),
            other => Self::Word(other.to_string()),
        }
    }
}

/// The ambient concurrency read when a combinator asks to `Inherit`.
pub static CURRENT_CONCURRENCY: FiberRef<Concurrency> =
    FiberRef::new("causeway.current_concurrency", Concurrency::Unbounded);

/// How a combinator should actually run its effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStrategy {
    /// One at a time, in order.
    Sequential,
    /// At most `n` at a time; always `n > 1`.
    Bounded(usize),
    /// All at once.
    Unbounded,
}

impl ExecutionStrategy {
    /// True unless the strategy is [`ExecutionStrategy::Sequential`].
    #[must_use]
    pub const fn is_concurrent(self) -> bool {
        !matches!(self, Self::Sequential)
    }
}

fn from_fixed(n: usize) -> ExecutionStrategy {
    if n > 1 {
        ExecutionStrategy::Bounded(n)
    } else {
        ExecutionStrategy::Sequential
    }
}

/// Decides the execution strategy for `concurrency` in a fiber whose values
/// are `refs`.
#[must_use]
pub fn resolve(concurrency: Option<Concurrency>, refs: &FiberRefs) -> ExecutionStrategy {
    let strategy = match concurrency {
        None => ExecutionStrategy::Sequential,
        Some(Concurrency::Unbounded) => ExecutionStrategy::Unbounded,
        Some(Concurrency::Fixed(n)) => from_fixed(n),
        Some(Concurrency::Inherit) => match refs.get(&CURRENT_CONCURRENCY) {
            Concurrency::Unbounded => ExecutionStrategy::Unbounded,
            Concurrency::Fixed(n) => from_fixed(n),
            Concurrency::Inherit => ExecutionStrategy::Sequential,
        },
    };
    trace!(
        requested = ?concurrency,
        fiber_id = %refs.owner(),
        strategy = ?strategy,
        "resolved concurrency"
    );
    strategy
}

/// Runs the branch matching the resolved strategy.
pub fn match_concurrency<R>(
    concurrency: Option<Concurrency>,
    refs: &FiberRefs,
    sequential: impl FnOnce() -> R,
    unbounded: impl FnOnce() -> R,
    bounded: impl FnOnce(usize) -> R,
) -> R {
    match resolve(concurrency, refs) {
        ExecutionStrategy::Sequential => sequential(),
        ExecutionStrategy::Unbounded => unbounded(),
        ExecutionStrategy::Bounded(n) => bounded(n),
    }
}

/// Like [`match_concurrency`], with bounded and unbounded folded together.
pub fn match_simple<R>(
    concurrency: Option<Concurrency>,
    refs: &FiberRefs,
    sequential: impl FnOnce() -> R,
    concurrent: impl FnOnce() -> R,
) -> R {
    if resolve(concurrency, refs).is_concurrent() {
        concurrent()
    } else {
        sequential()
    }
}
