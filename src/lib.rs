//! Causeway: failure causes, fiber identities and fiber handles for a
//! cooperative fiber runtime.
//!
//! # Overview
//!
//! A fiber that finishes produces an [`Exit`]: either a value or a
//! [`Cause`] describing everything that went wrong. Causes are a small
//! algebra over expected failures, defects and interruptions, composed
//! sequentially (a finalizer failed after the main body) or in parallel
//! (two concurrent branches both failed). Two causes are equal when they
//! describe the same failures, regardless of how they were nested.
//!
//! # Core Guarantees
//!
//! - **Nothing is lost**: every failure, defect and interruptor reaches the
//!   final cause
//! - **Stack safety**: folding, comparing, rendering and dropping a cause
//!   never recurse on its depth
//! - **Cooperative interruption**: interrupting a fiber records a request;
//!   the scheduler decides when to honor it
//! - **No ambient state**: the ambient concurrency travels in the fiber's
//!   [`FiberRefs`], passed in explicitly
//!
//! # Module Structure
//!
//! - [`cause`]: the failure algebra, defects, rendering and the exception
//!   taxonomy
//! - [`types`]: [`FiberId`] and [`Exit`]
//! - [`fiber`]: the [`Fiber`] handle, runtime and synthetic fibers, fiber
//!   refs
//! - [`concurrency`]: [`Concurrency`] requests and their resolution
//! - [`config`]: [`CoreConfig`] from defaults, files and the environment
//! - [`error`](mod@error): crate error types
//! - [`tracing_compat`]: optional tracing integration (requires
//!   `tracing-integration` feature)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]

pub mod cause;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod fiber;
pub mod tracing_compat;
pub mod types;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

// Re-exports for convenient access to core types
pub use cause::{AsRenderable, Cause, CauseReducer, Defect, PrettyError, RenderOptions, SpanAnnotation};
pub use concurrency::{
    CURRENT_CONCURRENCY, Concurrency, ExecutionStrategy, match_concurrency, match_simple,
};
pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use fiber::{Either, Fiber, FiberHandle, FiberRef, FiberRefs, RuntimeFiber};
pub use types::{Exit, FiberId, RuntimeFiberId};
