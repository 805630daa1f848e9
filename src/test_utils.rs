//! Test utilities for causeway.
//!
//! Shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - A blocking driver for fiber futures
//! - Cause and exit assertion macros
//!
//! # Example
//! ```
//! use causeway::test_utils::{block_on, init_test_logging};
//! use causeway::{Exit, Fiber, fiber};
//!
//! init_test_logging();
//! let done = fiber::succeed::<&str, _>(7);
//! let exit = block_on(done.await_exit());
//! assert!(exit.is_success());
//! ```

use std::future::Future;
use std::sync::{Mutex, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Drive a future to completion on the current thread.
///
/// Fibers complete from whichever thread the test's "scheduler" runs on, so
/// parking the test thread until woken is enough.
pub fn block_on<F: Future>(future: F) -> F::Output {
    futures_lite::future::block_on(future)
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that an exit is a success with a specific value.
#[macro_export]
macro_rules! assert_exit_success {
    ($exit:expr, $expected:expr) => {
        match ($exit, $expected) {
            ($crate::types::Exit::Success(v), expected) => assert_eq!(v, expected),
            (other, expected) => {
                unreachable!("expected Exit::Success({:?}), got {:?}", expected, other)
            }
        }
    };
}

/// Assert that an exit failed with a cause that is interrupted only.
#[macro_export]
macro_rules! assert_exit_interrupted {
    ($exit:expr) => {
        match &$exit {
            $crate::types::Exit::Failure(cause) if cause.is_interrupted_only() => {}
            other => unreachable!("expected an interrupted exit, got {:?}", other),
        }
    };
}

/// Assert that an exit failed with a cause algebraically equal to `$cause`.
#[macro_export]
macro_rules! assert_exit_cause {
    ($exit:expr, $cause:expr) => {
        match (&$exit, &$cause) {
            ($crate::types::Exit::Failure(cause), expected) => assert_eq!(cause, expected),
            (other, expected) => {
                unreachable!("expected Exit::Failure({:?}), got {:?}", expected, other)
            }
        }
    };
}
