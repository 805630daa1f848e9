//! Error types for causeway's own fallible operations.
//!
//! The failure algebra itself is total: building, folding, comparing and
//! rendering causes never fails. The only fallible surface is configuration
//! (parsing concurrency settings, reading env overrides and config files),
//! and those errors are reported through [`Error`].

use thiserror::Error;

/// Errors produced while loading or parsing configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// A concurrency setting was neither `unbounded`, `inherit`, nor a number.
    #[error("invalid concurrency `{value}`: expected `unbounded`, `inherit`, or a non-negative integer")]
    InvalidConcurrency {
        /// The rejected input.
        value: String,
    },

    /// An environment variable was set but could not be parsed.
    #[error("invalid value for {var}: `{value}` ({reason})")]
    InvalidEnvVar {
        /// Variable name.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The ambient default cannot be `inherit`: there is nothing to inherit from.
    #[error("`inherit` cannot be used as the default concurrency")]
    InheritAsDefault,

    /// Reading a config file failed.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A config file was read but is not valid TOML for [`CoreConfig`](crate::config::CoreConfig).
    #[cfg(feature = "config-file")]
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was being parsed.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// Result alias for causeway operations.
pub type Result<T> = std::result::Result<T, Error>;
