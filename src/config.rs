//! Core configuration.
//!
//! # Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set on [`CoreConfigBuilder`]
//! 2. **Environment variables**: `CAUSEWAY_*`
//! 3. **Config file**: a TOML file (requires the `config-file` feature)
//! 4. **Defaults**: [`CoreConfig::default()`]
//!
//! # Environment variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `CAUSEWAY_CONCURRENCY` | `unbounded` or integer | `default_concurrency` |
//! | `CAUSEWAY_FILTER_INTERNAL_FRAMES` | `bool` | `filter_internal_frames` |
//!
//! # File format
//!
//! ```toml
//! default_concurrency = 8        # or "unbounded"
//! filter_internal_frames = false
//! ```

#[cfg(feature = "config-file")]
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cause::RenderOptions;
use crate::concurrency::{CURRENT_CONCURRENCY, Concurrency};
use crate::error::{Error, Result};
use crate::fiber::FiberRefs;
use crate::tracing_compat::debug;

/// Environment variable for the ambient default concurrency.
pub const ENV_CONCURRENCY: &str = "CAUSEWAY_CONCURRENCY";
/// Environment variable toggling internal frame filtering in rendered causes.
pub const ENV_FILTER_INTERNAL_FRAMES: &str = "CAUSEWAY_FILTER_INTERNAL_FRAMES";

/// Settings a scheduler applies when it creates its root fiber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Initial value of [`CURRENT_CONCURRENCY`] in root fiber refs.
    pub default_concurrency: Concurrency,
    /// Whether rendered causes drop runtime-internal stack frames.
    pub filter_internal_frames: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_concurrency: Concurrency::Unbounded,
            filter_internal_frames: true,
        }
    }
}

impl CoreConfig {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that cannot describe a root fiber.
    pub fn validate(&self) -> Result<()> {
        if self.default_concurrency.is_inherit() {
            return Err(Error::InheritAsDefault);
        }
        Ok(())
    }

    /// Applies the `CAUSEWAY_*` variables that are set in the process
    /// environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides read through `lookup` instead of the process
    /// environment.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(val) = lookup(ENV_CONCURRENCY) {
            self.default_concurrency = parse_concurrency(ENV_CONCURRENCY, &val)?;
            debug!(var = ENV_CONCURRENCY, value = %self.default_concurrency, "applied override");
        }
        if let Some(val) = lookup(ENV_FILTER_INTERNAL_FRAMES) {
            self.filter_internal_frames = parse_bool(ENV_FILTER_INTERNAL_FRAMES, &val)?;
            debug!(
                var = ENV_FILTER_INTERNAL_FRAMES,
                value = self.filter_internal_frames,
                "applied override"
            );
        }
        Ok(())
    }

    /// Parses a TOML document. Missing keys keep their defaults.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        parse_toml("<string>", toml_str)
    }

    /// Reads and parses a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_toml(&path.display().to_string(), &content)
    }

    /// The fiber refs a scheduler hands to its first fiber.
    #[must_use]
    pub fn root_fiber_refs(&self) -> FiberRefs {
        FiberRefs::empty().with(&CURRENT_CONCURRENCY, self.default_concurrency)
    }

    /// Options for [`Cause::pretty_with`](crate::Cause::pretty_with).
    #[must_use]
    pub const fn render_options(&self) -> RenderOptions {
        RenderOptions {
            filter_internal_frames: self.filter_internal_frames,
        }
    }
}

#[cfg(feature = "config-file")]
fn parse_toml(path: &str, content: &str) -> Result<CoreConfig> {
    toml::from_str(content).map_err(|source| Error::Parse {
        path: path.to_string(),
        source,
    })
}

fn parse_concurrency(var: &'static str, val: &str) -> Result<Concurrency> {
    val.parse::<Concurrency>().map_err(|e| Error::InvalidEnvVar {
        var,
        value: val.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var: &'static str, val: &str) -> Result<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidEnvVar {
            var,
            value: val.to_string(),
            reason: "expected bool (true/false/1/0/yes/no)".to_string(),
        }),
    }
}

/// Builds a [`CoreConfig`] from defaults, an optional file, the environment
/// and explicit settings.
#[derive(Debug, Clone)]
pub struct CoreConfigBuilder {
    #[cfg(feature = "config-file")]
    file: Option<PathBuf>,
    read_env: bool,
    default_concurrency: Option<Concurrency>,
    filter_internal_frames: Option<bool>,
}

impl Default for CoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreConfigBuilder {
    /// A builder that reads the environment and has nothing set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            #[cfg(feature = "config-file")]
            file: None,
            read_env: true,
            default_concurrency: None,
            filter_internal_frames: None,
        }
    }

    /// Sets the ambient default concurrency.
    #[must_use]
    pub const fn default_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.default_concurrency = Some(concurrency);
        self
    }

    /// Sets internal frame filtering.
    #[must_use]
    pub const fn filter_internal_frames(mut self, filter: bool) -> Self {
        self.filter_internal_frames = Some(filter);
        self
    }

    /// Loads `path` beneath environment and explicit settings.
    #[cfg(feature = "config-file")]
    #[must_use]
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Skips `CAUSEWAY_*` environment variables.
    #[must_use]
    pub const fn ignore_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    /// Resolves and validates the configuration.
    pub fn build(self) -> Result<CoreConfig> {
        self.build_with(|name| std::env::var(name).ok())
    }

    fn build_with(self, lookup: impl Fn(&str) -> Option<String>) -> Result<CoreConfig> {
        #[cfg(feature = "config-file")]
        let mut config = match &self.file {
            Some(path) => {
                debug!(path = %path.display(), "loading config file");
                CoreConfig::from_file(path)?
            }
            None => CoreConfig::default(),
        };
        #[cfg(not(feature = "config-file"))]
        let mut config = CoreConfig::default();

        if self.read_env {
            config.apply_overrides_from(lookup)?;
        }
        if let Some(concurrency) = self.default_concurrency {
            config.default_concurrency = concurrency;
        }
        if let Some(filter) = self.filter_internal_frames {
            config.filter_internal_frames = filter;
        }
        config.validate()?;
        debug!(
            default_concurrency = %config.default_concurrency,
            filter_internal_frames = config.filter_internal_frames,
            "core config resolved"
        );
        Ok(config)
    }
}
