//! Human-readable rendering of causes.

use core::fmt;

use super::{AsRenderable, Cause, Defect};

const ALL_INTERRUPTED: &str = "All fibers interrupted without errors.";

/// Symbol fragments of frames that belong to the runtime rather than to the
/// code that failed.
const INTERNAL_FRAMES: &[&str] = &[
    "causeway::",
    "std::rt::",
    "std::panicking",
    "std::panic::",
    "std::sys::",
    "std::backtrace",
    "core::ops::function",
    "core::panicking",
    "__rust_begin_short_backtrace",
    "__rust_start_panic",
    "<alloc::boxed::Box<F,A> as core::ops::function",
];

/// Options for [`Cause::pretty_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Drop runtime-internal frames from stack traces.
    pub filter_internal_frames: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            filter_internal_frames: true,
        }
    }
}

/// One rendered failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrettyError {
    name: String,
    message: String,
    stack: Vec<String>,
    spans: Vec<String>,
    sources: Vec<String>,
}

impl PrettyError {
    /// A failure with no stack information.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: Vec::new(),
            spans: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Renders any displayable error under the generic name `Error`.
    #[must_use]
    pub fn from_display(error: &impl fmt::Display) -> Self {
        Self::new("Error", error.to_string())
    }

    /// Renders a payload that describes itself.
    #[must_use]
    pub fn from_renderable(renderable: &dyn AsRenderable, options: RenderOptions) -> Self {
        let stack = renderable
            .stack()
            .map(|raw| stack_lines(&raw, options.filter_internal_frames))
            .unwrap_or_default();
        let spans = renderable
            .span()
            .map(|span| span.chain().map(|s| format!("    at {s}")).collect())
            .unwrap_or_default();
        Self {
            name: renderable.name().into_owned(),
            message: renderable.message().into_owned(),
            stack,
            spans,
            sources: renderable.sources(),
        }
    }

    /// Renders a defect. Payloads without a rendering fall back to their
    /// text or `Debug` output.
    #[must_use]
    pub fn from_defect(defect: &Defect, options: RenderOptions) -> Self {
        match defect.as_renderable() {
            Some(renderable) => Self::from_renderable(renderable, options),
            None => Self::new("Error", defect.to_string()),
        }
    }

    /// Rendered name, e.g. `RuntimeException`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rendered message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Stack lines kept after filtering, each formatted `    at ...`.
    #[must_use]
    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    /// Span lines, innermost first.
    #[must_use]
    pub fn spans(&self) -> &[String] {
        &self.spans
    }
}

impl fmt::Display for PrettyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.name)?;
        } else {
            write!(f, "{}: {}", self.name, self.message)?;
        }
        for line in self.stack.iter().chain(&self.spans) {
            write!(f, "\n{line}")?;
        }
        for source in &self.sources {
            write!(f, "\nCaused by: {source}")?;
        }
        Ok(())
    }
}

/// Normalises a `std::backtrace::Backtrace` listing into `    at symbol
/// (location)` lines, optionally dropping internal frames.
fn stack_lines(raw: &str, filter_internal: bool) -> Vec<String> {
    let mut frames: Vec<(String, Option<String>)> = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("note:") {
            continue;
        }
        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(last) = frames.last_mut() {
                if last.1.is_none() {
                    last.1 = Some(location.to_string());
                    continue;
                }
            }
            frames.push((location.to_string(), None));
            continue;
        }
        let symbol = match trimmed.split_once(": ") {
            Some((index, symbol)) if index.chars().all(|c| c.is_ascii_digit()) => symbol,
            _ => trimmed,
        };
        frames.push((symbol.to_string(), None));
    }
    frames
        .into_iter()
        .filter(|(symbol, _)| {
            !filter_internal || !INTERNAL_FRAMES.iter().any(|frag| symbol.contains(frag))
        })
        .map(|(symbol, location)| match location {
            Some(location) => format!("    at {symbol} ({location})"),
            None => format!("    at {symbol}"),
        })
        .collect()
}

impl<E> Cause<E> {
    /// Renders every `Fail` and `Die` leaf with `render_fail` for expected
    /// errors. Interruptions are not listed.
    pub fn pretty_errors_with(
        &self,
        options: RenderOptions,
        mut render_fail: impl FnMut(&E) -> PrettyError,
    ) -> Vec<PrettyError> {
        self.iter()
            .filter_map(|node| match node {
                Cause::Fail(error) => Some(render_fail(error)),
                Cause::Die(defect) => Some(PrettyError::from_defect(defect, options)),
                _ => None,
            })
            .collect()
    }

    /// Renders every `Fail` and `Die` leaf, expected errors through their
    /// `Display` output.
    pub fn pretty_errors(&self) -> Vec<PrettyError>
    where
        E: fmt::Display,
    {
        self.pretty_errors_with(RenderOptions::default(), PrettyError::from_display)
    }

    /// Multi-line report of every failure in the cause.
    #[must_use]
    pub fn pretty_with(
        &self,
        options: RenderOptions,
        render_fail: impl FnMut(&E) -> PrettyError,
    ) -> String {
        if self.is_interrupted_only() {
            return ALL_INTERRUPTED.to_string();
        }
        self.pretty_errors_with(options, render_fail)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// [`pretty_with`](Self::pretty_with) using default options and `Display`
    /// for expected errors.
    #[must_use]
    pub fn pretty(&self) -> String
    where
        E: fmt::Display,
    {
        self.pretty_with(RenderOptions::default(), PrettyError::from_display)
    }
}
