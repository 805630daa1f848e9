//! Untyped failure payloads carried by `Cause::Die`.
//!
//! A [`Defect`] is a shared, type-erased value. Callers recover the concrete
//! type with [`Defect::downcast_ref`]; renderers ask for the optional
//! [`AsRenderable`] view, which only payloads built from errors, exceptions
//! or explicit renderables provide. Everything else falls back to its
//! `Debug` output.

use core::fmt;
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::exception::Exception;

/// Capability for payloads that know how to present themselves.
///
/// Implemented by the exception taxonomy and by wrapped `std::error::Error`
/// values. Custom payloads can implement it and enter a cause through
/// [`Defect::renderable`].
pub trait AsRenderable: Send + Sync {
    /// Short type-like name, e.g. `RuntimeException`.
    fn name(&self) -> Cow<'_, str>;

    /// Human-readable message.
    fn message(&self) -> Cow<'_, str>;

    /// Raw stack trace text, unfiltered.
    fn stack(&self) -> Option<Cow<'_, str>> {
        None
    }

    /// Innermost span active when the failure was produced.
    fn span(&self) -> Option<&SpanAnnotation> {
        None
    }

    /// Messages of underlying causes, outermost first.
    fn sources(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A node in a causally linked chain of tracing spans.
///
/// The tracer itself lives outside this crate; failures only carry the
/// chain so it can be printed next to the stack trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpanAnnotation {
    name: String,
    location: Option<String>,
    parent: Option<Arc<SpanAnnotation>>,
}

impl SpanAnnotation {
    /// A root span.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
            parent: None,
        }
    }

    /// Attaches a source location such as `src/handler.rs:42`.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// A span nested inside `self`.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source location, if recorded.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// The chain from this span up to its root.
    pub fn chain(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |span| span.parent.as_deref())
    }
}

impl fmt::Display for SpanAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({location})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Structural identity of payloads that compare by value.
#[derive(PartialEq, Eq, Hash)]
struct DefectKey<'a> {
    tag: &'static str,
    message: &'a str,
}

trait Payload: Send + Sync + 'static {
    fn as_any(&self) -> &(dyn Any + Send + Sync);

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    fn renderable(&self) -> Option<&dyn AsRenderable> {
        None
    }

    fn key(&self) -> Option<DefectKey<'_>> {
        None
    }
}

struct StaticText(&'static str);

impl Payload for StaticText {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &self.0
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }

    fn key(&self) -> Option<DefectKey<'_>> {
        Some(DefectKey {
            tag: "text",
            message: self.0,
        })
    }
}

struct OwnedText(String);

impl Payload for OwnedText {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &self.0
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }

    fn key(&self) -> Option<DefectKey<'_>> {
        Some(DefectKey {
            tag: "text",
            message: &self.0,
        })
    }
}

struct Opaque<T>(T);

impl<T> Payload for Opaque<T>
where
    T: fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &self.0
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

struct ErrorPayload<T> {
    error: T,
    backtrace: Backtrace,
}

impl<T> AsRenderable for ErrorPayload<T>
where
    T: std::error::Error + Send + Sync + 'static,
{
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(short_type_name::<T>())
    }

    fn message(&self) -> Cow<'_, str> {
        Cow::Owned(self.error.to_string())
    }

    fn stack(&self) -> Option<Cow<'_, str>> {
        (self.backtrace.status() == BacktraceStatus::Captured)
            .then(|| Cow::Owned(self.backtrace.to_string()))
    }

    fn sources(&self) -> Vec<String> {
        std::iter::successors(self.error.source(), |err| err.source())
            .map(ToString::to_string)
            .collect()
    }
}

impl<T> Payload for ErrorPayload<T>
where
    T: std::error::Error + Send + Sync + 'static,
{
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &self.error
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.error)
    }

    fn renderable(&self) -> Option<&dyn AsRenderable> {
        Some(self)
    }
}

struct RenderablePayload<T>(T);

impl<T> Payload for RenderablePayload<T>
where
    T: AsRenderable + fmt::Debug + 'static,
{
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &self.0
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }

    fn renderable(&self) -> Option<&dyn AsRenderable> {
        Some(&self.0)
    }
}

struct ExceptionPayload<T>(T);

impl<T: Exception> Payload for ExceptionPayload<T> {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &self.0
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }

    fn renderable(&self) -> Option<&dyn AsRenderable> {
        Some(&self.0)
    }

    fn key(&self) -> Option<DefectKey<'_>> {
        Some(DefectKey {
            tag: T::TAG,
            message: Exception::message(&self.0),
        })
    }
}

/// An unexpected, untyped failure payload.
///
/// Cloning shares the payload. Two defects are equal when they share the
/// same allocation, or when both are text or taxonomy exceptions with the
/// same tag and message.
#[derive(Clone)]
pub struct Defect {
    payload: Arc<dyn Payload>,
}

impl Defect {
    /// Wraps an arbitrary value. It renders through its `Debug` output.
    #[must_use]
    pub fn new<T>(value: T) -> Self
    where
        T: fmt::Debug + Send + Sync + 'static,
    {
        Self {
            payload: Arc::new(Opaque(value)),
        }
    }

    /// A plain text defect.
    #[must_use]
    pub fn text(message: impl Into<Cow<'static, str>>) -> Self {
        let payload: Arc<dyn Payload> = match message.into() {
            Cow::Borrowed(text) => Arc::new(StaticText(text)),
            Cow::Owned(text) => Arc::new(OwnedText(text)),
        };
        Self { payload }
    }

    /// Wraps an error, capturing a backtrace at this point when backtraces
    /// are enabled (`RUST_BACKTRACE`).
    #[must_use]
    pub fn from_error<T>(error: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Self {
            payload: Arc::new(ErrorPayload {
                error,
                backtrace: Backtrace::capture(),
            }),
        }
    }

    /// Wraps a value that supplies its own rendering.
    #[must_use]
    pub fn renderable<T>(value: T) -> Self
    where
        T: AsRenderable + fmt::Debug + 'static,
    {
        Self {
            payload: Arc::new(RenderablePayload(value)),
        }
    }

    /// Wraps one of the taxonomy exceptions.
    #[must_use]
    pub fn from_exception<T: Exception>(exception: T) -> Self {
        Self {
            payload: Arc::new(ExceptionPayload(exception)),
        }
    }

    /// Converts a payload caught by `std::panic::catch_unwind`.
    ///
    /// String payloads (the common `panic!("...")` case) become text defects;
    /// anything else is recorded by description only because the raw payload
    /// is not `Sync`.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match payload.downcast::<&'static str>() {
            Ok(text) => Self::text(*text),
            Err(payload) => match payload.downcast::<String>() {
                Ok(text) => Self::text(*text),
                Err(_) => Self::text("panic with a non-string payload"),
            },
        }
    }

    /// Returns the payload as `T` if that is its concrete type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref::<T>()
    }

    /// Returns true if the payload's concrete type is `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.payload.as_any().is::<T>()
    }

    /// The text of a text defect.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        self.downcast_ref::<&'static str>()
            .copied()
            .or_else(|| self.downcast_ref::<String>().map(String::as_str))
    }

    /// The rendering capability, if the payload offers one.
    #[must_use]
    pub fn as_renderable(&self) -> Option<&dyn AsRenderable> {
        self.payload.renderable()
    }

    /// The taxonomy tag for exception payloads.
    #[must_use]
    pub fn tag(&self) -> Option<&'static str> {
        self.payload
            .key()
            .map(|key| key.tag)
            .filter(|tag| *tag != "text")
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.payload).cast::<()>()
    }
}

impl From<&'static str> for Defect {
    fn from(value: &'static str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Defect {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl PartialEq for Defect {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self.address(), other.address()) {
            return true;
        }
        match (self.payload.key(), other.payload.key()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Defect {}

impl Hash for Defect {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.payload.key() {
            Some(key) => key.hash(state),
            None => (self.address() as usize).hash(state),
        }
    }
}

impl fmt::Debug for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Defect(")?;
        self.payload.describe(f)?;
        write!(f, ")")
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.as_text() {
            return write!(f, "{text}");
        }
        match self.as_renderable() {
            Some(renderable) => {
                let message = renderable.message();
                if message.is_empty() {
                    write!(f, "{}", renderable.name())
                } else {
                    write!(f, "{}: {message}", renderable.name())
                }
            }
            None => self.payload.describe(f),
        }
    }
}

/// `my_crate::io::ReadError<T>` becomes `ReadError`.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
