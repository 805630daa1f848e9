//! The small exception taxonomy used for defects raised by the runtime.
//!
//! Each exception is a plain error type with a stable tag. They enter a
//! cause as [`Defect`]s and are recognised again with the `is_*`
//! refinements, which look at the payload's concrete type.

use core::fmt;
use std::any::Any;
use std::borrow::Cow;

use thiserror::Error;

use super::defect::{AsRenderable, Defect, SpanAnnotation};

/// Common surface of the taxonomy.
pub trait Exception: AsRenderable + fmt::Debug + Any {
    /// Stable discriminator, also used as the rendered name.
    const TAG: &'static str;

    /// The message given at construction; may be empty.
    fn message(&self) -> &str;
}

macro_rules! exception {
    ($(#[$meta:meta])* $name:ident, $is_fn:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Error)]
        #[error("{message}")]
        pub struct $name {
            message: String,
            span: Option<SpanAnnotation>,
        }

        impl $name {
            /// Stable tag for this exception.
            pub const TAG: &'static str = stringify!($name);

            /// Creates the exception with a message.
            #[must_use]
            pub fn new(message: impl Into<String>) -> Self {
                Self {
                    message: message.into(),
                    span: None,
                }
            }

            /// Attaches the span that was active when it was raised.
            #[must_use]
            pub fn with_span(mut self, span: SpanAnnotation) -> Self {
                self.span = Some(span);
                self
            }

            /// The message.
            #[must_use]
            pub fn message(&self) -> &str {
                &self.message
            }
        }

        impl Exception for $name {
            const TAG: &'static str = stringify!($name);

            fn message(&self) -> &str {
                &self.message
            }
        }

        impl AsRenderable for $name {
            fn name(&self) -> Cow<'_, str> {
                Cow::Borrowed(Self::TAG)
            }

            fn message(&self) -> Cow<'_, str> {
                Cow::Borrowed(&self.message)
            }

            fn span(&self) -> Option<&SpanAnnotation> {
                self.span.as_ref()
            }
        }

        impl From<$name> for Defect {
            fn from(value: $name) -> Self {
                Defect::from_exception(value)
            }
        }

        #[doc = concat!("Returns true if the defect is a [`", stringify!($name), "`].")]
        #[must_use]
        pub fn $is_fn(defect: &Defect) -> bool {
            defect.is::<$name>()
        }
    };
}

exception!(
    /// Generic unexpected runtime failure.
    RuntimeException,
    is_runtime_exception
);

exception!(
    /// Raised when a failure has to be expressed as a defect but the cause
    /// held only interruptions.
    InterruptedException,
    is_interrupted_exception
);

exception!(
    /// An argument was outside the accepted domain.
    IllegalArgumentException,
    is_illegal_argument_exception
);

exception!(
    /// A lookup found nothing.
    NoSuchElementException,
    is_no_such_element_exception
);

exception!(
    /// A pub/sub hub was created with an unusable capacity.
    InvalidPubSubCapacityException,
    is_invalid_pub_sub_capacity_exception
);
