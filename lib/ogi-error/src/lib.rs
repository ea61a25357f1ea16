use std::fmt::Display;

/// A generic, type-erased error.
///
/// Most fallible operations in the platform return this type when the caller has no reason to
/// match on the failure beyond reporting it. Typed errors (via `snafu`) are reserved for the
/// places where callers make decisions based on the variant.
pub type GenericError = anyhow::Error;

#[doc(hidden)]
pub use anyhow::anyhow as _anyhow;

/// Macro for constructing a [`GenericError`].
///
/// Accepts a string literal, a format string with arguments (in the same order as `std::format!`),
/// or an existing value implementing `Debug` and `Display`. When given a value that implements
/// `std::error::Error`, its source is carried over as the source of the constructed error.
#[macro_export]
macro_rules! generic_error {
    // Forwards to `anyhow::anyhow`. We wrap instead of re-exporting so that callers depend on our
    // vocabulary rather than on `anyhow` directly.
    ($msg:literal $(,)?) => { $crate::_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::_anyhow!($fmt, $($arg)*) };
}

pub(crate) mod private {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

/// Extension trait for attaching context to the error variant of a `Result`.
///
/// These methods are intentionally not named `context`/`with_context`: the crates that use this
/// trait frequently also have `snafu::ResultExt` in scope, and identically-named extension methods
/// on `Result` would force fully-qualified calls at every use site.
pub trait ErrorContext<T, E>: private::Sealed {
    /// Wraps the error value with additional context.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Wraps the error value with additional context that is evaluated lazily, only if an error
    /// does occur.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        <Self as anyhow::Context<T, E>>::context(self, context)
    }

    fn with_error_context<C, F>(self, context: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        <Self as anyhow::Context<T, E>>::with_context(self, context)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn macro_accepts_literal_format_and_error() {
        let from_literal = generic_error!("boom");
        assert_eq!(from_literal.to_string(), "boom");

        let from_format = generic_error!("boom: {}", 42);
        assert_eq!(from_format.to_string(), "boom: 42");

        let io_error = io::Error::new(io::ErrorKind::NotFound, "missing");
        let from_error = generic_error!(io_error);
        assert_eq!(from_error.to_string(), "missing");
    }

    #[test]
    fn error_context_wraps_original_error() {
        let result: Result<(), io::Error> = Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        let wrapped = result.error_context("failed to read marker file").unwrap_err();

        assert_eq!(wrapped.to_string(), "failed to read marker file");
        assert!(wrapped.chain().any(|cause| cause.to_string() == "denied"));
    }

    #[test]
    fn with_error_context_is_lazy_on_success() {
        let result: Result<u32, io::Error> = Ok(31337);
        let value = result
            .with_error_context(|| -> String { panic!("context closure must not run for Ok values") })
            .unwrap();
        assert_eq!(value, 31337);
    }
}
