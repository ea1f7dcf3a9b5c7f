//! Result extension traits for logging failures with their call site.
//!
//! Side effects of a registration (mail, chat posts) must never fail the
//! request, so their results are logged and then dropped. `log` is for
//! errors that still propagate; `log_warn` is for the ones swallowed.

use std::fmt::Display;
use std::panic::Location;

/// Extension trait for logging errors with context.
pub trait ResultExt<T, E> {
    /// Log the error at `error` level if this is an `Err` variant.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use hades::result_ext::ResultExt;
    ///
    /// let rows = queries::list_records::<TestTable>(&pool)
    ///     .await
    ///     .log("listing test_users")?;
    /// ```
    fn log<S: ToString>(self, context: S) -> Result<T, E>;

    /// Log the error at `warn` level and convert into an `Option`.
    fn log_warn<S: ToString>(self, context: S) -> Option<T>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log<S: ToString>(self, context: S) -> Result<T, E> {
        if let Err(ref e) = self {
            let caller = Location::caller();
            tracing::error!(
                target: "hades",
                error = %e,
                file = %format!("{}:{}", caller.file(), caller.line()),
                context = %context.to_string(),
                "Operation failed"
            );
        }
        self
    }

    #[track_caller]
    fn log_warn<S: ToString>(self, context: S) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                let caller = Location::caller();
                tracing::warn!(
                    target: "hades",
                    error = %e,
                    file = %format!("{}:{}", caller.file(), caller.line()),
                    context = %context.to_string(),
                    "Operation failed, continuing"
                );
                None
            }
        }
    }
}

/// Extension trait for logging a missing value.
pub trait OptionResultExt<T> {
    /// Log if this is a `None` variant.
    fn log_none<S: ToString>(self, context: S) -> Option<T>;
}

impl<T> OptionResultExt<T> for Option<T> {
    #[track_caller]
    fn log_none<S: ToString>(self, context: S) -> Option<T> {
        if self.is_none() {
            let caller = Location::caller();
            tracing::warn!(
                target: "hades",
                file = %format!("{}:{}", caller.file(), caller.line()),
                context = %context.to_string(),
                "Expected value was None"
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_ext_ok() {
        let result: Result<i32, &str> = Ok(42);
        assert_eq!(result.log("test context").unwrap(), 42);
    }

    #[test]
    fn test_result_ext_err() {
        let result: Result<i32, &str> = Err("test error");
        assert!(result.log("test context").is_err());
    }

    #[test]
    fn test_log_warn_drops_error() {
        let result: Result<i32, &str> = Err("mail rejected");
        assert_eq!(result.log_warn("sending mail"), None);

        let result: Result<i32, &str> = Ok(1);
        assert_eq!(result.log_warn("sending mail"), Some(1));
    }

    #[test]
    fn test_option_ext_none() {
        let opt: Option<i32> = None;
        assert!(opt.log_none("test context").is_none());
    }
}
