//! Logging for results that are handled by carrying on.
//!
//! Pollers, refreshes and other background tasks have no caller to return
//! an error to. They log it with the call site and move on.

use std::fmt::Display;
use tracing::error;

/// Adds `log` to `Result`.
pub trait ResultExt<T, E> {
    /// Log the error with `context` and the caller's location, then return
    /// the result unchanged.
    ///
    /// ```ignore
    /// use launchpad_control_plane::result_ext::ResultExt;
    ///
    /// let _ = ledger.attach_detail(name, field, details).await.log("attach details");
    /// ```
    fn log<S: ToString>(self, context: S) -> Result<T, E>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log<S: ToString>(self, context: S) -> Result<T, E> {
        if let Err(ref e) = self {
            let caller_location = std::panic::Location::caller();
            error!(
                target: "launchpad_control_plane",
                error = %e,
                file = %format!("{}:{}", caller_location.file(), caller_location.line()),
                context = %context.to_string(),
                "Operation failed"
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::UpstreamError;

    #[test]
    fn test_ok_passes_through() {
        let result: Result<u16, UpstreamError> = Ok(202);
        assert_eq!(result.log("create deployment").unwrap(), 202);
    }

    #[test]
    fn test_err_is_returned_unchanged() {
        let result: Result<(), UpstreamError> = Err(UpstreamError::new(503, "unavailable"));
        let logged = result.log("fetch addon");
        assert_eq!(logged.unwrap_err(), UpstreamError::new(503, "unavailable"));
    }
}
