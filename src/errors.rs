//! Error types for `uidriver`.
//!
//! All failures are funnelled through [`DriverError`], which uses
//! `thiserror` for `Display` and `Error` derives.  The enum is closed: the
//! two query-failure kinds (structural no-match vs matches-but-invisible)
//! are separate variants rather than subclasses.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `uidriver` library.
///
/// Each variant corresponds to a distinct failure family.  Nothing in the
/// crate downgrades one of these to a log line; every failure propagates to
/// the calling test.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Zero nodes satisfied the query.
    #[error("NoMatch: no node matched query `{query}`")]
    NoMatch { query: String },

    /// Nodes satisfied the query, but none of them were visible.
    #[error("NoVisibleMatch: {matched} node(s) matched query `{query}` but none are visible")]
    NoVisibleMatch { query: String, matched: usize },

    /// Malformed caller input: detached scope node, out-of-range window
    /// index, invalid title pattern, matcher applied to an incapable node.
    #[error("ArgumentError: {0}")]
    Argument(String),

    /// A window lookup (by title pattern or scene) found nothing.
    #[error("WindowNotFound: {0}")]
    WindowNotFound(String),

    /// A UI-thread round trip did not complete within its budget.  Fatal
    /// to the triggering call; never retried internally.
    #[error("TimeoutError: UI-thread round trip exceeded {0:?}")]
    Timeout(Duration),

    /// The application under test failed during a lifecycle transition.
    /// The original cause is preserved as the error source.
    #[error("LifecycleError: application failed during {phase}")]
    Lifecycle {
        phase: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The platform robot could not synthesize an input event.
    #[error("InputError: {0}")]
    Input(String),

    /// Pixel capture failure.
    #[error("CaptureError: {0}")]
    Capture(String),

    /// The UI thread is gone (channel disconnected).
    #[error("DispatchError: {0}")]
    Dispatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_failures_are_distinct_variants() {
        let none = DriverError::NoMatch {
            query: "#missing".into(),
        };
        let invisible = DriverError::NoVisibleMatch {
            query: "#hidden".into(),
            matched: 3,
        };
        assert!(none.to_string().contains("no node matched"));
        assert!(invisible.to_string().contains("3 node(s) matched"));
        assert!(invisible.to_string().contains("none are visible"));
    }

    #[test]
    fn test_lifecycle_error_preserves_source() {
        let source: Box<dyn std::error::Error + Send + Sync> =
            "boot sequence exploded".to_string().into();
        let err = DriverError::Lifecycle {
            phase: "start",
            source,
        };
        let cause = std::error::Error::source(&err).expect("source must be preserved");
        assert_eq!(cause.to_string(), "boot sequence exploded");
    }
}
