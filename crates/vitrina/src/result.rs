//! Result and error types for Vitrina.

use thiserror::Error;

/// Result type for Vitrina operations
pub type VitrinaResult<T> = Result<T, VitrinaError>;

/// Errors that can occur while driving a storefront
#[derive(Debug, Error)]
pub enum VitrinaError {
    /// A bounded wait elapsed before its condition held
    #[error("timed out after {ms}ms waiting for {waiting_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// What the wait was observing
        waiting_for: String,
    },

    /// A required form field never became actionable
    #[error("required field '{field}' never became actionable ({selector})")]
    FieldNotFound {
        /// Logical field name
        field: String,
        /// Selector that failed to resolve
        selector: String,
    },

    /// A select control has no option with the requested label or value
    #[error("no option matching '{requested}' in {control}")]
    InvalidOption {
        /// Selector of the select control
        control: String,
        /// Requested label or value
        requested: String,
    },

    /// Navigation failed
    #[error("navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Engine-level failure (element lookup, dispatch, protocol)
    #[error("driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Browser executable not found
    #[error("browser not found; install Chromium or set the executable path")]
    BrowserNotFound,

    /// Browser launch error
    #[error("failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },
}

impl VitrinaError {
    /// Construct a timeout error
    pub fn timeout(ms: u64, waiting_for: impl Into<String>) -> Self {
        Self::Timeout {
            ms,
            waiting_for: waiting_for.into(),
        }
    }

    /// Construct a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// True when this error is a wait bound being exceeded.
    ///
    /// Fallback paths key off this: a timeout means "the UI never caught up",
    /// which is recoverable by another route, while the other variants mean
    /// the page no longer matches the expected structure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_recoverable_marker() {
        let err = VitrinaError::timeout(5000, "minicart checkout button");
        assert!(err.is_timeout());
        assert!(err.to_string().contains("5000ms"));
        assert!(err.to_string().contains("minicart checkout button"));
    }

    #[test]
    fn structural_errors_are_not_timeouts() {
        let err = VitrinaError::InvalidOption {
            control: "select[name=\"region_id\"]".to_string(),
            requested: "Cluj".to_string(),
        };
        assert!(!err.is_timeout());

        let err = VitrinaError::FieldNotFound {
            field: "email".to_string(),
            selector: "#customer-email".to_string(),
        };
        assert!(!err.is_timeout());
    }
}
