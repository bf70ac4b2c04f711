//! This module defines all error types used throughout the crate.

use std::io;
use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A state description does not match `NAME` or `NAME -> INITIAL`
    #[error("badly formatted state description \"{0}\"")]
    MalformedDescription(String),

    /// A node name or alias is empty or whitespace
    #[error("invalid node name: {0:?}")]
    InvalidName(String),

    /// Two nodes registered the same name or alias
    #[error("cannot register duplicate name to same root: \"{0}\"")]
    DuplicateName(String),

    /// A reference-by-name matched no registered name or alias
    #[error("graph contains {count} unresolved reference{} to \"{target}\"", plural(.count))]
    UnresolvedReference { count: usize, target: String },

    /// A compound state was declared without an initial substate
    #[error("compound state \"{0}\" requires an initial substate")]
    MissingInitialSubstate(String),

    /// The declared initial substate is not an immediate substate
    #[error("\"{initial}\" is not a valid initial state for \"{state}\"")]
    InvalidInitialSubstate { initial: String, state: String },

    /// A transition target is not registered in this chart, or is registered to another state
    #[error("state does not match registered state \"{0}\"")]
    UnknownOrMismatchedState(String),

    /// A history pseudostate was entered before its subtree was ever active
    #[error("no history saved for state \"{0}\"")]
    NoHistoryRecorded(String),

    /// Chart declaration file errors
    #[error("Chart declaration error: {0}")]
    Declaration(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The proxy task is no longer running
    #[error("Proxy driver has stopped")]
    DriverClosed,

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),

    /// Wrapped anyhow errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn plural(count: &usize) -> &'static str {
    if *count > 1 { "s" } else { "" }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a custom error with a message
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create a declaration error
    pub fn declaration(msg: impl Into<String>) -> Self {
        Self::Declaration(msg.into())
    }

    /// Errors that abort chart construction; a chart that produced one must not be used
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::MalformedDescription(_)
                | Error::InvalidName(_)
                | Error::DuplicateName(_)
                | Error::UnresolvedReference { .. }
                | Error::MissingInitialSubstate(_)
                | Error::InvalidInitialSubstate { .. }
        )
    }

    /// Runtime errors that indicate a corrupted chart reference rather than an operating condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::UnknownOrMismatchedState(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Declaration(format!("TOML error: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Declaration(format!("JSON error: {}", err))
    }
}

// Helper macros for creating errors

/// Create a custom error with formatting
#[macro_export]
macro_rules! custom_error {
    ($($arg:tt)*) => {
        $crate::error::Error::Custom(format!($($arg)*))
    };
}

/// Bail with a custom error message
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::custom_error!($($arg)*))
    };
}

/// Ensure a condition is true or return error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::custom("test error");
        assert_eq!(err.to_string(), "test error");

        let err = Error::declaration("missing description");
        assert_eq!(
            err.to_string(),
            "Chart declaration error: missing description"
        );
    }

    #[test]
    fn test_unresolved_reference_pluralizes() {
        let one = Error::UnresolvedReference {
            count: 1,
            target: "IDLE".to_string(),
        };
        assert_eq!(
            one.to_string(),
            "graph contains 1 unresolved reference to \"IDLE\""
        );

        let many = Error::UnresolvedReference {
            count: 3,
            target: "IDLE".to_string(),
        };
        assert_eq!(
            many.to_string(),
            "graph contains 3 unresolved references to \"IDLE\""
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::DuplicateName("A".into()).is_construction());
        assert!(!Error::NoHistoryRecorded("A".into()).is_construction());
        assert!(Error::UnknownOrMismatchedState("A".into()).is_fatal());
        assert!(!Error::NoHistoryRecorded("A".into()).is_fatal());
    }

    fn check_positive(value: i32) -> Result<i32> {
        crate::ensure!(value > 0, "value {} is not positive", value);
        Ok(value)
    }

    #[test]
    fn test_ensure_macro() {
        assert_eq!(check_positive(2).unwrap(), 2);
        let err = check_positive(-1).unwrap_err();
        assert_eq!(err.to_string(), "value -1 is not positive");
    }
}
