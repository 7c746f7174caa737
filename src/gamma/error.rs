//! Error types for gamma hierarchy resolution and method options.

use thiserror::Error;

/// Errors raised while opening, resolving or configuring a gamma method.
#[derive(Error, Debug)]
pub enum GammaError {
    /// A site, partition or unit vector could not grow.
    #[error("Out of memory while opening {what}")]
    OutOfMemory { what: &'static str },

    /// A backend failed to open one level of the hierarchy.
    #[error("{method}: {message}")]
    Open {
        method: &'static str,
        message: String,
    },

    /// A selection named a partition the site does not have.
    #[error("{0}")]
    InvalidPartition(String),

    /// A selection named a unit the partition does not have.
    #[error("CRTC {unit} does not exist. {valid}")]
    InvalidUnit { unit: usize, valid: String },

    /// The key is not known to the generic layer nor to the method.
    #[error("Unknown method parameter `{key}' for {method}")]
    UnknownOption { method: &'static str, key: String },

    /// The key is known but its value is malformed.
    #[error("Invalid value `{value}' for {key}: {reason}")]
    InvalidOption {
        key: String,
        value: String,
        reason: String,
    },

    /// A config section index refers to a selection that was never added.
    #[error("No selection with index {0}")]
    NoSuchSelection(usize),

    /// Hardware communication failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl GammaError {
    pub fn open(method: &'static str, message: impl Into<String>) -> Self {
        GammaError::Open {
            method,
            message: message.into(),
        }
    }

    pub fn invalid_option(key: &str, value: &str, reason: impl Into<String>) -> Self {
        GammaError::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for gamma operations.
pub type Result<T> = std::result::Result<T, GammaError>;
