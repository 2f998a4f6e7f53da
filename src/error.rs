//! Error types for controller access.
//!
//! Every failure surfaced by this crate is a [`FusionError`]. Errors fall into
//! a small taxonomy, exposed through [`FusionError::kind`]:
//!
//! - **LoadFailure**: the vendor integration module could not be located or
//!   initialized. Raised at construction time, never retried automatically.
//! - **ConnectionFailure**: the session to the controller could not be
//!   established, or a read was attempted without an open session.
//! - **OperationFailure**: a read reached the vendor layer and the vendor
//!   reported an error (including timeouts and unparseable vendor strings).
//!
//! "No sale yet" is not an error: reads return `Ok(None)` for it.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use fusion_reader::{ErrorKind, FusionError};
//!
//! let error = FusionError::connection_failed("controller unreachable");
//! assert_eq!(error.kind(), ErrorKind::Connection);
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::ConnectionState;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for controller operations.
pub type Result<T, E = FusionError> = std::result::Result<T, E>;

/// Boxed error used as the source of vendor-originated failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Coarse classification of a [`FusionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The vendor integration module could not be loaded.
    Load,
    /// No usable session with the controller.
    Connection,
    /// The vendor reported a failure for an individual call.
    Operation,
    /// Invalid or unreadable configuration.
    Configuration,
}

/// Main error type for controller operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FusionError {
    #[error("Failed to load vendor module {path}: {reason}")]
    Load {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to connect to Fusion controller: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Not connected to controller (state: {state:?}); call connect() first")]
    NotConnected { state: ConnectionState },

    #[error("Vendor call {operation} failed: {details}")]
    Operation {
        operation: String,
        details: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Vendor call {operation} timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Configuration file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl FusionError {
    /// Classify this error into the load/connection/operation taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FusionError::Load { .. } => ErrorKind::Load,
            FusionError::UnsupportedPlatform { .. } => ErrorKind::Load,
            #[cfg(windows)]
            FusionError::WindowsApi { .. } => ErrorKind::Load,
            FusionError::Connection { .. } => ErrorKind::Connection,
            FusionError::NotConnected { .. } => ErrorKind::Connection,
            FusionError::Operation { .. } => ErrorKind::Operation,
            FusionError::Timeout { .. } => ErrorKind::Operation,
            FusionError::Parse { .. } => ErrorKind::Operation,
            FusionError::Config { .. } => ErrorKind::Configuration,
            FusionError::File { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            FusionError::Connection { .. } => true,
            FusionError::Operation { .. } => true,
            FusionError::Timeout { .. } => true,
            FusionError::NotConnected { .. } => false,
            FusionError::Load { .. } => false,
            FusionError::Parse { .. } => false,
            FusionError::Config { .. } => false,
            FusionError::File { .. } => false,
            FusionError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            FusionError::WindowsApi { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            FusionError::Load { .. } => vec![
                "Check the vendor module path",
                "Install the Visual Studio 2013 redistributable required by the vendor module",
                "Verify the module matches the process architecture (32/64-bit)",
            ],
            FusionError::Connection { .. } => vec![
                "Check the controller address",
                "Verify the controller is reachable on the network",
                "Confirm no other client holds the controller session",
            ],
            FusionError::NotConnected { .. } => vec![
                "Call connect() before reading",
                "Create a new controller after disconnect()",
            ],
            FusionError::Operation { .. } => vec![
                "Retry the call",
                "Check the controller event log",
            ],
            FusionError::Timeout { .. } => vec![
                "Increase the call timeout",
                "Check network latency to the controller",
            ],
            FusionError::Parse { .. } => vec![
                "Check the controller firmware version",
                "Inspect the raw vendor string in the logs",
            ],
            FusionError::Config { .. } => vec![
                "Check the configuration values",
                "Compare against the documented configuration keys",
            ],
            FusionError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            FusionError::UnsupportedPlatform { .. } => vec![
                "Use a replay script (.yaml) on this platform",
                "Run on Windows to use the native vendor module",
            ],
            #[cfg(windows)]
            FusionError::WindowsApi { .. } => vec![
                "Check the module exports the expected fusion_* symbols",
                "Verify the module dependencies are installed",
            ],
        }
    }

    /// Helper constructor for vendor module load errors.
    pub fn load_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FusionError::Load { path: path.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        FusionError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(reason: impl Into<String>, source: BoxError) -> Self {
        FusionError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for vendor call failures.
    pub fn operation_failed(operation: impl Into<String>, details: impl Into<String>) -> Self {
        FusionError::Operation { operation: operation.into(), details: details.into(), source: None }
    }

    /// Helper constructor for parse errors on vendor strings.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        FusionError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(details: impl Into<String>) -> Self {
        FusionError::Config { details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        FusionError::File { path, source }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        FusionError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        FusionError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

impl From<serde_yaml_ng::Error> for FusionError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        FusionError::Config { details: err.to_string() }
    }
}

#[cfg(windows)]
impl From<core::Error> for FusionError {
    fn from(err: core::Error) -> Self {
        FusionError::WindowsApi {
            operation: "Unknown Windows operation".to_string(),
            source: err,
        }
    }
}
