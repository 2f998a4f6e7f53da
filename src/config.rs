//! Controller and polling configuration
//!
//! Configuration can be built in code or loaded from YAML:
//!
//! ```rust
//! use fusion_reader::{ControllerConfig, SaleQuery};
//!
//! let config = ControllerConfig::from_yaml_str(
//!     r#"
//! address: 192.168.1.100
//! library_path: C:\Wayne\FusionClass.dll
//! call_timeout_secs: 10
//! poll:
//!   interval_secs: 2.5
//!   method: last_sale_on_fusion
//! "#,
//! )?;
//!
//! assert_eq!(config.poll.method, SaleQuery::LastSaleOnFusion);
//! # Ok::<(), fusion_reader::FusionError>(())
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::SaleQuery;
use crate::{FusionError, Result};

/// Default delay between polling iterations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Settings for the new-sale polling loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct PollConfig {
    /// Seconds to sleep between iterations
    pub interval_secs: f64,

    /// Vendor query used on each iteration
    pub method: SaleQuery,

    /// Stop after this many iterations; `None` polls until cancelled
    pub max_iterations: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs_f64(),
            method: SaleQuery::LastSale,
            max_iterations: None,
        }
    }
}

impl PollConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_secs = interval.as_secs_f64();
        self
    }

    pub fn with_method(mut self, method: SaleQuery) -> Self {
        self.method = method;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Interval as a `Duration`, falling back to the default if invalid
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    /// Reject intervals that are not a positive, representable duration
    pub fn validate(&self) -> Result<()> {
        if positive_duration(self.interval_secs).is_none() {
            return Err(FusionError::config_error(format!(
                "poll interval must be a positive number of seconds, got {}",
                self.interval_secs
            )));
        }
        Ok(())
    }
}

/// Runtime options for a controller client
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerOptions {
    /// Upper bound on a single vendor call; `None` waits indefinitely
    pub call_timeout: Option<Duration>,
}

/// Everything needed to build a [`FusionController`](crate::FusionController)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Network address of the controller
    pub address: String,

    /// Vendor module to load: the native module, or a `.yaml` replay script
    pub library_path: PathBuf,

    #[serde(default)]
    pub call_timeout_secs: Option<f64>,

    #[serde(default)]
    pub poll: PollConfig,
}

impl ControllerConfig {
    pub fn new(address: impl Into<String>, library_path: impl Into<PathBuf>) -> Self {
        Self {
            address: address.into(),
            library_path: library_path.into(),
            call_timeout_secs: None,
            poll: PollConfig::default(),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file
    ///
    /// A relative `library_path` is resolved against the file's directory.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| FusionError::file_error(path.to_path_buf(), e))?;
        let mut config = Self::from_yaml_str(&yaml)?;
        if config.library_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.library_path = dir.join(&config.library_path);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(FusionError::config_error("controller address is empty"));
        }
        if self.library_path.as_os_str().is_empty() {
            return Err(FusionError::config_error("vendor module path is empty"));
        }
        if let Some(secs) = self.call_timeout_secs {
            if positive_duration(secs).is_none() {
                return Err(FusionError::config_error(format!(
                    "call timeout must be a positive number of seconds, got {}",
                    secs
                )));
            }
        }
        self.poll.validate()
    }

    /// Client options derived from this configuration
    pub fn options(&self) -> ControllerOptions {
        ControllerOptions {
            call_timeout: self.call_timeout_secs.and_then(positive_duration),
        }
    }
}

/// Seconds as a non-zero `Duration`, if they fit in one
fn positive_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok().filter(|d| !d.is_zero())
}
