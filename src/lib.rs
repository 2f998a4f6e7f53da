//! Client library for Wayne Fusion fuel-station controllers.
//!
//! Fusion reader connects to a controller through the vendor's integration
//! module and reads completed sales. The controller has no push interface,
//! so new sales are detected by polling.
//!
//! # Features
//!
//! - **Sales**: last sale, sale by hose and number, a day's sales per hose
//! - **Products**: grade names and per-grade period totals
//! - **Polling**: change detection with a callback, or a spawned poller
//!   with a sale stream
//! - **Replay**: YAML-scripted vendor for use off Windows and in tests
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fusion_reader::{ControllerConfig, FusionController};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> fusion_reader::Result<()> {
//!     let config = ControllerConfig::from_yaml_file("fusion.yaml")?;
//!     let controller = FusionController::new(&config)?;
//!
//!     if !controller.connect().await? {
//!         eprintln!("controller declined the session");
//!         return Ok(());
//!     }
//!
//!     let cancel = CancellationToken::new();
//!     controller
//!         .poll_for_new_sales(&config.poll, &cancel, |sale| println!("New sale: {}", sale))
//!         .await?;
//!
//!     controller.disconnect().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod period;
#[cfg(test)]
mod test_utils;
pub mod types;

// Vendor boundary
pub mod vendor;
pub mod vendors;

// Client
pub mod controller;
pub mod poller;

// Platform-specific modules
#[cfg(windows)]
pub mod windows;

pub use config::*;
pub use controller::FusionController;
pub use error::*;
pub use poller::{PollSummary, PollerHandle, SaleStream, SaleTracker};
pub use types::*;
pub use vendor::{VendorLibrary, VendorSession};
