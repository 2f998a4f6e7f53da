//! Test utilities for fixture lookup and scripted controllers

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ControllerOptions;
use crate::controller::FusionController;
use crate::types::SaleRecord;
use crate::vendors::scripted::ScriptedLibrary;

/// Error returned when a required fixture cannot be located.
#[derive(Debug, Clone)]
pub struct FixtureError {
    message: String,
}

impl std::fmt::Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FixtureError {}

/// The crate's `test-data/` directory
pub fn test_data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test-data")
}

/// Require that a fixture exists under `test-data/` and return its path.
pub fn require_fixture<P: AsRef<Path>>(relative: P) -> Result<PathBuf, FixtureError> {
    let path = test_data_dir().join(relative.as_ref());
    if path.exists() {
        Ok(path)
    } else {
        Err(FixtureError { message: format!("Missing fixture: {}", path.display()) })
    }
}

/// A minimal sale identified by its transaction id
pub fn sale(transaction_id: &str) -> SaleRecord {
    SaleRecord::new().with("TransactionId", transaction_id)
}

/// A controller over `library`, already connected
pub async fn connected(library: &ScriptedLibrary) -> FusionController {
    let controller = FusionController::with_library(
        "10.0.0.1",
        Arc::new(library.clone()),
        ControllerOptions::default(),
    );
    assert!(controller.connect().await.expect("scripted connect"), "scripted session declined");
    controller
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_exists() {
        let dir = test_data_dir();
        assert!(dir.is_dir(), "test-data should be a directory: {}", dir.display());
    }

    #[test]
    fn missing_fixture_names_the_path() {
        let err = require_fixture("replay/missing.yaml").unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }
}
