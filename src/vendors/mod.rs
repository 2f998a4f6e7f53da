//! Vendor library implementations

pub mod replay;
pub mod scripted;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::vendor::VendorLibrary;
use crate::{FusionError, Result};

/// Load the vendor library named by `path`
///
/// `.yaml`/`.yml` files are replay scripts and load on every platform. Any
/// other file is treated as the native vendor module, which needs Windows.
pub fn load_library<P: AsRef<Path>>(path: P) -> Result<Arc<dyn VendorLibrary>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(FusionError::load_failed(path, "file not found"));
    }

    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("yaml") | Some("yml") => {
            debug!("Using replay vendor for {}", path.display());
            Ok(Arc::new(replay::load(path)?))
        }
        _ => load_native(path),
    }
}

#[cfg(windows)]
fn load_native(path: &Path) -> Result<Arc<dyn VendorLibrary>> {
    debug!("Using native vendor module {}", path.display());
    Ok(Arc::new(crate::windows::NativeLibrary::load(path)?))
}

#[cfg(not(windows))]
fn load_native(_path: &Path) -> Result<Arc<dyn VendorLibrary>> {
    Err(FusionError::unsupported_platform("Native vendor module", "Windows"))
}
