//! Product and period total types

use serde::{Deserialize, Serialize};

/// Number of grade slots a Fusion controller exposes
pub const DEFAULT_GRADE_COUNT: u32 = 8;

/// A product configured on a controller grade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Product {
    /// Grade number (1-based)
    pub grade: u32,
    /// Product name as configured on the controller
    pub name: String,
}

/// Accumulated totals for one grade over a controller period
///
/// Values are kept as the vendor reports them; no unit or currency
/// interpretation happens here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct GradeTotals {
    pub grade: String,
    pub money: Option<String>,
    pub volume: Option<String>,
}
