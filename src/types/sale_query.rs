//! Selection between the two vendor last-sale queries

use serde::{Deserialize, Serialize};

/// Which vendor query a read or a polling loop uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SaleQuery {
    /// The vendor's `GetLastSale` method
    #[default]
    LastSale,

    /// The vendor's `GetLastSaleOnFusion` method
    /// May report differently shaped or differently timed data than `LastSale`
    LastSaleOnFusion,
}

impl SaleQuery {
    /// Vendor method name, used in logs and error context
    pub fn vendor_method(self) -> &'static str {
        match self {
            SaleQuery::LastSale => "GetLastSale",
            SaleQuery::LastSaleOnFusion => "GetLastSaleOnFusion",
        }
    }

    /// Build from the legacy `use_fusion_method` flag
    pub fn from_fusion_flag(use_fusion_method: bool) -> Self {
        if use_fusion_method { SaleQuery::LastSaleOnFusion } else { SaleQuery::LastSale }
    }
}
