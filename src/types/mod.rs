//! Core types for controller data.
//!
//! - [`SaleRecord`] is the opaque field mapping returned by every sale read
//! - [`SaleObject`] is the capability interface vendor sale objects implement
//! - [`ConnectionState`] tracks the `Unopened -> Open -> Closed` lifecycle
//! - [`SaleQuery`] selects between the two vendor last-sale methods
//!
//! ## Usage Example
//!
//! ```rust
//! use fusion_reader::types::{FieldValue, SaleRecord};
//!
//! let sale = SaleRecord::new()
//!     .with("TransactionId", "000412")
//!     .with("PumpNumber", 3)
//!     .with("Volume", 25.4);
//!
//! assert_eq!(sale.get("PumpNumber"), Some(&FieldValue::Integer(3)));
//! assert_eq!(sale.len(), 3);
//! ```

mod connection_state;
mod product;
mod sale;
mod sale_query;

pub use connection_state::ConnectionState;
pub use product::{DEFAULT_GRADE_COUNT, GradeTotals, Product};
pub use sale::{FieldValue, SaleObject, SaleRecord};
pub use sale_query::SaleQuery;
