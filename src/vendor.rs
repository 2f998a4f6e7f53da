//! Vendor integration boundary

use crate::Result;
use crate::types::SaleObject;

/// A loaded vendor integration module
///
/// Libraries abstract over where the controller protocol actually lives
/// (the native vendor module, a replay script, an in-memory script). Loading
/// happens when the library value is built; a library only hands out
/// sessions.
pub trait VendorLibrary: Send + Sync + 'static {
    /// Human-readable origin of this library, used in logs
    fn describe(&self) -> String;

    /// Obtain a controller handle for the given address
    ///
    /// The handle is not connected yet; see [`VendorSession::connect`].
    fn open_session(&self, address: &str) -> Result<Box<dyn VendorSession>>;
}

/// A controller handle owned exclusively by one controller client
///
/// All calls are synchronous and may block on the network. The client runs
/// them on the blocking thread pool. Dropping the session releases the
/// vendor handle.
pub trait VendorSession: Send + 'static {
    /// Establish the session
    ///
    /// Returns:
    /// - `Ok(true)` - Session established
    /// - `Ok(false)` - The controller declined the session
    /// - `Err(e)` - Endpoint unreachable or the vendor raised
    fn connect(&mut self) -> Result<bool>;

    /// Tear the session down
    fn disconnect(&mut self) -> Result<()>;

    /// The vendor's `GetLastSale` query
    ///
    /// Returns `Ok(None)` when the controller has no sale yet.
    fn last_sale(&mut self) -> Result<Option<Box<dyn SaleObject>>>;

    /// The vendor's `GetLastSaleOnFusion` query
    fn last_sale_on_fusion(&mut self) -> Result<Option<Box<dyn SaleObject>>>;

    /// A specific sale on a hose, `sale_number == 0` for the latest
    fn sale(&mut self, hose_id: u32, sale_number: u32) -> Result<Option<Box<dyn SaleObject>>>;

    /// Product name configured on a grade, `None` when unconfigured
    fn grade(&mut self, grade: u32) -> Result<Option<String>>;

    /// Raw period status string (`KEY=VALUE|KEY=VALUE|...`)
    fn period_status(&mut self) -> Result<Option<String>>;

    /// Raw period sales by grade string for a period type and id
    fn period_sales_by_grade(
        &mut self,
        period_type: char,
        period_id: &str,
    ) -> Result<Option<String>>;
}
