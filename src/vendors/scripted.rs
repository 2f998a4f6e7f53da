//! In-memory scripted vendor
//!
//! Plays back a fixed script of vendor responses. Used as the vendor stub in
//! tests and as the backing store of replay scripts.
//!
//! ```rust
//! use fusion_reader::vendors::scripted::{ScriptStep, ScriptedLibrary};
//! use fusion_reader::SaleRecord;
//!
//! let library = ScriptedLibrary::new()
//!     .with_last_sales([
//!         ScriptStep::NoSale,
//!         ScriptStep::Sale(SaleRecord::new().with("TransactionId", 1)),
//!     ])
//!     .with_grade(1, "Super");
//! assert_eq!(library.stats().queries, 0);
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::types::{SaleObject, SaleRecord};
use crate::vendor::{VendorLibrary, VendorSession};
use crate::{FusionError, Result};

/// One scripted response to a last-sale query
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// The vendor returns this sale
    Sale(SaleRecord),
    /// The vendor reports no sale
    NoSale,
    /// The vendor call fails
    Fail(String),
    /// The vendor reports the controller link is gone
    ConnectionLost(String),
}

/// Sequence of steps; the final step repeats once the sequence is exhausted
#[derive(Debug, Default)]
struct Script {
    steps: Vec<ScriptStep>,
    cursor: usize,
}

impl Script {
    fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self { steps: steps.into_iter().collect(), cursor: 0 }
    }

    fn next_step(&mut self) -> ScriptStep {
        let Some(last) = self.steps.len().checked_sub(1) else {
            return ScriptStep::NoSale;
        };
        let step = self.steps[self.cursor.min(last)].clone();
        self.cursor += 1;
        step
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    last_sale: Script,
    last_sale_on_fusion: Script,
    hoses: BTreeMap<u32, Vec<SaleRecord>>,
    grades: BTreeMap<u32, String>,
    period_status: Option<String>,
    period_sales: Option<String>,
    connect_outcome: ConnectOutcome,
}

#[derive(Debug, Clone, Default)]
enum ConnectOutcome {
    #[default]
    Accept,
    Decline,
    Fail(String),
}

#[derive(Debug, Default)]
struct Counters {
    sessions_opened: AtomicUsize,
    sessions_released: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    queries: AtomicUsize,
}

/// Snapshot of how a [`ScriptedLibrary`] has been used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VendorStats {
    pub sessions_opened: usize,
    pub sessions_released: usize,
    pub connects: usize,
    pub disconnects: usize,
    /// Read calls of any kind (sales, grades, period reports)
    pub queries: usize,
}

/// Vendor library backed by an in-memory script
///
/// Clones share the same script and counters.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLibrary {
    state: Arc<Mutex<ScriptState>>,
    counters: Arc<Counters>,
}

impl ScriptedLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses to `GetLastSale`, one per call
    pub fn with_last_sales(self, steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        self.state().last_sale = Script::new(steps);
        self
    }

    /// Responses to `GetLastSaleOnFusion`, one per call
    pub fn with_last_sales_on_fusion(self, steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        self.state().last_sale_on_fusion = Script::new(steps);
        self
    }

    /// Sales recorded on a hose; the sale at index `i` has sale number `i + 1`
    pub fn with_hose_sales(self, hose_id: u32, sales: impl IntoIterator<Item = SaleRecord>) -> Self {
        self.state().hoses.insert(hose_id, sales.into_iter().collect());
        self
    }

    pub fn with_grade(self, grade: u32, name: impl Into<String>) -> Self {
        self.state().grades.insert(grade, name.into());
        self
    }

    pub fn with_period_status(self, status: impl Into<String>) -> Self {
        self.state().period_status = Some(status.into());
        self
    }

    pub fn with_period_sales(self, sales: impl Into<String>) -> Self {
        self.state().period_sales = Some(sales.into());
        self
    }

    /// Sessions from this library are declined by the controller
    pub fn declining_connections(self) -> Self {
        self.state().connect_outcome = ConnectOutcome::Decline;
        self
    }

    /// Connect attempts fail as if the endpoint were unreachable
    pub fn failing_connections(self, reason: impl Into<String>) -> Self {
        self.state().connect_outcome = ConnectOutcome::Fail(reason.into());
        self
    }

    /// Usage counters so far
    pub fn stats(&self) -> VendorStats {
        let c = &self.counters;
        VendorStats {
            sessions_opened: c.sessions_opened.load(Ordering::SeqCst),
            sessions_released: c.sessions_released.load(Ordering::SeqCst),
            connects: c.connects.load(Ordering::SeqCst),
            disconnects: c.disconnects.load(Ordering::SeqCst),
            queries: c.queries.load(Ordering::SeqCst),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VendorLibrary for ScriptedLibrary {
    fn describe(&self) -> String {
        "scripted vendor".to_string()
    }

    fn open_session(&self, address: &str) -> Result<Box<dyn VendorSession>> {
        self.counters.sessions_opened.fetch_add(1, Ordering::SeqCst);
        trace!(address, "Scripted session opened");
        Ok(Box::new(ScriptedSession { library: self.clone(), connected: false }))
    }
}

struct ScriptedSession {
    library: ScriptedLibrary,
    connected: bool,
}

impl ScriptedSession {
    fn query(&self, operation: &str) -> Result<MutexGuard<'_, ScriptState>> {
        self.library.counters.queries.fetch_add(1, Ordering::SeqCst);
        if !self.connected {
            return Err(FusionError::operation_failed(operation, "session is not connected"));
        }
        Ok(self.library.state())
    }

    fn play(operation: &str, step: ScriptStep) -> Result<Option<Box<dyn SaleObject>>> {
        match step {
            ScriptStep::Sale(sale) => Ok(Some(Box::new(sale))),
            ScriptStep::NoSale => Ok(None),
            ScriptStep::Fail(details) => Err(FusionError::operation_failed(operation, details)),
            ScriptStep::ConnectionLost(reason) => Err(FusionError::connection_failed(reason)),
        }
    }
}

impl VendorSession for ScriptedSession {
    fn connect(&mut self) -> Result<bool> {
        self.library.counters.connects.fetch_add(1, Ordering::SeqCst);
        let outcome = self.library.state().connect_outcome.clone();
        match outcome {
            ConnectOutcome::Accept => {
                self.connected = true;
                Ok(true)
            }
            ConnectOutcome::Decline => Ok(false),
            ConnectOutcome::Fail(reason) => Err(FusionError::connection_failed(reason)),
        }
    }

    fn disconnect(&mut self) -> Result<()> {
        self.library.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        Ok(())
    }

    fn last_sale(&mut self) -> Result<Option<Box<dyn SaleObject>>> {
        let step = self.query("GetLastSale")?.last_sale.next_step();
        Self::play("GetLastSale", step)
    }

    fn last_sale_on_fusion(&mut self) -> Result<Option<Box<dyn SaleObject>>> {
        let step = self.query("GetLastSaleOnFusion")?.last_sale_on_fusion.next_step();
        Self::play("GetLastSaleOnFusion", step)
    }

    fn sale(&mut self, hose_id: u32, sale_number: u32) -> Result<Option<Box<dyn SaleObject>>> {
        let state = self.query("GetSale")?;
        let Some(sales) = state.hoses.get(&hose_id) else {
            return Ok(None);
        };
        let sale = match sale_number {
            0 => sales.last(),
            n => sales.get(n as usize - 1),
        };
        Ok(sale.cloned().map(|s| Box::new(s) as Box<dyn SaleObject>))
    }

    fn grade(&mut self, grade: u32) -> Result<Option<String>> {
        Ok(self.query("GetGrade")?.grades.get(&grade).cloned())
    }

    fn period_status(&mut self) -> Result<Option<String>> {
        Ok(self.query("PeriodStatusRequest")?.period_status.clone())
    }

    fn period_sales_by_grade(
        &mut self,
        period_type: char,
        period_id: &str,
    ) -> Result<Option<String>> {
        trace!(%period_type, period_id, "Scripted period sales request");
        Ok(self.query("PeriodSalesByGrade")?.period_sales.clone())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.library.counters.sessions_released.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64) -> SaleRecord {
        SaleRecord::new().with("TransactionId", id)
    }

    fn unwrap_sale(sale: Option<Box<dyn SaleObject>>) -> Option<SaleRecord> {
        sale.map(|s| SaleRecord::from_object(s.as_ref()))
    }

    #[test]
    fn final_step_repeats() {
        let mut script = Script::new([ScriptStep::NoSale, ScriptStep::Sale(record(1))]);
        assert_eq!(script.next_step(), ScriptStep::NoSale);
        assert_eq!(script.next_step(), ScriptStep::Sale(record(1)));
        assert_eq!(script.next_step(), ScriptStep::Sale(record(1)));
    }

    #[test]
    fn empty_script_reports_no_sale() {
        let mut script = Script::default();
        assert_eq!(script.next_step(), ScriptStep::NoSale);
    }

    #[test]
    fn session_plays_script_and_counts() {
        let library = ScriptedLibrary::new()
            .with_last_sales([ScriptStep::Sale(record(1)), ScriptStep::Fail("busy".into())]);
        let mut session = library.open_session("10.0.0.1").unwrap();

        assert!(session.connect().unwrap());
        assert_eq!(unwrap_sale(session.last_sale().unwrap()), Some(record(1)));
        assert!(session.last_sale().is_err());
        drop(session);

        let stats = library.stats();
        assert_eq!(stats.sessions_opened, 1);
        assert_eq!(stats.sessions_released, 1);
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.queries, 2);
    }

    #[test]
    fn hose_sales_are_numbered_from_one() {
        let library = ScriptedLibrary::new().with_hose_sales(2, [record(10), record(11)]);
        let mut session = library.open_session("10.0.0.1").unwrap();
        session.connect().unwrap();

        assert_eq!(unwrap_sale(session.sale(2, 1).unwrap()), Some(record(10)));
        assert_eq!(unwrap_sale(session.sale(2, 0).unwrap()), Some(record(11)));
        assert!(session.sale(2, 3).unwrap().is_none());
        assert!(session.sale(5, 0).unwrap().is_none());
    }

    #[test]
    fn declined_and_failed_connections() {
        let declined = ScriptedLibrary::new().declining_connections();
        let mut session = declined.open_session("10.0.0.1").unwrap();
        assert!(!session.connect().unwrap());

        let failing = ScriptedLibrary::new().failing_connections("no route to host");
        let mut session = failing.open_session("10.0.0.1").unwrap();
        let err = session.connect().unwrap_err();
        assert!(matches!(err, FusionError::Connection { .. }));
    }
}
