//! Fusion controller client

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::{ControllerConfig, ControllerOptions, PollConfig};
use crate::period;
use crate::poller::{self, PollSummary};
use crate::types::{ConnectionState, FieldValue, GradeTotals, Product, SaleQuery, SaleRecord};
use crate::vendor::{VendorLibrary, VendorSession};
use crate::vendors;
use crate::{ErrorKind, FusionError, Result};

/// Field names carrying a sale's number, across firmware revisions
const SALE_NUMBER_FIELDS: [&str; 4] = ["SaleNumber", "SaleId", "SaleID", "SaleNr"];

/// Field names carrying a sale's transaction date
const SALE_DATE_FIELDS: [&str; 4] = ["DateOfTransaction", "DateTime", "Date", "Timestamp"];

/// The vendor session and the flags shared with calls on the blocking pool
struct SessionSlot {
    session: Mutex<Box<dyn VendorSession>>,
    /// A call timed out and may still be inside the vendor
    wedged: AtomicBool,
    /// Taken out of the link; queued calls must not reach the vendor
    released: AtomicBool,
}

impl SessionSlot {
    fn new(session: Box<dyn VendorSession>) -> Self {
        Self {
            session: Mutex::new(session),
            wedged: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    /// Whether the vendor is still busy with a timed-out call
    fn still_wedged(&self) -> bool {
        if !self.wedged.load(Ordering::SeqCst) {
            return false;
        }
        if matches!(self.session.try_lock(), Err(TryLockError::WouldBlock)) {
            return true;
        }
        self.wedged.store(false, Ordering::SeqCst);
        debug!("Vendor responsive again after timeout");
        false
    }
}

type SharedSession = Arc<SessionSlot>;

struct Link {
    state: ConnectionState,
    session: Option<SharedSession>,
}

/// Client for one Wayne Fusion controller
///
/// Owns the vendor session for its address. Reads require an open
/// connection; a disconnected controller cannot be reopened.
///
/// # Example
///
/// ```rust,no_run
/// use fusion_reader::{ControllerConfig, FusionController};
///
/// # #[tokio::main]
/// # async fn main() -> fusion_reader::Result<()> {
/// let config = ControllerConfig::new("192.168.1.100", r"C:\Wayne\FusionClass.dll");
/// let controller = FusionController::new(&config)?;
///
/// if controller.connect().await? {
///     if let Some(sale) = controller.get_last_sale().await? {
///         for (field, value) in sale.iter() {
///             println!("{}: {}", field, value);
///         }
///     }
/// }
/// controller.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct FusionController {
    address: String,
    library: Arc<dyn VendorLibrary>,
    options: ControllerOptions,
    link: Mutex<Link>,
}

impl FusionController {
    /// Load the configured vendor module and create an unopened client
    ///
    /// # Errors
    ///
    /// - `Config` if the configuration is invalid
    /// - `Load` / `UnsupportedPlatform` if the vendor module cannot be loaded
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        config.validate()?;
        info!("Initializing Fusion controller client for {}", config.address);
        let library = vendors::load_library(&config.library_path)?;
        info!("Vendor module loaded: {}", library.describe());
        Ok(Self::with_library(config.address.clone(), library, config.options()))
    }

    /// Create a client over an already loaded vendor library
    pub fn with_library(
        address: impl Into<String>,
        library: Arc<dyn VendorLibrary>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            address: address.into(),
            library,
            options,
            link: Mutex::new(Link { state: ConnectionState::Unopened, session: None }),
        }
    }

    /// Controller address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.link().state
    }

    /// Check if reads are currently allowed
    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Establish the session with the controller.
    ///
    /// Returns `Ok(true)` once connected, and `Ok(false)` if the controller
    /// declined the session (the client stays unopened and the vendor handle
    /// is released). Calling it again while connected is a no-op.
    ///
    /// # Errors
    ///
    /// `Connection` if the endpoint is unreachable, the vendor raised, or
    /// this client was already disconnected.
    pub async fn connect(&self) -> Result<bool> {
        match self.state() {
            ConnectionState::Open => {
                debug!(address = %self.address, "Already connected");
                return Ok(true);
            }
            ConnectionState::Closed => {
                return Err(FusionError::connection_failed(
                    "controller client was disconnected; create a new client to reconnect",
                ));
            }
            ConnectionState::Unopened => {}
        }

        info!(address = %self.address, "Connecting to Fusion controller");

        let library = Arc::clone(&self.library);
        let address = self.address.clone();
        let (session, accepted) = self
            .run_blocking("Connect", move |_| {
                let mut session = library.open_session(&address)?;
                let accepted = session.connect()?;
                Ok((session, accepted))
            })
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::Connection | ErrorKind::Load => e,
                _ => FusionError::connection_failed_with_source(
                    "vendor connect call failed",
                    Box::new(e),
                ),
            })?;

        if !accepted {
            warn!(address = %self.address, "Controller declined the session");
            return Ok(false);
        }

        let slot = Arc::new(SessionSlot::new(session));
        let lost_race = {
            let mut link = self.link();
            if link.state.can_connect() {
                link.state = ConnectionState::Open;
                link.session = Some(Arc::clone(&slot));
                None
            } else {
                Some(link.state)
            }
        };

        if let Some(state) = lost_race {
            // Another connect or a disconnect won the race; keep its outcome.
            debug!(state = ?state, "Disconnecting redundant session");
            self.release(slot).await;
            return Ok(state.is_open());
        }

        info!(address = %self.address, "Connected to Fusion controller");
        Ok(true)
    }

    /// Release the vendor session.
    ///
    /// Idempotent: without an open connection this does nothing. Vendor
    /// errors while tearing down are logged.
    pub async fn disconnect(&self) {
        let session = {
            let mut link = self.link();
            if !link.state.is_open() {
                debug!(state = ?link.state, "Disconnect without open connection");
                return;
            }
            link.state = link.state.after_disconnect();
            link.session.take()
        };

        let Some(session) = session else {
            return;
        };

        info!(address = %self.address, "Disconnecting from Fusion controller");
        self.release(session).await;
    }

    /// Last sale through the vendor's `GetLastSale` method.
    ///
    /// Returns `Ok(None)` if the controller has no sale yet.
    pub async fn get_last_sale(&self) -> Result<Option<SaleRecord>> {
        self.read_sale(SaleQuery::LastSale).await
    }

    /// Last sale through the vendor's `GetLastSaleOnFusion` method.
    pub async fn get_last_sale_on_fusion(&self) -> Result<Option<SaleRecord>> {
        self.read_sale(SaleQuery::LastSaleOnFusion).await
    }

    /// Last sale through the selected vendor method
    pub async fn read_sale(&self, query: SaleQuery) -> Result<Option<SaleRecord>> {
        let method = query.vendor_method();
        let sale = self
            .with_session(method, move |session| {
                let object = match query {
                    SaleQuery::LastSale => session.last_sale()?,
                    SaleQuery::LastSaleOnFusion => session.last_sale_on_fusion()?,
                };
                Ok(object.map(|o| SaleRecord::from_object(o.as_ref())))
            })
            .await?
            .filter(|sale| !sale.is_empty());

        match &sale {
            Some(sale) => debug!(method, fields = sale.len(), "Retrieved sale: {}", sale),
            None => debug!(method, "No sale available"),
        }
        Ok(sale)
    }

    /// A specific sale on a hose; `sale_number == 0` reads the latest one
    pub async fn get_sale(&self, hose_id: u32, sale_number: u32) -> Result<Option<SaleRecord>> {
        let sale = self
            .with_session("GetSale", move |session| {
                let object = session.sale(hose_id, sale_number)?;
                Ok(object.map(|o| SaleRecord::from_object(o.as_ref())))
            })
            .await?
            .filter(|sale| !sale.is_empty());

        trace!(hose_id, sale_number, found = sale.is_some(), "GetSale");
        Ok(sale)
    }

    /// Product name configured on a grade
    pub async fn get_grade(&self, grade: u32) -> Result<Option<String>> {
        let name = self.with_session("GetGrade", move |session| session.grade(grade)).await?;
        Ok(name.filter(|n| !n.trim().is_empty()))
    }

    /// Products configured on grades `1..=max_grade`
    pub async fn list_products(&self, max_grade: u32) -> Result<Vec<Product>> {
        let mut products = Vec::new();
        for grade in 1..=max_grade {
            match self.get_grade(grade).await? {
                Some(name) => products.push(Product { grade, name }),
                None => trace!(grade, "Grade not configured"),
            }
        }
        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Sales on a hose dated `day`, newest first.
    ///
    /// Walks sale numbers down from the latest sale and stops at the first
    /// sale dated before `day`. Missing or undated sales are skipped.
    pub async fn sales_for_day(&self, hose_id: u32, day: NaiveDate) -> Result<Vec<SaleRecord>> {
        let Some(latest) = self.get_sale(hose_id, 0).await? else {
            debug!(hose_id, "No sales on hose");
            return Ok(Vec::new());
        };

        let Some(last_number) = latest
            .first_of(&SALE_NUMBER_FIELDS)
            .and_then(FieldValue::as_integer)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
        else {
            warn!(hose_id, "Latest sale carries no sale number: {}", latest);
            return Ok(Vec::new());
        };

        let mut sales = Vec::new();
        for number in (1..=last_number).rev() {
            let Some(sale) = self.get_sale(hose_id, number).await? else {
                continue;
            };
            let Some(date) = sale_date(&sale) else {
                trace!(hose_id, number, "Skipping sale without a readable date");
                continue;
            };
            if date == day {
                sales.push(sale);
            } else if date < day {
                break;
            }
        }

        info!(hose_id, %day, count = sales.len(), "Collected sales for day");
        Ok(sales)
    }

    /// Per-grade totals for the current day period.
    ///
    /// An empty period status yields no totals.
    ///
    /// # Errors
    ///
    /// `Parse` if the status carries no day period id.
    pub async fn period_sales_by_grade(&self) -> Result<Vec<GradeTotals>> {
        let status = self
            .with_session("PeriodStatusRequest", |session| session.period_status())
            .await?
            .filter(|s| !s.trim().is_empty());

        let Some(status) = status else {
            info!("Period status is empty; no period data available");
            return Ok(Vec::new());
        };
        debug!(status = %status, "Period status");

        let period_id = period::day_period_id(&status)?;
        let request_id = period_id.clone();
        let report = self
            .with_session("PeriodSalesByGrade", move |session| {
                session.period_sales_by_grade(period::DAY_PERIOD, &request_id)
            })
            .await?;

        match report {
            Some(raw) => {
                let totals = period::parse_grade_totals(&raw)?;
                debug!(period_id = %period_id, grades = totals.len(), "Period sales by grade");
                Ok(totals)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Poll the last sale and invoke `on_sale` for every new one.
    ///
    /// Runs until `cancel` fires or `config.max_iterations` is reached.
    /// Failed reads are logged and skipped.
    ///
    /// # Errors
    ///
    /// - `Config` for an invalid poll interval
    /// - `Connection` / `NotConnected` if the controller link is lost
    pub async fn poll_for_new_sales<F>(
        &self,
        config: &PollConfig,
        cancel: &CancellationToken,
        on_sale: F,
    ) -> Result<PollSummary>
    where
        F: FnMut(&SaleRecord),
    {
        poller::run(self, config, cancel, on_sale).await
    }

    /// Run `f` against the open session on the blocking pool.
    ///
    /// Fails with `NotConnected` before touching the vendor if the client is
    /// not open.
    async fn with_session<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn VendorSession) -> Result<T> + Send + 'static,
    {
        let slot = {
            let link = self.link();
            match (&link.session, link.state) {
                (Some(slot), ConnectionState::Open) => Arc::clone(slot),
                (_, state) => return Err(FusionError::NotConnected { state }),
            }
        };

        if slot.still_wedged() {
            return Err(FusionError::operation_failed(
                operation,
                "an earlier vendor call timed out and has not returned yet",
            ));
        }

        trace!(operation, "Calling vendor");
        let call_slot = Arc::clone(&slot);
        let result = self
            .run_blocking(operation, move |abandoned| {
                let mut guard = lock_session(&call_slot.session, operation)?;
                if abandoned.is_cancelled() {
                    return Err(abandoned_error(operation));
                }
                if call_slot.released.load(Ordering::SeqCst) {
                    return Err(FusionError::NotConnected { state: ConnectionState::Closed });
                }
                f(guard.as_mut())
            })
            .await;

        if matches!(result, Err(FusionError::Timeout { .. })) {
            slot.wedged.store(true, Ordering::SeqCst);
        }
        result
    }

    /// Run `f` on the blocking pool, bounded by the call timeout.
    ///
    /// A call that has not started by the time its caller returns or is
    /// dropped never runs. `f` receives the token cancelled at that point.
    async fn run_blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
    {
        let abandoned = CancellationToken::new();
        let _abandon_on_exit = abandoned.clone().drop_guard();

        let task = tokio::task::spawn_blocking(move || {
            if abandoned.is_cancelled() {
                return Err(abandoned_error(operation));
            }
            f(&abandoned)
        });

        let joined = match self.options.call_timeout {
            Some(duration) => match tokio::time::timeout(duration, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(operation, ?duration, "Vendor call timed out, abandoning it");
                    return Err(FusionError::Timeout { operation: operation.to_string(), duration });
                }
            },
            None => task.await,
        };

        joined.map_err(|e| {
            FusionError::operation_failed(operation, format!("vendor call task failed: {}", e))
        })?
    }

    /// Disconnect a session taken out of the link, on the blocking pool.
    ///
    /// Waits at most the call timeout; a slower disconnect finishes in the
    /// background.
    async fn release(&self, slot: SharedSession) {
        slot.released.store(true, Ordering::SeqCst);
        let task = tokio::task::spawn_blocking(move || release_session(&slot));

        let joined = match self.options.call_timeout {
            Some(duration) => match tokio::time::timeout(duration, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(?duration, "Disconnect still running, finishing in background");
                    return;
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(())) => info!("Disconnected successfully"),
            Ok(Err(e)) => warn!(error = %e, "Error during disconnect"),
            Err(e) => warn!(error = %e, "Disconnect task failed"),
        }
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for FusionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionController")
            .field("address", &self.address)
            .field("library", &self.library.describe())
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for FusionController {
    fn drop(&mut self) {
        let link = self.link.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !link.state.is_open() {
            return;
        }
        link.state = link.state.after_disconnect();
        let Some(slot) = link.session.take() else {
            return;
        };
        debug!(address = %self.address, "Dropping open controller, disconnecting");
        slot.released.store(true, Ordering::SeqCst);

        // Never wait on the session lock from an async worker.
        let result = match slot.session.try_lock() {
            Ok(mut session) => Some(session.disconnect()),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner().disconnect()),
            Err(TryLockError::WouldBlock) => None,
        };

        match result {
            Some(Ok(())) => {}
            Some(Err(e)) => warn!(error = %e, "Error during disconnect on drop"),
            None => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    debug!("Vendor call in flight, disconnecting on the blocking pool");
                    handle.spawn_blocking(move || {
                        if let Err(e) = release_session(&slot) {
                            warn!(error = %e, "Error during disconnect on drop");
                        }
                    });
                }
                Err(_) => {
                    if let Err(e) = release_session(&slot) {
                        warn!(error = %e, "Error during disconnect on drop");
                    }
                }
            },
        }
    }
}

fn lock_session<'a>(
    session: &'a Mutex<Box<dyn VendorSession>>,
    operation: &str,
) -> Result<MutexGuard<'a, Box<dyn VendorSession>>> {
    session
        .lock()
        .map_err(|_| FusionError::operation_failed(operation, "vendor session lock poisoned"))
}

fn abandoned_error(operation: &str) -> FusionError {
    FusionError::operation_failed(operation, "caller stopped waiting before the call started")
}

/// Disconnect a released session, waiting for any call still inside the vendor
fn release_session(slot: &SessionSlot) -> Result<()> {
    let mut session = slot.session.lock().unwrap_or_else(PoisonError::into_inner);
    session.disconnect()
}

/// Transaction date of a sale, from the first 10 characters of its date field
fn sale_date(sale: &SaleRecord) -> Option<NaiveDate> {
    let text = sale.first_of(&SALE_DATE_FIELDS)?.to_string();
    let day = text.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
