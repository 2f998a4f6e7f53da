//! Polling for new sales
//!
//! The controller has no push notifications, so new sales are found by
//! reading the last sale on a timer and comparing it with the previous one.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, trace, warn};

use crate::config::PollConfig;
use crate::controller::FusionController;
use crate::types::SaleRecord;
use crate::{ErrorKind, FusionError, Result};

/// Remembers the last sale seen, for change detection
#[derive(Debug, Clone, Default)]
pub struct SaleTracker {
    last_seen: Option<SaleRecord>,
}

impl SaleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fetched sale.
    ///
    /// Returns the sale if it differs from the last one seen, in which case
    /// it becomes the new last-seen sale.
    pub fn observe(&mut self, sale: SaleRecord) -> Option<&SaleRecord> {
        if self.last_seen.as_ref() == Some(&sale) {
            return None;
        }
        self.last_seen = Some(sale);
        self.last_seen.as_ref()
    }

    pub fn last_seen(&self) -> Option<&SaleRecord> {
        self.last_seen.as_ref()
    }
}

/// Outcome of a finished polling loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Reads attempted
    pub iterations: u64,
    /// Callbacks fired
    pub sales_detected: u64,
    /// Failed reads that were logged and skipped
    pub errors: u64,
}

/// Run the polling loop until cancelled, bounded, or the connection is lost
pub(crate) async fn run<F>(
    controller: &FusionController,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut on_sale: F,
) -> Result<PollSummary>
where
    F: FnMut(&SaleRecord),
{
    config.validate()?;
    let interval = config.interval();
    let method = config.method.vendor_method();

    info!(
        address = controller.address(),
        method,
        interval_ms = interval.as_millis() as u64,
        max_iterations = ?config.max_iterations,
        "Polling for new sales"
    );

    let mut tracker = SaleTracker::new();
    let mut summary = PollSummary::default();

    loop {
        if cancel.is_cancelled() {
            info!("Polling cancelled");
            break;
        }
        if config.max_iterations.is_some_and(|max| summary.iterations >= max) {
            break;
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Polling cancelled during read");
                break;
            }
            result = controller.read_sale(config.method) => result,
        };
        summary.iterations += 1;

        match result {
            Ok(Some(sale)) => match tracker.observe(sale) {
                Some(sale) => {
                    summary.sales_detected += 1;
                    info!(iteration = summary.iterations, "New sale detected: {}", sale);
                    on_sale(sale);
                }
                None => trace!(iteration = summary.iterations, "Sale unchanged"),
            },
            Ok(None) => trace!(iteration = summary.iterations, "No sale available"),
            Err(e) if e.kind() == ErrorKind::Connection => {
                error!(error = %e, "Controller connection lost, stopping poll");
                return Err(e);
            }
            Err(e) => {
                summary.errors += 1;
                warn!(iteration = summary.iterations, error = %e, "Error during poll");
            }
        }

        if config.max_iterations.is_some_and(|max| summary.iterations >= max) {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Polling cancelled");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(
        iterations = summary.iterations,
        sales = summary.sales_detected,
        errors = summary.errors,
        "Polling stopped"
    );
    Ok(summary)
}

/// Spawn the polling loop on a tokio task
///
/// New sales arrive on the returned handle. The loop stops when the handle's
/// token is cancelled, the handle is dropped, or the sale receiver goes away.
pub fn spawn(controller: Arc<FusionController>, config: PollConfig) -> PollerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        let receiver_gone = task_cancel.clone();
        run(&controller, &config, &task_cancel, move |sale| {
            if tx.send(sale.clone()).is_err() {
                debug!("Sale receiver dropped, shutting down poller");
                receiver_gone.cancel();
            }
        })
        .await
    });

    PollerHandle { sales: rx, cancel: cancel.clone(), task, guard: cancel.drop_guard() }
}

/// Handle to a spawned polling loop
pub struct PollerHandle {
    sales: mpsc::UnboundedReceiver<SaleRecord>,
    cancel: CancellationToken,
    task: JoinHandle<Result<PollSummary>>,
    guard: DropGuard,
}

impl PollerHandle {
    /// Next new sale, or `None` once the loop has stopped
    pub async fn recv(&mut self) -> Option<SaleRecord> {
        self.sales.recv().await
    }

    /// Token that stops the loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask the loop to stop
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to finish and return its summary.
    ///
    /// Sales not yet received are discarded.
    pub async fn join(self) -> Result<PollSummary> {
        let PollerHandle { sales, task, guard, .. } = self;
        let result = task.await.map_err(|e| {
            FusionError::operation_failed("Poll", format!("polling task failed: {}", e))
        });
        drop(sales);
        guard.disarm();
        result?
    }

    /// Turn the handle into a stream of new sales.
    ///
    /// Dropping the stream stops the loop.
    pub fn into_stream(self) -> SaleStream {
        SaleStream { inner: UnboundedReceiverStream::new(self.sales), _guard: self.guard }
    }
}

impl std::fmt::Debug for PollerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollerHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

/// Stream of new sales from a spawned poller
pub struct SaleStream {
    inner: UnboundedReceiverStream<SaleRecord>,
    _guard: DropGuard,
}

impl Stream for SaleStream {
    type Item = SaleRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
