//! Refresh coordinator.
//!
//! Owns the two order lists shown on the panel and keeps them current:
//! polls the backend on a fixed cadence, normalizes every record, flags newly
//! arrived in-progress orders, and runs the invoice action. State is
//! published as [`PanelSnapshot`] values over a `watch` channel; consumers
//! only read it.
//!
//! No error escapes the public operations. Failures are logged and shown to
//! the operator as a transient, self-clearing message; the previous lists
//! stay in place.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{Collection, OrderBackend};
use crate::config::DEFAULT_POLL_INTERVAL;
use crate::normalize::normalize_collection;
use crate::notify::{
    invoice_sent_message, Alerter, NoticeTimings, INVOICE_FAILED_MESSAGE, REFRESH_FAILED_MESSAGE,
};
use crate::order::{Order, DEFAULT_CUSTOMER_NAME};

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSnapshot {
    pub in_progress: Vec<Order>,
    pub concluded: Vec<Order>,
    /// True until the first refresh cycle finishes, successfully or not.
    pub is_loading: bool,
    pub transient_message: Option<String>,
    pub has_new_order: bool,
    /// Order whose detail view is open.
    pub selected_order: Option<Order>,
}

impl Default for PanelSnapshot {
    fn default() -> Self {
        Self {
            in_progress: Vec::new(),
            concluded: Vec::new(),
            is_loading: true,
            transient_message: None,
            has_new_order: false,
            selected_order: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated {
        in_progress: usize,
        concluded: usize,
        new_orders: usize,
    },
    Failed,
    /// The coordinator was torn down before the results could be applied.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceOutcome {
    Sent,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub poll_interval: Duration,
    pub notices: NoticeTimings,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            notices: NoticeTimings::default(),
        }
    }
}

/// Ids in `next` that were not in `previous`.
pub fn detect_new_orders(previous: &[Order], next: &[Order]) -> Vec<String> {
    let known: HashSet<&str> = previous.iter().map(|o| o.id.as_str()).collect();
    next.iter()
        .filter(|o| !known.contains(o.id.as_str()))
        .map(|o| o.id.clone())
        .collect()
}

struct Shared {
    backend: Arc<dyn OrderBackend>,
    alerter: Arc<dyn Alerter>,
    options: CoordinatorOptions,
    state: watch::Sender<PanelSnapshot>,
    polling: AtomicBool,
    // Bumped under the watch lock so expiry timers only clear what they set.
    message_generation: AtomicU64,
    flag_generation: AtomicU64,
    shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    pub fn new(
        backend: Arc<dyn OrderBackend>,
        alerter: Arc<dyn Alerter>,
        options: CoordinatorOptions,
    ) -> Self {
        let (state, _) = watch::channel(PanelSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                backend,
                alerter,
                options,
                state,
                polling: AtomicBool::new(false),
                message_generation: AtomicU64::new(0),
                flag_generation: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelSnapshot> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Resolves once the coordinator has been torn down.
    pub async fn cancelled(&self) {
        self.shared.shutdown.cancelled().await;
    }

    /// Tear down: stops polling and pending expiry timers. Results of
    /// requests still in flight are dropped when they arrive.
    pub fn shutdown(&self) {
        if !self.shared.shutdown.is_cancelled() {
            info!("Order panel shutting down");
            self.shared.shutdown.cancel();
        }
    }

    /// Apply `f` to the published state unless torn down.
    fn modify<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut PanelSnapshot),
    {
        if self.shared.shutdown.is_cancelled() {
            return false;
        }
        self.shared.state.send_modify(f);
        true
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    /// Fetch both collections and replace the lists. Both fetches must
    /// succeed; otherwise nothing is replaced and a failure notice is shown.
    pub async fn refresh(&self) -> RefreshOutcome {
        let shared = &self.shared;
        if shared.shutdown.is_cancelled() {
            return RefreshOutcome::Discarded;
        }

        let fetched = tokio::try_join!(
            shared.backend.fetch_orders(Collection::InProgress),
            shared.backend.fetch_orders(Collection::Concluded),
        );

        if shared.shutdown.is_cancelled() {
            debug!("Discarding refresh result after shutdown");
            return RefreshOutcome::Discarded;
        }

        let (in_progress_body, concluded_body) = match fetched {
            Ok(bodies) => bodies,
            Err(e) => {
                warn!(error = %e, "Failed to load orders");
                self.modify(|s| s.is_loading = false);
                self.show_message(
                    REFRESH_FAILED_MESSAGE.to_string(),
                    shared.options.notices.refresh_failure,
                );
                return RefreshOutcome::Failed;
            }
        };

        let in_progress = normalize_collection(&in_progress_body);
        let concluded = normalize_collection(&concluded_body);
        let in_progress_count = in_progress.len();
        let concluded_count = concluded.len();

        let mut new_ids = Vec::new();
        self.modify(|s| {
            // An empty previous list means nothing to compare against yet.
            if !s.in_progress.is_empty() {
                new_ids = detect_new_orders(&s.in_progress, &in_progress);
            }
            s.in_progress = in_progress;
            s.concluded = concluded;
            s.is_loading = false;
        });

        if !new_ids.is_empty() {
            info!(count = new_ids.len(), ids = ?new_ids, "New orders received");
            self.signal_new_orders();
        }
        debug!(
            in_progress = in_progress_count,
            concluded = concluded_count,
            "Orders refreshed"
        );

        RefreshOutcome::Updated {
            in_progress: in_progress_count,
            concluded: concluded_count,
            new_orders: new_ids.len(),
        }
    }

    fn signal_new_orders(&self) {
        let shared = &self.shared;
        let mut generation = 0;
        self.modify(|s| {
            s.has_new_order = true;
            generation = shared.flag_generation.fetch_add(1, Ordering::SeqCst) + 1;
        });

        let alerter = Arc::clone(&shared.alerter);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = alerter.play() {
                debug!(error = %e, "New order alert could not be played");
            }
        });

        self.expire_after(shared.options.notices.new_order_flag, move |shared, s| {
            if shared.flag_generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            std::mem::replace(&mut s.has_new_order, false)
        });
    }

    // -----------------------------------------------------------------------
    // Transient messages
    // -----------------------------------------------------------------------

    fn show_message(&self, text: String, ttl: Duration) {
        let shared = &self.shared;
        let mut generation = 0;
        let shown = self.modify(|s| {
            s.transient_message = Some(text);
            generation = shared.message_generation.fetch_add(1, Ordering::SeqCst) + 1;
        });
        if !shown {
            return;
        }

        self.expire_after(ttl, move |shared, s| {
            if shared.message_generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.transient_message.take().is_some()
        });
    }

    fn expire_after<F>(&self, delay: Duration, clear: F)
    where
        F: FnOnce(&Shared, &mut PanelSnapshot) -> bool + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::select! {
                _ = shared.shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if !shared.shutdown.is_cancelled() {
                        shared.state.send_if_modified(|s| clear(&*shared, s));
                    }
                }
            }
        });
    }

    // -----------------------------------------------------------------------
    // Detail view
    // -----------------------------------------------------------------------

    /// Open the detail view for an in-progress or concluded order.
    pub fn open_order(&self, order_id: &str) -> bool {
        let found = {
            let state = self.shared.state.borrow();
            state
                .in_progress
                .iter()
                .chain(state.concluded.iter())
                .find(|o| o.id == order_id)
                .cloned()
        };
        match found {
            Some(order) => self.modify(|s| s.selected_order = Some(order)),
            None => {
                debug!(order_id, "No order with this id to open");
                false
            }
        }
    }

    pub fn close_order(&self) {
        self.modify(|s| s.selected_order = None);
    }

    // -----------------------------------------------------------------------
    // Invoicing
    // -----------------------------------------------------------------------

    fn customer_name_for(&self, order_id: &str) -> String {
        let state = self.shared.state.borrow();
        state
            .in_progress
            .iter()
            .chain(state.selected_order.iter())
            .find(|o| o.id == order_id)
            .map(|o| o.customer.name.clone())
            .unwrap_or_else(|| DEFAULT_CUSTOMER_NAME.to_string())
    }

    /// Send an order to invoicing. On success the lists are refreshed right
    /// away and the detail view closes; on failure only a notice is shown.
    /// Never retried automatically.
    pub async fn invoice(&self, order_id: &str) -> InvoiceOutcome {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            warn!("Ignoring invoice request without an order id");
            return InvoiceOutcome::Skipped;
        }
        if self.is_shut_down() {
            return InvoiceOutcome::Skipped;
        }

        let customer_name = self.customer_name_for(order_id);
        let ttl = self.shared.options.notices.invoice_result;

        match self.shared.backend.invoice(order_id).await {
            Ok(()) => {
                self.show_message(invoice_sent_message(&customer_name), ttl);
                self.refresh().await;
                self.close_order();
                InvoiceOutcome::Sent
            }
            Err(e) => {
                warn!(order_id, error = %e, "Failed to send order to invoicing");
                self.show_message(INVOICE_FAILED_MESSAGE.to_string(), ttl);
                InvoiceOutcome::Failed
            }
        }
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Start the poll loop: one refresh now, then one per poll interval until
    /// [`shutdown`](Self::shutdown) or the returned handle is dropped.
    /// Only the first call starts a loop; later calls get a detached handle
    /// that neither stops nor tears down the running one.
    #[must_use = "dropping the handle stops polling"]
    pub fn start(&self) -> PollingHandle {
        if self.shared.polling.swap(true, Ordering::SeqCst) {
            warn!("Order polling already running");
            return PollingHandle {
                shutdown: None,
                task: None,
            };
        }

        let shutdown = self.shared.shutdown.clone();

        let coordinator = self.clone();
        let period = self.shared.options.poll_interval;
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            info!(interval_secs = period.as_secs(), "Order polling started");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        coordinator.refresh().await;
                    }
                }
            }
            info!("Order polling stopped");
        });

        PollingHandle {
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }
}

/// Owns the poll loop's lifetime. Dropping the owning handle tears the
/// coordinator down; a detached handle does nothing.
#[must_use = "dropping the handle stops polling"]
pub struct PollingHandle {
    shutdown: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl PollingHandle {
    /// True for the handle that owns the running loop.
    pub fn owns_loop(&self) -> bool {
        self.shutdown.is_some()
    }

    pub fn stop(&self) {
        if let Some(shutdown) = &self.shutdown {
            shutdown.cancel();
        }
    }

    /// Stop and wait for the loop to exit.
    pub async fn join(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Order polling task ended abnormally");
            }
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
