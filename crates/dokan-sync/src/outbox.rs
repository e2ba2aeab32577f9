//! # Cart Sync Processor
//!
//! Replays the `cart_outbox` table against the remote cart.
//!
//! ## Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Sync Processor Flow                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    cart_outbox Table                            │   │
//! │  │                                                                 │   │
//! │  │  id | item_id | size | quantity | kind | attempts | synced_at  │   │
//! │  │  ───┼─────────┼──────┼──────────┼──────┼──────────┼────────────│   │
//! │  │  a  │ p1      │ M    │ 1        │ add  │ 0        │ NULL       │   │
//! │  │  b  │ p1      │ M    │ 0        │ set  │ 2        │ NULL       │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    CartSyncProcessor                            │   │
//! │  │                                                                 │   │
//! │  │  1. Wake: interval tick │ nudge │ flush                        │   │
//! │  │  2. Token: read `token` slot, nothing to do when signed out    │   │
//! │  │  3. Poll: pending entries with attempts < max_attempts         │   │
//! │  │  4. Send: one backend call per entry, in queue order           │   │
//! │  │  5. Mark: synced_at = NOW()  or  attempts += 1, last_error     │   │
//! │  │  6. Back off exponentially after a failing cycle               │   │
//! │  │  7. Publish SyncStatus on the watch channel                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  A transport failure ends the cycle early; the rest waits for the      │
//! │  next attempt instead of failing one by one.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use dokan_db::{slots, Database};

use crate::client::BackendApi;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Status / Events
// =============================================================================

/// Observable state of the cart sync queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub enabled: bool,
    /// Entries not yet delivered, including ones that gave up.
    pub pending: i64,
    pub last_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// A non-fatal sync problem. Local state is never rolled back for one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncWarning {
    /// What was being synced (`cart`, `catalog`, ...).
    pub context: String,
    pub message: String,
    pub retryable: bool,
}

impl SyncWarning {
    pub fn new(context: impl Into<String>, error: &SyncError) -> Self {
        SyncWarning {
            context: context.into(),
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sync: {}", self.context, self.message)
    }
}

/// Receives sync events (a UI layer, a log sink, a test double).
pub trait SyncEventEmitter: Send + Sync {
    fn emit_status(&self, status: &SyncStatus);

    fn emit_warning(&self, warning: &SyncWarning);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_warning(&self, _warning: &SyncWarning) {}
}

/// Outcome of one processing cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub synced: usize,
    pub failed: usize,
    /// Entries left alone because they used up their attempts.
    pub exhausted: usize,
    /// Still pending after the cycle.
    pub pending: i64,
}

// =============================================================================
// Handle
// =============================================================================

enum Command {
    Nudge,
    Flush(oneshot::Sender<SyncResult<FlushReport>>),
    Shutdown,
}

/// Handle for controlling a spawned processor.
#[derive(Clone)]
pub struct CartSyncHandle {
    command_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<SyncStatus>,
}

impl CartSyncHandle {
    /// Asks for a cycle soon. Never blocks; a nudge already queued is enough.
    pub fn nudge(&self) {
        if let Err(mpsc::error::TrySendError::Closed(_)) = self.command_tx.try_send(Command::Nudge) {
            debug!("Nudge after processor stopped");
        }
    }

    /// Runs a cycle now, ignoring any backoff, and waits for its report.
    pub async fn flush(&self) -> SyncResult<FlushReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::Flush(reply_tx))
            .await
            .map_err(|_| SyncError::ShuttingDown)?;
        reply_rx
            .await
            .map_err(|_| SyncError::ChannelError("Flush reply dropped".into()))?
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.command_tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| SyncError::ChannelError("Shutdown channel closed".into()))
    }

    pub fn status(&self) -> SyncStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }
}

// =============================================================================
// Processor
// =============================================================================

pub struct CartSyncProcessor {
    db: Database,
    api: Arc<dyn BackendApi>,
    config: Arc<SyncConfig>,
    emitter: Arc<dyn SyncEventEmitter>,
    status_tx: watch::Sender<SyncStatus>,
    backoff: ExponentialBackoff,
    retry_at: Option<Instant>,
}

impl CartSyncProcessor {
    pub fn new(db: Database, api: Arc<dyn BackendApi>, config: Arc<SyncConfig>) -> Self {
        Self::with_emitter(db, api, config, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        db: Database,
        api: Arc<dyn BackendApi>,
        config: Arc<SyncConfig>,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        let status = SyncStatus {
            enabled: config.is_sync_enabled(),
            ..Default::default()
        };
        let (status_tx, _) = watch::channel(status);

        CartSyncProcessor {
            backoff: config.backoff(),
            db,
            api,
            config,
            emitter,
            status_tx,
            retry_at: None,
        }
    }

    /// Spawns the processor loop and returns its handle.
    pub fn spawn(self) -> CartSyncHandle {
        let (command_tx, command_rx) = mpsc::channel(16);
        let status_rx = self.status_tx.subscribe();
        tokio::spawn(self.run(command_rx));
        CartSyncHandle {
            command_tx,
            status_rx,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status_tx.borrow().clone()
    }

    async fn run(mut self, mut command_rx: mpsc::Receiver<Command>) {
        info!(
            enabled = self.config.is_sync_enabled(),
            poll_interval_secs = self.config.sync.poll_interval_secs,
            "Cart sync processor starting"
        );

        let _ = self.refresh_status(None).await;

        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.scheduled_cycle().await;
                }

                command = command_rx.recv() => match command {
                    Some(Command::Nudge) => self.scheduled_cycle().await,
                    Some(Command::Flush(reply)) => {
                        let report = self.process_batch().await;
                        if let Err(e) = &report {
                            error!(?e, "Cart sync flush failed");
                        }
                        let _ = reply.send(report);
                    }
                    Some(Command::Shutdown) | None => {
                        info!("Cart sync processor shutting down");
                        break;
                    }
                },
            }
        }

        info!("Cart sync processor stopped");
    }

    /// A cycle that honours the backoff window.
    async fn scheduled_cycle(&mut self) {
        if !self.config.is_sync_enabled() {
            return;
        }
        if let Some(retry_at) = self.retry_at {
            if Instant::now() < retry_at {
                debug!("In backoff window, skipping cart sync cycle");
                return;
            }
        }
        if let Err(e) = self.process_batch().await {
            error!(?e, "Failed to process cart outbox batch");
        }
    }

    /// Replays one batch of pending mutations.
    pub async fn process_batch(&mut self) -> SyncResult<FlushReport> {
        let outbox = self.db.cart_outbox();
        let max_attempts = self.config.sync.max_attempts;

        if !self.config.is_sync_enabled() {
            let pending = outbox.count_pending().await?;
            return Ok(FlushReport { pending, ..Default::default() });
        }

        let Some(token) = self.db.slots().get(slots::TOKEN).await? else {
            debug!("Signed out, skipping cart sync");
            let pending = outbox.count_pending().await?;
            return Ok(FlushReport { pending, ..Default::default() });
        };

        let exhausted = outbox.get_exhausted(max_attempts).await?;
        for entry in &exhausted {
            warn!(
                id = %entry.id,
                item_id = %entry.mutation.item_id,
                attempts = entry.attempts,
                "Skipping cart mutation that exceeded max attempts"
            );
        }

        let batch_size = u32::try_from(self.config.sync.batch_size).unwrap_or(u32::MAX);
        let entries = outbox.get_pending(batch_size, max_attempts).await?;

        let mut report = FlushReport {
            exhausted: exhausted.len(),
            ..Default::default()
        };
        let mut last_error = None;

        if !entries.is_empty() {
            info!(count = entries.len(), "Processing cart outbox batch");
        }

        for entry in entries {
            match self.api.apply_cart_mutation(&token, &entry.mutation).await {
                Ok(()) => {
                    outbox.mark_synced(&entry.id).await?;
                    report.synced += 1;
                }
                Err(e) => {
                    warn!(
                        id = %entry.id,
                        item_id = %entry.mutation.item_id,
                        error = %e,
                        "Cart mutation sync failed"
                    );
                    outbox.mark_failed(&entry.id, &e.to_string()).await?;
                    report.failed += 1;
                    self.emitter.emit_warning(&SyncWarning::new("cart", &e));
                    let stop = e.is_retryable();
                    last_error = Some(e.to_string());
                    if stop {
                        break;
                    }
                }
            }
        }

        if report.failed > 0 {
            let delay = self.backoff.next_backoff();
            self.retry_at = delay.map(|d| Instant::now() + d);
            debug!(?delay, "Backing off cart sync");
        } else {
            self.backoff.reset();
            self.retry_at = None;
        }

        report.pending = self.refresh_status(last_error.filter(|_| report.failed > 0)).await?;
        if report.synced > 0 {
            self.status_tx.send_modify(|s| s.last_synced_at = Some(Utc::now()));
        }
        self.emitter.emit_status(&self.status());

        Ok(report)
    }

    /// Re-reads the pending count and publishes it. Returns the count.
    async fn refresh_status(&self, last_error: Option<String>) -> SyncResult<i64> {
        let pending = self.db.cart_outbox().count_pending().await?;
        let stored_error = match last_error {
            Some(e) => Some(e),
            None if pending > 0 => self.db.cart_outbox().last_error().await?,
            None => None,
        };
        self.status_tx.send_modify(|s| {
            s.pending = pending;
            s.last_error = stored_error;
        });
        Ok(pending)
    }
}

// =============================================================================
// Tests
// =============================================================================
