//! Keeps a local copy of the contract's session state.
//!
//! The synchronizer polls the ledger on a fixed cadence and on demand,
//! publishing the snapshot through a `watch` channel whenever it changes.
//! Poll failures never blank the cached snapshot; they go out on a separate
//! broadcast channel instead.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rps_core::{LedgerGateway, SessionSnapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const FAILURE_CHANNEL_CAPACITY: usize = 16;

/// A poll that failed; the cached snapshot was kept.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub reason: String,
    pub at: DateTime<Utc>,
}

pub struct SessionSynchronizer {
    ledger: Arc<dyn LedgerGateway>,
    interval: Duration,
    next_seq: AtomicU64,
    applied_seq: Mutex<u64>,
    snapshot_tx: watch::Sender<Option<SessionSnapshot>>,
    failures_tx: broadcast::Sender<SyncFailure>,
}

impl SessionSynchronizer {
    pub fn new(ledger: Arc<dyn LedgerGateway>, interval: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        let (failures_tx, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);

        Self {
            ledger,
            interval,
            next_seq: AtomicU64::new(0),
            applied_seq: Mutex::new(0),
            snapshot_tx,
            failures_tx,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Last successfully fetched snapshot; `None` until the first fetch
    /// succeeds. Never blocks.
    pub fn latest(&self) -> Option<SessionSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Notified only when the snapshot value changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn failures(&self) -> broadcast::Receiver<SyncFailure> {
        self.failures_tx.subscribe()
    }

    /// Fetches immediately, bypassing the timer. Errors propagate to the
    /// caller and leave the cache untouched.
    pub async fn refresh_now(&self) -> rps_core::Result<SessionSnapshot> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.ledger.fetch_snapshot().await?;
        self.apply(seq, &snapshot);
        Ok(snapshot)
    }

    /// One timer tick: refresh, or report the failure and keep the cache.
    pub async fn poll_once(&self) {
        match self.refresh_now().await {
            Ok(_) => tracing::debug!("Session poll complete"),
            Err(e) => {
                tracing::warn!("Session poll failed, keeping last snapshot: {}", e);
                // no subscribers is fine
                let _ = self.failures_tx.send(SyncFailure {
                    reason: e.reason(),
                    at: Utc::now(),
                });
            }
        }
    }

    /// Stores a fetch result unless a fetch that started later has already
    /// been applied. Returns whether subscribers were notified.
    fn apply(&self, seq: u64, snapshot: &SessionSnapshot) -> bool {
        let mut applied = self.applied_seq.lock();
        if seq <= *applied {
            tracing::debug!("Dropping fetch #{} superseded by #{}", seq, *applied);
            return false;
        }
        *applied = seq;

        self.snapshot_tx.send_if_modified(|current| {
            if current.as_ref() == Some(snapshot) {
                false
            } else {
                tracing::info!(
                    "Session changed: player1={:?} player2={:?} bet={}",
                    snapshot.player1,
                    snapshot.player2,
                    snapshot.bet_amount
                );
                *current = Some(snapshot.clone());
                true
            }
        })
    }

    /// Starts the polling timer. The first poll runs immediately.
    pub fn spawn(self: &Arc<Self>) -> SyncHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let sync = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sync.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = async {
                        ticker.tick().await;
                        sync.poll_once().await;
                    } => {}
                }
            }

            tracing::debug!("Session polling stopped");
        });

        SyncHandle {
            task: Some(task),
            shutdown: Some(shutdown_tx),
        }
    }
}

/// Owner of a running poll loop. Dropping it aborts the loop.
pub struct SyncHandle {
    task: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl SyncHandle {
    /// Stops the timer, cancelling a poll in progress, and waits for the
    /// loop to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
