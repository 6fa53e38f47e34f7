//! Wiring for one client session: the synchronizer, the orchestrator, and
//! the background tasks that keep them in step.

use crate::commitment::CommitmentCodec;
use crate::session::SessionOrchestrator;
use crate::sync::{SessionSynchronizer, SyncHandle};

use rps_core::{ClientConfig, IdentityGateway, LedgerGateway, Prompter, Storage};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct SessionContext {
    orchestrator: Arc<SessionOrchestrator>,
    sync: Arc<SessionSynchronizer>,
    poller: Option<SyncHandle>,
    reconciler: Option<JoinHandle<()>>,
}

impl SessionContext {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        identity: Arc<dyn IdentityGateway>,
        storage: Arc<Storage>,
        prompter: Arc<dyn Prompter>,
        config: &ClientConfig,
    ) -> Self {
        let sync = Arc::new(SessionSynchronizer::new(
            ledger.clone(),
            config.poll_interval,
        ));
        let orchestrator = Arc::new(SessionOrchestrator::new(
            ledger,
            identity,
            sync.clone(),
            CommitmentCodec::new(config.commitment_encoding),
            storage,
            prompter,
        ));

        Self {
            orchestrator,
            sync,
            poller: None,
            reconciler: None,
        }
    }

    pub fn orchestrator(&self) -> &Arc<SessionOrchestrator> {
        &self.orchestrator
    }

    pub fn synchronizer(&self) -> &Arc<SessionSynchronizer> {
        &self.sync
    }

    pub fn is_running(&self) -> bool {
        self.poller.is_some()
    }

    /// Starts polling and re-derives the status on every snapshot change.
    /// Calling it again while running does nothing.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let mut snapshots = self.sync.subscribe();
        let orchestrator = self.orchestrator.clone();

        self.reconciler = Some(tokio::spawn(async move {
            while snapshots.changed().await.is_ok() {
                let latest = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = latest {
                    if let Err(e) = orchestrator.reconcile(&snapshot).await {
                        tracing::warn!("Could not reconcile session status: {}", e);
                    }
                }
            }
        }));
        self.poller = Some(self.sync.spawn());

        tracing::debug!("Session context started (poll every {:?})", self.sync.interval());
    }

    /// Stops the background tasks. A poll in progress is cancelled.
    pub async fn shutdown(mut self) {
        if let Some(poller) = self.poller.take() {
            poller.shutdown().await;
        }
        if let Some(reconciler) = self.reconciler.take() {
            reconciler.abort();
            let _ = reconciler.await;
        }
        tracing::debug!("Session context stopped");
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        if let Some(reconciler) = self.reconciler.take() {
            reconciler.abort();
        }
    }
}
