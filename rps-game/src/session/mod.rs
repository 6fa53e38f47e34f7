//! The session state machine.
//!
//! [`SessionOrchestrator`] turns user intents into contract writes. Every
//! intent re-reads the contract before acting, checks locally whether the
//! write can succeed, and only then submits. Results surface as a
//! [`SessionStatus`]; failures are layered over the last confirmed status
//! so a failed commit does not undo an earlier join.

pub mod status;

pub use status::SessionStatus;

use crate::commitment::CommitmentCodec;
use crate::error::{GameError, Result};
use crate::sync::SessionSynchronizer;

use parking_lot::Mutex;
use rps_core::{
    Address, BetAmount, Commitment, CoreError, IdentityGateway, LedgerGateway, MoveChoice,
    MoveStore, Prompter, RetainedMove, Secret, SessionSnapshot, Slot, Storage,
};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// A user-initiated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Connect,
    Join,
    Commit,
    Reveal,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Join => "join",
            Self::Commit => "commit",
            Self::Reveal => "reveal",
        };
        f.write_str(name)
    }
}

/// Where the revealed move and secret come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealSource {
    /// The pair kept locally at commit time.
    Retained,
    /// Typed in again by the user.
    Manual,
}

/// Result of a confirmed join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinReceipt {
    pub slot: Slot,
    pub amount: BetAmount,
}

struct OrchestratorState {
    account: Option<Address>,
    confirmed: SessionStatus,
    failure: Option<String>,
    /// Bumped whenever an intent confirms, so a reconcile computed from
    /// older information does not overwrite it.
    generation: u64,
}

impl OrchestratorState {
    fn status(&self) -> SessionStatus {
        match &self.failure {
            Some(reason) => SessionStatus::Failed(reason.clone()),
            None => self.confirmed.clone(),
        }
    }
}

pub struct SessionOrchestrator {
    ledger: Arc<dyn LedgerGateway>,
    identity: Arc<dyn IdentityGateway>,
    sync: Arc<SessionSynchronizer>,
    codec: CommitmentCodec,
    storage: Arc<Storage>,
    prompter: Arc<dyn Prompter>,
    state: Mutex<OrchestratorState>,
    in_flight: Mutex<HashSet<Intent>>,
    status_tx: watch::Sender<SessionStatus>,
}

impl SessionOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        identity: Arc<dyn IdentityGateway>,
        sync: Arc<SessionSynchronizer>,
        codec: CommitmentCodec,
        storage: Arc<Storage>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Loading);

        Self {
            ledger,
            identity,
            sync,
            codec,
            storage,
            prompter,
            state: Mutex::new(OrchestratorState {
                account: None,
                confirmed: SessionStatus::Loading,
                failure: None,
                generation: 0,
            }),
            in_flight: Mutex::new(HashSet::new()),
            status_tx,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn account(&self) -> Option<Address> {
        self.state.lock().account
    }

    pub fn synchronizer(&self) -> &Arc<SessionSynchronizer> {
        &self.sync
    }

    /// Session the contract is currently running, as seen by `snapshot`.
    pub fn session_key(&self, snapshot: &SessionSnapshot) -> String {
        format!(
            "{:?}/{:?}/{:?}",
            self.ledger.contract_address(),
            snapshot.player1,
            snapshot.player2
        )
    }

    /// The caller's move for the latest known session, if one is retained.
    pub async fn retained_move(&self) -> Result<Option<RetainedMove>> {
        let (Some(account), Some(snapshot)) = (self.account(), self.sync.latest()) else {
            return Ok(None);
        };
        let key = self.session_key(&snapshot);
        Ok(MoveStore::new(&self.storage).load(&key, account).await?)
    }

    pub async fn connect(&self) -> Result<Address> {
        self.run(Intent::Connect, async {
            let account = self.identity.connect().await?;
            self.state.lock().account = Some(account);
            self.confirm(SessionStatus::Connected(account));

            if let Some(snapshot) = self.sync.latest() {
                self.reconcile(&snapshot).await?;
            }
            Ok(account)
        })
        .await
    }

    /// Takes the first free slot. Player 1 picks the stake; player 2 always
    /// stakes exactly what the contract has recorded.
    pub async fn join(&self) -> Result<JoinReceipt> {
        self.run(Intent::Join, async {
            let account = self.require_account()?;

            let snapshot = self.sync.refresh_now().await?;
            let slot = plan_join(&snapshot, account)?;

            let amount = match slot {
                Slot::Player1 => BetAmount::parse_display(&self.prompter.bet_amount().await?)?,
                Slot::Player2 => snapshot.bet_amount,
            };

            // not seated anywhere, so every retained move belongs to an
            // earlier game, possibly one between the same two players
            let stale = MoveStore::new(&self.storage).discard_all(account).await?;
            if stale > 0 {
                tracing::debug!("Dropped {} moves from earlier games", stale);
            }

            tracing::info!("Joining as {} with {}", slot, amount);
            self.ledger.submit_join(amount).await?;

            self.refresh_after_write().await;
            self.confirm(SessionStatus::Joined);
            Ok(JoinReceipt { slot, amount })
        })
        .await
    }

    /// Commits a hidden move. The move and secret are stored locally before
    /// submission; they are needed again to reveal.
    pub async fn commit(&self) -> Result<Commitment> {
        self.run(Intent::Commit, async {
            let account = self.require_account()?;
            let snapshot = self.sync.refresh_now().await?;

            if snapshot.slot_of(account).is_none() {
                return Err(GameError::NotJoined);
            }
            if !snapshot.is_full() {
                return Err(GameError::GameNotReady);
            }

            let key = self.session_key(&snapshot);
            let store = MoveStore::new(&self.storage);

            let (retained, reused) = match store.load(&key, account).await? {
                Some(existing) if existing.is_committed() => {
                    return Err(GameError::AlreadyCommitted)
                }
                // an earlier attempt may still land on chain; keep its pair
                Some(existing) => {
                    tracing::info!("Reusing move from an unconfirmed commit attempt");
                    (existing, true)
                }
                None => {
                    let choice: MoveChoice = self.prompter.move_choice().await?.parse()?;
                    let secret = Secret::new(self.prompter.secret().await?)?;
                    let commitment = self.codec.commit(choice, &secret);
                    let retained = RetainedMove::new(&key, account, choice, secret, commitment);
                    store.save(&retained).await?;
                    (retained, false)
                }
            };

            if let Err(e) = self.ledger.submit_commitment(retained.commitment).await {
                if reused && commit_already_landed(&e) {
                    tracing::info!("Earlier commit attempt reached the contract");
                } else {
                    if never_reached_chain(&e) {
                        if let Err(cleanup) = store.discard(&key, account).await {
                            tracing::warn!("Could not drop unsent move: {}", cleanup);
                        }
                    }
                    return Err(e.into());
                }
            }

            store.mark_committed(&key, account).await?;
            tracing::info!("Committed {} for session {}", retained.commitment, key);

            self.refresh_after_write().await;
            self.confirm(SessionStatus::MoveCommitted);
            Ok(retained.commitment)
        })
        .await
    }

    /// Reveals the committed move after checking locally that it opens the
    /// stored commitment.
    pub async fn reveal(&self, source: RevealSource) -> Result<MoveChoice> {
        self.run(Intent::Reveal, async {
            let account = self.require_account()?;
            let snapshot = self.sync.refresh_now().await?;
            let key = self.session_key(&snapshot);
            let store = MoveStore::new(&self.storage);

            let retained = store
                .load(&key, account)
                .await?
                .filter(|retained| retained.awaiting_reveal())
                .ok_or(GameError::NoPendingCommitment)?;

            let (choice, secret) = match source {
                RevealSource::Retained => (retained.choice, retained.secret.clone()),
                RevealSource::Manual => {
                    let choice: MoveChoice = self.prompter.move_choice().await?.parse()?;
                    let secret = Secret::new(self.prompter.secret().await?)?;
                    (choice, secret)
                }
            };

            if !self.codec.verify(choice, &secret, &retained.commitment) {
                return Err(GameError::CommitmentMismatch);
            }

            self.ledger.submit_reveal(choice, &secret).await?;
            store.mark_revealed(&key, account).await?;
            tracing::info!("Revealed {} for session {}", choice, key);

            self.refresh_after_write().await;
            self.confirm(SessionStatus::MoveRevealed);
            Ok(choice)
        })
        .await
    }

    /// Re-derives the confirmed status from a snapshot and the retained
    /// move. A failure shown to the user stays until the next intent.
    pub async fn reconcile(&self, snapshot: &SessionSnapshot) -> Result<SessionStatus> {
        let (account, generation) = {
            let state = self.state.lock();
            (state.account, state.generation)
        };
        let Some(account) = account else {
            return Ok(self.status());
        };

        let derived = self.derive_status(account, snapshot).await?;

        {
            let mut state = self.state.lock();
            if state.generation != generation {
                tracing::debug!("Skipping reconcile superseded by a confirmed intent");
                return Ok(state.status());
            }
            state.confirmed = derived;
        }

        self.publish();
        Ok(self.status())
    }

    async fn derive_status(
        &self,
        account: Address,
        snapshot: &SessionSnapshot,
    ) -> Result<SessionStatus> {
        if snapshot.slot_of(account).is_none() {
            return Ok(SessionStatus::Connected(account));
        }
        if !snapshot.is_full() {
            return Ok(SessionStatus::Joined);
        }

        let key = self.session_key(snapshot);
        let status = match MoveStore::new(&self.storage).load(&key, account).await? {
            Some(retained) if retained.is_revealed() => SessionStatus::MoveRevealed,
            Some(retained) if retained.is_committed() => SessionStatus::MoveCommitted,
            _ => SessionStatus::Joined,
        };
        Ok(status)
    }

    /// Runs one intent: rejects a repeat of an intent still in flight,
    /// clears the previous failure, and records a new one on error.
    async fn run<T, F>(&self, intent: Intent, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _guard = IntentGuard::acquire(&self.in_flight, intent)?;

        {
            let mut state = self.state.lock();
            state.failure = None;
        }
        self.publish();

        match work.await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.fail(intent, &e);
                Err(e)
            }
        }
    }

    fn require_account(&self) -> Result<Address> {
        self.account().ok_or(GameError::NotConnected)
    }

    /// The write is final; a failed refresh here only delays the display.
    async fn refresh_after_write(&self) {
        if let Err(e) = self.sync.refresh_now().await {
            tracing::warn!("Refresh after confirmed write failed: {}", e);
        }
    }

    fn confirm(&self, status: SessionStatus) {
        {
            let mut state = self.state.lock();
            state.confirmed = status;
            state.failure = None;
            state.generation += 1;
        }
        self.publish();
    }

    fn fail(&self, intent: Intent, err: &GameError) {
        if err.is_local() {
            tracing::info!("{} refused: {}", intent, err);
        } else {
            tracing::warn!("{} failed: {}", intent, err);
        }
        {
            let mut state = self.state.lock();
            if matches!(err, GameError::Core(CoreError::WalletUnavailable)) {
                state.confirmed = SessionStatus::WalletMissing;
            } else {
                state.failure = Some(err.reason());
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let status = self.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

/// Join rules: first free slot wins, a party never takes both slots.
pub fn plan_join(snapshot: &SessionSnapshot, account: Address) -> Result<Slot> {
    if snapshot.is_open_for_player1() {
        Ok(Slot::Player1)
    } else if snapshot.player2.is_zero() && snapshot.player1 != account {
        Ok(Slot::Player2)
    } else if snapshot.slot_of(account).is_some() {
        Err(GameError::AlreadyJoined)
    } else {
        Err(GameError::GameFull)
    }
}

/// Failures that guarantee nothing was mined.
fn never_reached_chain(err: &CoreError) -> bool {
    matches!(
        err,
        CoreError::TransactionRejected(_)
            | CoreError::InsufficientFunds(_)
            | CoreError::UserRejected
            | CoreError::WalletUnavailable
    )
}

/// The contract refusing a second commitment from this account.
fn commit_already_landed(err: &CoreError) -> bool {
    match err {
        CoreError::ContractReverted(reason) => {
            reason.to_ascii_lowercase().contains("already committed")
        }
        _ => false,
    }
}

struct IntentGuard<'a> {
    in_flight: &'a Mutex<HashSet<Intent>>,
    intent: Intent,
}

impl<'a> IntentGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<Intent>>, intent: Intent) -> Result<Self> {
        if !in_flight.lock().insert(intent) {
            tracing::debug!("Rejecting repeated {} while one is in flight", intent);
            return Err(GameError::IntentInFlight(intent));
        }
        Ok(Self { in_flight, intent })
    }
}

impl Drop for IntentGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.intent);
    }
}
