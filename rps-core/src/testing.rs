//! In-memory stand-ins for the contract and the user, for tests.

use crate::error::{CoreError, Result};
use crate::ledger::LedgerGateway;
use crate::prompt::Prompter;
use crate::wallet::IdentityGateway;
use crate::types::{BetAmount, Commitment, MoveChoice, Secret, SessionSnapshot};

use async_trait::async_trait;
use ethers::types::Address;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// A write accepted by [`InMemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Join {
        from: Address,
        amount: BetAmount,
    },
    Commit {
        from: Address,
        commitment: Commitment,
    },
    Reveal {
        from: Address,
        choice: MoveChoice,
        secret: String,
    },
}

#[derive(Debug, Default)]
struct ContractState {
    player1: Address,
    player2: Address,
    bet: BetAmount,
    commitments: HashMap<Address, Commitment>,
    reveals: HashMap<Address, (MoveChoice, String)>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<ContractState>,
    submissions: Mutex<Vec<Submission>>,
    fetches: AtomicUsize,
    write_attempts: AtomicUsize,
    fetch_failures: Mutex<VecDeque<CoreError>>,
    write_failures: Mutex<VecDeque<CoreError>>,
    gate: Mutex<Option<WriteGate>>,
}

/// Contract simulator. Each handle acts for one party, like a signer bound
/// to an address; handles made with [`InMemoryLedger::as_party`] share state.
#[derive(Clone)]
pub struct InMemoryLedger {
    shared: Arc<Shared>,
    contract: Address,
    party: Address,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            contract: Address::repeat_byte(0xc0),
            party: Address::zero(),
        }
    }

    pub fn as_party(&self, party: Address) -> Self {
        Self {
            shared: self.shared.clone(),
            contract: self.contract,
            party,
        }
    }

    pub fn party(&self) -> Address {
        self.party
    }

    /// Overwrites players and stake, clearing commitments and reveals.
    pub fn set_snapshot(&self, snapshot: &SessionSnapshot) {
        let mut state = self.shared.state.lock();
        *state = ContractState {
            player1: snapshot.player1,
            player2: snapshot.player2,
            bet: snapshot.bet_amount,
            ..ContractState::default()
        };
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.state.lock();
        SessionSnapshot::new(state.player1, state.player2, state.bet)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.shared.submissions.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.shared.fetches.load(Ordering::SeqCst)
    }

    /// Writes that reached the ledger, accepted or not.
    pub fn write_attempts(&self) -> usize {
        self.shared.write_attempts.load(Ordering::SeqCst)
    }

    pub fn commitment_of(&self, party: Address) -> Option<Commitment> {
        self.shared.state.lock().commitments.get(&party).copied()
    }

    pub fn revealed_move_of(&self, party: Address) -> Option<MoveChoice> {
        self.shared
            .state
            .lock()
            .reveals
            .get(&party)
            .map(|(choice, _)| *choice)
    }

    pub fn fail_next_fetch(&self, err: CoreError) {
        self.shared.fetch_failures.lock().push_back(err);
    }

    pub fn fail_next_write(&self, err: CoreError) {
        self.shared.write_failures.lock().push_back(err);
    }

    /// Makes every write wait until the returned gate releases it.
    pub fn hold_writes(&self) -> WriteGate {
        let gate = WriteGate::default();
        *self.shared.gate.lock() = Some(gate.clone());
        gate
    }

    async fn begin_write(&self) -> Result<()> {
        self.shared.write_attempts.fetch_add(1, Ordering::SeqCst);

        let gate = self.shared.gate.lock().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            let permit = gate
                .permits
                .acquire()
                .await
                .map_err(|_| CoreError::network("write gate closed"))?;
            permit.forget();
        }

        match self.shared.write_failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record(&self, submission: Submission) {
        self.shared.submissions.lock().push(submission);
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    fn contract_address(&self) -> Address {
        self.contract
    }

    async fn fetch_snapshot(&self) -> Result<SessionSnapshot> {
        self.shared.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.shared.fetch_failures.lock().pop_front() {
            return Err(err);
        }
        Ok(self.snapshot())
    }

    async fn submit_join(&self, amount: BetAmount) -> Result<()> {
        self.begin_write().await?;
        let from = self.party;

        {
            let mut state = self.shared.state.lock();
            if state.player1.is_zero() {
                if amount.is_zero() {
                    return Err(CoreError::reverted("Bet must be greater than zero"));
                }
                state.player1 = from;
                state.bet = amount;
            } else if state.player2.is_zero() {
                if state.player1 == from {
                    return Err(CoreError::reverted("Already joined"));
                }
                if amount != state.bet {
                    return Err(CoreError::reverted("Bet must match player 1"));
                }
                state.player2 = from;
            } else {
                return Err(CoreError::reverted("Game is full"));
            }
        }

        self.record(Submission::Join { from, amount });
        Ok(())
    }

    async fn submit_commitment(&self, commitment: Commitment) -> Result<()> {
        self.begin_write().await?;
        let from = self.party;

        {
            let mut state = self.shared.state.lock();
            if state.player1 != from && state.player2 != from {
                return Err(CoreError::reverted("Not a player"));
            }
            if state.commitments.contains_key(&from) {
                return Err(CoreError::reverted("Already committed"));
            }
            state.commitments.insert(from, commitment);
        }

        self.record(Submission::Commit { from, commitment });
        Ok(())
    }

    async fn submit_reveal(&self, choice: MoveChoice, secret: &Secret) -> Result<()> {
        self.begin_write().await?;
        let from = self.party;

        {
            let mut state = self.shared.state.lock();
            if !state.commitments.contains_key(&from) {
                return Err(CoreError::reverted("No commitment"));
            }
            if state.reveals.contains_key(&from) {
                return Err(CoreError::reverted("Already revealed"));
            }
            state
                .reveals
                .insert(from, (choice, secret.expose().to_string()));
        }

        self.record(Submission::Reveal {
            from,
            choice,
            secret: secret.expose().to_string(),
        });
        Ok(())
    }
}

/// Holds writes of an [`InMemoryLedger`] until released.
#[derive(Clone)]
pub struct WriteGate {
    permits: Arc<Semaphore>,
    entered: Arc<Notify>,
}

impl Default for WriteGate {
    fn default() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
            entered: Arc::new(Notify::new()),
        }
    }
}

impl WriteGate {
    /// Resolves once a write is waiting at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self, writes: usize) {
        self.permits.add_permits(writes);
    }
}

/// Identity with a fixed address, or none to simulate a missing wallet.
pub struct StaticIdentity {
    address: Option<Address>,
}

impl StaticIdentity {
    pub fn new(address: Address) -> Self {
        Self {
            address: Some(address),
        }
    }

    pub fn missing() -> Self {
        Self {
            address: None,
        }
    }
}

#[async_trait]
impl IdentityGateway for StaticIdentity {
    async fn connect(&self) -> Result<Address> {
        self.address.ok_or(CoreError::WalletUnavailable)
    }
}

/// Answers prompts from pre-loaded queues.
pub struct ScriptedPrompter {
    authorize: AtomicBool,
    authorization_requests: AtomicUsize,
    bet_prompts: AtomicUsize,
    bet_amounts: Mutex<VecDeque<String>>,
    moves: Mutex<VecDeque<String>>,
    secrets: Mutex<VecDeque<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self {
            authorize: AtomicBool::new(true),
            authorization_requests: AtomicUsize::new(0),
            bet_prompts: AtomicUsize::new(0),
            bet_amounts: Mutex::new(VecDeque::new()),
            moves: Mutex::new(VecDeque::new()),
            secrets: Mutex::new(VecDeque::new()),
        }
    }

    pub fn declining_authorization(self) -> Self {
        self.set_authorization(false);
        self
    }

    pub fn set_authorization(&self, allow: bool) {
        self.authorize.store(allow, Ordering::SeqCst);
    }

    pub fn push_bet_amount(&self, amount: &str) {
        self.bet_amounts.lock().push_back(amount.to_string());
    }

    pub fn push_move(&self, choice: &str) {
        self.moves.lock().push_back(choice.to_string());
    }

    pub fn push_secret(&self, secret: &str) {
        self.secrets.lock().push_back(secret.to_string());
    }

    pub fn authorization_requests(&self) -> usize {
        self.authorization_requests.load(Ordering::SeqCst)
    }

    pub fn bet_prompts(&self) -> usize {
        self.bet_prompts.load(Ordering::SeqCst)
    }

    fn next(queue: &Mutex<VecDeque<String>>, what: &str) -> Result<String> {
        queue
            .lock()
            .pop_front()
            .ok_or_else(|| CoreError::dialog(format!("no scripted {}", what)))
    }
}

impl Default for ScriptedPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn authorize(&self, _address: Address, _contract: Address) -> Result<bool> {
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.authorize.load(Ordering::SeqCst))
    }

    async fn bet_amount(&self) -> Result<String> {
        self.bet_prompts.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.bet_amounts, "bet amount")
    }

    async fn move_choice(&self) -> Result<String> {
        Self::next(&self.moves, "move")
    }

    async fn secret(&self) -> Result<String> {
        Self::next(&self.secrets, "secret")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulator_enforces_join_rules() {
        let ledger = InMemoryLedger::new();
        let a = ledger.as_party(Address::repeat_byte(0xaa));
        let b = ledger.as_party(Address::repeat_byte(0xbb));
        let c = ledger.as_party(Address::repeat_byte(0xcc));
        let one = BetAmount::parse_display("1").unwrap();
        let two = BetAmount::parse_display("2").unwrap();

        assert_eq!(ledger.fetch_snapshot().await.unwrap(), SessionSnapshot::empty());

        a.submit_join(one).await.unwrap();
        assert!(matches!(
            a.submit_join(one).await,
            Err(CoreError::ContractReverted(_))
        ));
        assert!(matches!(
            b.submit_join(two).await,
            Err(CoreError::ContractReverted(_))
        ));
        b.submit_join(one).await.unwrap();
        assert!(c.submit_join(one).await.is_err());

        let snapshot = ledger.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.player1, a.party());
        assert_eq!(snapshot.player2, b.party());
        assert_eq!(ledger.submissions().len(), 2);
        assert_eq!(ledger.write_attempts(), 5);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_once() {
        let ledger = InMemoryLedger::new();
        ledger.fail_next_fetch(CoreError::network("down"));

        assert!(ledger.fetch_snapshot().await.is_err());
        assert!(ledger.fetch_snapshot().await.is_ok());
        assert_eq!(ledger.fetch_count(), 2);
    }
}
