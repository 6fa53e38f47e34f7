use crate::config::ClientConfig;
use crate::error::{CoreError, Result};
use crate::ledger::{classify_failure, LedgerGateway};
use crate::types::{BetAmount, Commitment, MoveChoice, Secret, SessionSnapshot};
use crate::wallet::WalletIdentity;

use async_trait::async_trait;
use ethers::abi::Detokenize;
use ethers::contract::{abigen, ContractCall, ContractError};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::LocalWallet;
use ethers::types::{Address, BlockId, BlockNumber, U64};
use std::sync::Arc;

abigen!(
    RockPaperScissors,
    r#"[
        function getPlayers() external view returns (address, address)
        function betAmount() external view returns (uint256)
        function joinGame() external payable
        function commitMove(bytes32 moveHash) external
        function revealMove(uint8 choice, string secret) external
    ]"#
);

type SignedClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// [`LedgerGateway`] over JSON-RPC.
pub struct EthLedger {
    provider: Provider<Http>,
    identity: Arc<WalletIdentity>,
    contract: Address,
    confirmations: usize,
}

impl EthLedger {
    pub fn new(
        provider: Provider<Http>,
        identity: Arc<WalletIdentity>,
        contract: Address,
        confirmations: usize,
    ) -> Self {
        Self {
            provider,
            identity,
            contract,
            confirmations,
        }
    }

    pub fn from_config(config: &ClientConfig, identity: Arc<WalletIdentity>) -> Result<Self> {
        let provider = connect_provider(config)?;
        Ok(Self::new(
            provider,
            identity,
            config.contract_address,
            config.confirmations,
        ))
    }

    fn reader(&self) -> RockPaperScissors<Provider<Http>> {
        RockPaperScissors::new(self.contract, Arc::new(self.provider.clone()))
    }

    async fn writer(&self) -> Result<RockPaperScissors<SignedClient>> {
        let signer = self.identity.authorized_signer().await?;
        let client = SignerMiddleware::new(self.provider.clone(), signer);
        Ok(RockPaperScissors::new(self.contract, Arc::new(client)))
    }

    /// Sends the call and waits for the configured confirmation depth.
    async fn send_and_confirm<D: Detokenize>(
        &self,
        call: ContractCall<SignedClient, D>,
        label: &str,
    ) -> Result<()> {
        let pending = call.send().await.map_err(contract_failure)?;
        let tx_hash = pending.tx_hash();
        tracing::info!("{} submitted: {:?}", label, tx_hash);

        let receipt = pending
            .confirmations(self.confirmations)
            .await
            .map_err(|e| classify_failure(&e.to_string()))?
            .ok_or_else(|| {
                CoreError::network(format!("{} transaction {:?} was dropped", label, tx_hash))
            })?;

        if receipt.status == Some(U64::zero()) {
            return Err(CoreError::reverted(format!(
                "{} transaction {:?} reverted",
                label, tx_hash
            )));
        }

        tracing::info!(
            "{} confirmed in block {:?}: {:?}",
            label,
            receipt.block_number,
            tx_hash
        );
        Ok(())
    }
}

#[async_trait]
impl LedgerGateway for EthLedger {
    fn contract_address(&self) -> Address {
        self.contract
    }

    async fn fetch_snapshot(&self) -> Result<SessionSnapshot> {
        let block = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| CoreError::network(e.to_string()))?;
        // both reads pinned to one block so players and stake agree
        let at = BlockId::from(BlockNumber::Number(block));

        let contract = self.reader();
        let (player1, player2) = contract
            .get_players()
            .block(at)
            .call()
            .await
            .map_err(|e| CoreError::network(e.to_string()))?;
        let bet = contract
            .bet_amount()
            .block(at)
            .call()
            .await
            .map_err(|e| CoreError::network(e.to_string()))?;

        let snapshot = SessionSnapshot::new(player1, player2, BetAmount::from_wei(bet));
        if !snapshot.is_consistent() {
            tracing::warn!("Inconsistent session read at block {}: {:?}", block, snapshot);
        }

        tracing::debug!("Fetched snapshot at block {}", block);
        Ok(snapshot)
    }

    async fn submit_join(&self, amount: BetAmount) -> Result<()> {
        let contract = self.writer().await?;
        let call = contract.join_game().value(amount.wei());
        self.send_and_confirm(call, "joinGame").await
    }

    async fn submit_commitment(&self, commitment: Commitment) -> Result<()> {
        let contract = self.writer().await?;
        let call = contract.commit_move(*commitment.as_bytes());
        self.send_and_confirm(call, "commitMove").await
    }

    async fn submit_reveal(&self, choice: MoveChoice, secret: &Secret) -> Result<()> {
        let contract = self.writer().await?;
        let call = contract.reveal_move(choice.wire(), secret.expose().to_string());
        self.send_and_confirm(call, "revealMove").await
    }
}

pub fn connect_provider(config: &ClientConfig) -> Result<Provider<Http>> {
    Provider::<Http>::try_from(config.rpc_url.as_str())
        .map_err(|e| CoreError::config(format!("Invalid RPC URL {}: {}", config.rpc_url, e)))
}

/// Chain id from the config, or from the node when the config leaves it unset.
pub async fn resolve_chain_id(config: &ClientConfig) -> Result<u64> {
    if let Some(chain_id) = config.chain_id {
        return Ok(chain_id);
    }

    let provider = connect_provider(config)?;
    let chain_id = provider
        .get_chainid()
        .await
        .map_err(|e| CoreError::network(e.to_string()))?;
    Ok(chain_id.as_u64())
}

fn contract_failure<M: Middleware>(err: ContractError<M>) -> CoreError {
    if let Some(reason) = err.decode_revert::<String>() {
        return CoreError::reverted(reason);
    }
    classify_failure(&err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::utils::id;

    fn offline_reader() -> RockPaperScissors<Provider<Http>> {
        let provider = Provider::<Http>::try_from("http://localhost:8545").unwrap();
        RockPaperScissors::new(Address::repeat_byte(0x11), Arc::new(provider))
    }

    #[test]
    fn test_reveal_calldata_encodes_move_as_uint8() {
        let contract = offline_reader();
        let calldata = contract
            .reveal_move(MoveChoice::Paper.wire(), "abc".to_string())
            .calldata()
            .unwrap();

        assert_eq!(&calldata[..4], &id("revealMove(uint8,string)"));
        // first head word is the move, left-padded
        assert_eq!(calldata[4 + 31], 2);
        assert!(calldata[4..4 + 31].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_commit_calldata_carries_digest() {
        let contract = offline_reader();
        let commitment = Commitment::from_bytes([0xab; 32]);
        let calldata = contract
            .commit_move(*commitment.as_bytes())
            .calldata()
            .unwrap();

        assert_eq!(&calldata[..4], &id("commitMove(bytes32)"));
        assert_eq!(&calldata[4..], commitment.as_bytes());
    }

    #[test]
    fn test_invalid_rpc_url_is_config_error() {
        let config = ClientConfig::new("not a url", Address::repeat_byte(1));
        assert!(matches!(connect_provider(&config), Err(CoreError::Config(_))));
    }
}
