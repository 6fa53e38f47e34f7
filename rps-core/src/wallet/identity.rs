use crate::error::{CoreError, Result};
use crate::prompt::Prompter;
use crate::wallet::{parse_signing_key, IdentityGateway};

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Identity backed by a locally held signing key.
///
/// Authorization is asked once per process through the [`Prompter`]; the
/// authorized wallet, bound to the chain id, is then reused for every write.
pub struct WalletIdentity {
    wallet: Option<LocalWallet>,
    chain_id: u64,
    contract: Address,
    prompter: Arc<dyn Prompter>,
    authorized: OnceCell<LocalWallet>,
}

impl WalletIdentity {
    pub fn new(
        wallet: Option<LocalWallet>,
        chain_id: u64,
        contract: Address,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            wallet,
            chain_id,
            contract,
            prompter,
            authorized: OnceCell::new(),
        }
    }

    pub fn from_private_key(
        private_key: Option<&str>,
        chain_id: u64,
        contract: Address,
        prompter: Arc<dyn Prompter>,
    ) -> Result<Self> {
        let wallet = private_key.map(parse_signing_key).transpose()?;
        Ok(Self::new(wallet, chain_id, contract, prompter))
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized.initialized()
    }

    /// Signer for write operations. Goes through [`IdentityGateway::connect`],
    /// so it fails the same way when no key is present or the user declines.
    pub async fn authorized_signer(&self) -> Result<LocalWallet> {
        self.connect().await?;
        self.authorized
            .get()
            .cloned()
            .ok_or_else(|| CoreError::internal("Signer missing after authorization"))
    }
}

#[async_trait]
impl IdentityGateway for WalletIdentity {
    async fn connect(&self) -> Result<Address> {
        let wallet = self
            .authorized
            .get_or_try_init(|| async {
                let wallet = self.wallet.clone().ok_or(CoreError::WalletUnavailable)?;

                if !self.prompter.authorize(wallet.address(), self.contract).await? {
                    tracing::warn!("Authorization declined for {:?}", wallet.address());
                    return Err(CoreError::UserRejected);
                }

                tracing::info!(
                    "Authorized {:?} on chain {} for contract {:?}",
                    wallet.address(),
                    self.chain_id,
                    self.contract
                );
                Ok(wallet.with_chain_id(self.chain_id))
            })
            .await?;

        Ok(wallet.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPrompter;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    fn contract() -> Address {
        Address::repeat_byte(0xc0)
    }

    #[tokio::test]
    async fn test_connect_without_key_is_wallet_unavailable() {
        let prompter = Arc::new(ScriptedPrompter::new());
        let identity = WalletIdentity::from_private_key(None, 31337, contract(), prompter.clone())
            .unwrap();

        assert!(matches!(
            identity.connect().await,
            Err(CoreError::WalletUnavailable)
        ));
        assert_eq!(prompter.authorization_requests(), 0);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let prompter = Arc::new(ScriptedPrompter::new());
        let identity =
            WalletIdentity::from_private_key(Some(KEY), 31337, contract(), prompter.clone())
                .unwrap();

        let first = identity.connect().await.unwrap();
        let second = identity.connect().await.unwrap();

        assert_eq!(format!("{:?}", first), KEY_ADDRESS);
        assert_eq!(first, second);
        assert_eq!(prompter.authorization_requests(), 1);

        let signer = identity.authorized_signer().await.unwrap();
        assert_eq!(signer.chain_id(), 31337);
        assert_eq!(prompter.authorization_requests(), 1);
    }

    #[tokio::test]
    async fn test_declined_authorization_can_be_retried() {
        let prompter = Arc::new(ScriptedPrompter::new().declining_authorization());
        let identity =
            WalletIdentity::from_private_key(Some(KEY), 1, contract(), prompter.clone()).unwrap();

        assert!(matches!(identity.connect().await, Err(CoreError::UserRejected)));
        assert!(!identity.is_authorized());

        prompter.set_authorization(true);
        identity.connect().await.unwrap();
        assert!(identity.is_authorized());
        assert_eq!(prompter.authorization_requests(), 2);
    }

    #[test]
    fn test_bad_key_does_not_leak() {
        let prompter = Arc::new(ScriptedPrompter::new());
        let err = WalletIdentity::from_private_key(Some("0xdeadbeef"), 1, contract(), prompter)
            .err()
            .unwrap();
        assert!(!err.to_string().contains("deadbeef"));
    }
}
