use async_trait::async_trait;
use dialoguer::{Confirm, Input, Password, Select};
use parking_lot::Mutex;
use rps_core::{Address, CoreError, MoveChoice, Prompter, Result, Secret};

/// Terminal prompts. Values given on the command line answer the matching
/// prompt once without asking.
pub struct DialoguerPrompter {
    assume_yes: bool,
    generate_secret: bool,
    bet_amount: Mutex<Option<String>>,
    move_choice: Mutex<Option<String>>,
    secret: Mutex<Option<String>>,
}

impl DialoguerPrompter {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            generate_secret: false,
            bet_amount: Mutex::new(None),
            move_choice: Mutex::new(None),
            secret: Mutex::new(None),
        }
    }

    pub fn with_bet_amount(self, amount: Option<String>) -> Self {
        *self.bet_amount.lock() = amount;
        self
    }

    pub fn with_move(self, choice: Option<String>) -> Self {
        *self.move_choice.lock() = choice;
        self
    }

    pub fn with_secret(self, secret: Option<String>) -> Self {
        *self.secret.lock() = secret;
        self
    }

    /// An empty secret answer produces a random one.
    pub fn generating_secrets(mut self) -> Self {
        self.generate_secret = true;
        self
    }
}

async fn interact<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::internal(format!("Prompt task failed: {}", e)))?
        .map_err(|e| CoreError::dialog(e.to_string()))
}

#[async_trait]
impl Prompter for DialoguerPrompter {
    async fn authorize(&self, address: Address, contract: Address) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }

        let prompt = format!(
            "Allow {:?} to sign transactions for contract {:?}?",
            address, contract
        );
        interact(move || Confirm::new().with_prompt(prompt).default(true).interact()).await
    }

    async fn bet_amount(&self) -> Result<String> {
        if let Some(amount) = self.bet_amount.lock().take() {
            return Ok(amount);
        }

        interact(|| {
            Input::<String>::new()
                .with_prompt("Bet amount (ETH)")
                .interact_text()
        })
        .await
    }

    async fn move_choice(&self) -> Result<String> {
        if let Some(choice) = self.move_choice.lock().take() {
            return Ok(choice);
        }

        let items: Vec<String> = MoveChoice::ALL.iter().map(|m| m.to_string()).collect();
        let index = interact(move || {
            Select::new()
                .with_prompt("Your move")
                .items(&items)
                .default(0)
                .interact()
        })
        .await?;

        MoveChoice::ALL
            .get(index)
            .map(|choice| choice.wire().to_string())
            .ok_or_else(|| CoreError::InvalidMove(index.to_string()))
    }

    async fn secret(&self) -> Result<String> {
        if let Some(secret) = self.secret.lock().take() {
            return Ok(secret);
        }

        if self.generate_secret {
            let typed = interact(|| {
                Password::new()
                    .with_prompt("Secret (empty to generate one)")
                    .allow_empty_password(true)
                    .interact()
            })
            .await?;

            if typed.is_empty() {
                let secret = Secret::generate();
                println!("Generated secret: {}", secret.expose());
                println!("It is stored locally and used automatically on reveal.");
                return Ok(secret.expose().to_string());
            }
            return Ok(typed);
        }

        interact(|| Password::new().with_prompt("Secret").interact()).await
    }
}
