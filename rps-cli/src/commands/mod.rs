mod config;

pub use config::{handle_config_command, ConfigCommands};

use crate::config::CliConfig;
use crate::prompt::DialoguerPrompter;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};
use rps_core::ledger::ethereum::resolve_chain_id;
use rps_core::types::display_address;
use rps_core::{ClientConfig, CoreError, EthLedger, Slot, Storage, WalletIdentity};
use rps_game::{GameError, RevealSource, SessionContext, SessionStatus};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Everything one command needs to talk to the contract.
pub struct Session {
    pub context: SessionContext,
    pub config: ClientConfig,
}

pub async fn open_session(
    cli_config: &CliConfig,
    config: ClientConfig,
    private_key: Option<&str>,
    prompter: DialoguerPrompter,
) -> Result<Session> {
    let prompter = Arc::new(prompter);
    let chain_id = resolve_chain_id(&config).await?;
    tracing::debug!("Using chain id {}", chain_id);

    let identity = Arc::new(WalletIdentity::from_private_key(
        private_key,
        chain_id,
        config.contract_address,
        prompter.clone(),
    )?);
    let ledger = Arc::new(EthLedger::from_config(&config, identity.clone())?);
    let storage = Arc::new(Storage::new(&cli_config.db_path()).await?);

    let context = SessionContext::new(ledger, identity, storage, prompter, &config);
    Ok(Session { context, config })
}

/// Connects unless no wallet is configured; read-only commands still work then.
async fn connect_optional(session: &Session) -> Result<()> {
    match session.context.orchestrator().connect().await {
        Ok(_) => Ok(()),
        Err(GameError::Core(CoreError::WalletUnavailable)) => {
            println!("No private key configured; showing the contract read-only.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn show_status(session: &Session) -> Result<()> {
    let orchestrator = session.context.orchestrator();
    let snapshot = session.context.synchronizer().refresh_now().await?;
    connect_optional(session).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec![
        "Contract".to_string(),
        format!("{:?}", session.config.contract_address),
    ]);
    table.add_row(vec!["Player 1".to_string(), display_address(&snapshot.player1)]);
    table.add_row(vec!["Player 2".to_string(), display_address(&snapshot.player2)]);
    table.add_row(vec!["Bet".to_string(), snapshot.bet_amount.to_string()]);

    if let Some(account) = orchestrator.account() {
        let slot = snapshot
            .slot_of(account)
            .map(|slot| slot.to_string())
            .unwrap_or_else(|| "not joined".to_string());
        table.add_row(vec!["You".to_string(), format!("{:?} ({})", account, slot)]);
    }

    if let Some(retained) = orchestrator.retained_move().await? {
        let stage = if retained.is_revealed() {
            "revealed"
        } else if retained.is_committed() {
            "committed, awaiting reveal"
        } else {
            "commit not confirmed"
        };
        table.add_row(vec![
            "Your move".to_string(),
            format!("{} ({})", retained.choice, stage),
        ]);
    }

    table.add_row(vec!["Status".to_string(), orchestrator.status().to_string()]);

    println!("{}", table);
    Ok(())
}

pub async fn join(session: &Session) -> Result<()> {
    let orchestrator = session.context.orchestrator();
    orchestrator.connect().await?;

    let receipt = orchestrator.join().await?;
    println!("Joined as {} with a stake of {}", receipt.slot, receipt.amount);
    if receipt.slot == Slot::Player1 {
        println!("Waiting for an opponent. Run 'rps watch' to follow the game.");
    }
    Ok(())
}

pub async fn commit(session: &Session) -> Result<()> {
    let orchestrator = session.context.orchestrator();
    orchestrator.connect().await?;

    let commitment = orchestrator.commit().await?;
    println!("Move committed: {}", commitment);
    println!("Reveal it with 'rps reveal' once your opponent has committed.");
    Ok(())
}

pub async fn reveal(session: &Session, manual: bool) -> Result<()> {
    let orchestrator = session.context.orchestrator();
    orchestrator.connect().await?;

    let source = if manual {
        RevealSource::Manual
    } else {
        RevealSource::Retained
    };
    let choice = orchestrator.reveal(source).await?;
    println!("Revealed {}", choice);
    Ok(())
}

/// Follows the contract until Ctrl-C, printing every change.
pub async fn watch(mut session: Session) -> Result<()> {
    connect_optional(&session).await?;

    let sync = session.context.synchronizer().clone();
    let mut snapshots = sync.subscribe();
    let mut statuses = session.context.orchestrator().subscribe_status();
    let mut failures = sync.failures();

    session.context.start();
    println!(
        "Watching {:?} every {:?} (Ctrl-C to stop)",
        session.config.contract_address,
        sync.interval()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = latest {
                    println!(
                        "Game: player 1 {} | player 2 {} | bet {}",
                        display_address(&snapshot.player1),
                        display_address(&snapshot.player2),
                        snapshot.bet_amount
                    );
                }
            }
            changed = statuses.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = statuses.borrow_and_update().clone();
                if status != SessionStatus::Loading {
                    println!("Status: {}", status);
                }
            }
            failure = failures.recv() => match failure {
                Ok(failure) => {
                    println!(
                        "[{}] Poll failed: {}",
                        failure.at.format("%H:%M:%S"),
                        failure.reason
                    );
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!("Missed {} poll failure notices", missed);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.context.shutdown().await;
    println!("Stopped watching");
    Ok(())
}
