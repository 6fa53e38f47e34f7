use rps_core::testing::{InMemoryLedger, ScriptedPrompter, StaticIdentity, Submission};
use rps_core::{Address, BetAmount, ClientConfig, MoveChoice, SessionSnapshot, Slot, Storage};
use rps_game::{GameError, RevealSource, SessionContext, SessionStatus};
use std::sync::Arc;

struct Player {
    address: Address,
    prompter: Arc<ScriptedPrompter>,
    context: SessionContext,
    _dir: tempfile::TempDir,
}

async fn player(contract: &InMemoryLedger, byte: u8) -> Player {
    let address = Address::repeat_byte(byte);
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(Storage::new(&dir.path().join("rps.db")).await.unwrap());
    let prompter = Arc::new(ScriptedPrompter::new());

    let context = SessionContext::new(
        Arc::new(contract.as_party(address)),
        Arc::new(StaticIdentity::new(address)),
        storage,
        prompter.clone(),
        &ClientConfig::default(),
    );
    context.orchestrator().connect().await.unwrap();

    Player {
        address,
        prompter,
        context,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_full_match() {
    let contract = InMemoryLedger::new();
    let a = player(&contract, 0xaa).await;
    let b = player(&contract, 0xbb).await;
    let one = BetAmount::parse_display("1.0").unwrap();

    a.prompter.push_bet_amount("1.0");
    let joined = a.context.orchestrator().join().await.unwrap();
    assert_eq!(joined.slot, Slot::Player1);

    // B's own input is never asked for; the recorded stake wins
    b.prompter.push_bet_amount("2.0");
    let joined = b.context.orchestrator().join().await.unwrap();
    assert_eq!(joined.slot, Slot::Player2);
    assert_eq!(joined.amount, one);
    assert_eq!(b.prompter.bet_prompts(), 0);
    assert_eq!(
        contract.snapshot(),
        SessionSnapshot::new(a.address, b.address, one)
    );

    a.prompter.push_move("rock");
    a.prompter.push_secret("alpha");
    b.prompter.push_move("3");
    b.prompter.push_secret("9beta");
    a.context.orchestrator().commit().await.unwrap();
    b.context.orchestrator().commit().await.unwrap();
    assert_eq!(
        b.context.orchestrator().status(),
        SessionStatus::MoveCommitted
    );

    assert_eq!(
        a.context
            .orchestrator()
            .reveal(RevealSource::Retained)
            .await
            .unwrap(),
        MoveChoice::Rock
    );
    assert_eq!(
        b.context
            .orchestrator()
            .reveal(RevealSource::Retained)
            .await
            .unwrap(),
        MoveChoice::Scissors
    );
    assert_eq!(contract.revealed_move_of(a.address), Some(MoveChoice::Rock));
    assert_eq!(
        contract.revealed_move_of(b.address),
        Some(MoveChoice::Scissors)
    );

    let writes = contract.write_attempts();
    assert!(matches!(
        a.context.orchestrator().join().await,
        Err(GameError::AlreadyJoined)
    ));
    assert!(matches!(
        a.context.orchestrator().commit().await,
        Err(GameError::AlreadyCommitted)
    ));
    assert!(matches!(
        b.context.orchestrator().reveal(RevealSource::Retained).await,
        Err(GameError::NoPendingCommitment)
    ));
    assert_eq!(contract.write_attempts(), writes);

    let joins = contract
        .submissions()
        .into_iter()
        .filter(|s| matches!(s, Submission::Join { .. }))
        .count();
    assert_eq!(joins, 2);
}

#[tokio::test]
async fn test_third_party_cannot_join_full_game() {
    let contract = InMemoryLedger::new();
    let a = player(&contract, 0xaa).await;
    let b = player(&contract, 0xbb).await;
    let c = player(&contract, 0xcc).await;

    a.prompter.push_bet_amount("0.5");
    a.context.orchestrator().join().await.unwrap();
    b.context.orchestrator().join().await.unwrap();

    c.prompter.push_bet_amount("0.5");
    let err = c.context.orchestrator().join().await.unwrap_err();
    assert!(matches!(err, GameError::GameFull));
    assert_eq!(
        c.context.orchestrator().status(),
        SessionStatus::Failed("Game is full".to_string())
    );
    assert_eq!(contract.submissions().len(), 2);
}
