use crate::config::parse_address;
use crate::error::{CoreError, Result};
use crate::storage::Storage;
use crate::types::{Commitment, MoveChoice, Secret};
use chrono::{DateTime, Utc};
use ethers::types::Address;
use rusqlite::params;

/// A committed (or about to be committed) move and the secret hiding it.
#[derive(Debug, Clone, PartialEq)]
pub struct RetainedMove {
    pub session_key: String,
    pub player: Address,
    pub choice: MoveChoice,
    pub secret: Secret,
    pub commitment: Commitment,
    pub created_at: DateTime<Utc>,
    pub committed_at: Option<DateTime<Utc>>,
    pub revealed_at: Option<DateTime<Utc>>,
}

impl RetainedMove {
    pub fn new(
        session_key: impl Into<String>,
        player: Address,
        choice: MoveChoice,
        secret: Secret,
        commitment: Commitment,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            player,
            choice,
            secret,
            commitment,
            created_at: Utc::now(),
            committed_at: None,
            revealed_at: None,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.committed_at.is_some()
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed_at.is_some()
    }

    /// Committed on the ledger and still waiting for its reveal.
    pub fn awaiting_reveal(&self) -> bool {
        self.is_committed() && !self.is_revealed()
    }
}

type MoveRow = (
    String,
    String,
    u8,
    String,
    String,
    i64,
    Option<i64>,
    Option<i64>,
);

const SELECT_COLUMNS: &str = "SELECT session_key, player, move, secret, commitment, created_at, committed_at, revealed_at
     FROM retained_moves";

pub struct MoveStore<'a> {
    storage: &'a Storage,
}

impl<'a> MoveStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save(&self, retained: &RetainedMove) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO retained_moves
                (session_key, player, move, secret, commitment, created_at, committed_at, revealed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                retained.session_key,
                format!("{:?}", retained.player),
                retained.choice.wire(),
                retained.secret.expose(),
                retained.commitment.to_hex(),
                retained.created_at.timestamp(),
                retained.committed_at.map(|t| t.timestamp()),
                retained.revealed_at.map(|t| t.timestamp()),
            ],
        )?;

        Ok(())
    }

    pub async fn load(&self, session_key: &str, player: Address) -> Result<Option<RetainedMove>> {
        let conn = self.storage.get_connection().await;

        let result = conn.query_row(
            &format!("{} WHERE session_key = ?1 AND player = ?2", SELECT_COLUMNS),
            params![session_key, format!("{:?}", player)],
            read_row,
        );

        match result {
            Ok(row) => Ok(Some(from_row(row)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CoreError::Storage(e)),
        }
    }

    pub async fn mark_committed(&self, session_key: &str, player: Address) -> Result<()> {
        self.stamp("committed_at", session_key, player).await
    }

    pub async fn mark_revealed(&self, session_key: &str, player: Address) -> Result<()> {
        self.stamp("revealed_at", session_key, player).await
    }

    pub async fn discard(&self, session_key: &str, player: Address) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute(
            "DELETE FROM retained_moves WHERE session_key = ?1 AND player = ?2",
            params![session_key, format!("{:?}", player)],
        )?;
        Ok(())
    }

    /// Drops every move retained for `player`, returning how many.
    pub async fn discard_all(&self, player: Address) -> Result<usize> {
        let conn = self.storage.get_connection().await;
        let removed = conn.execute(
            "DELETE FROM retained_moves WHERE player = ?1",
            params![format!("{:?}", player)],
        )?;
        Ok(removed)
    }

    async fn stamp(&self, column: &str, session_key: &str, player: Address) -> Result<()> {
        let conn = self.storage.get_connection().await;

        let updated = conn.execute(
            &format!(
                "UPDATE retained_moves SET {} = ?1 WHERE session_key = ?2 AND player = ?3",
                column
            ),
            params![
                Utc::now().timestamp(),
                session_key,
                format!("{:?}", player)
            ],
        )?;

        if updated == 0 {
            return Err(CoreError::internal(format!(
                "No retained move for {:?} in session {}",
                player, session_key
            )));
        }

        Ok(())
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MoveRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn from_row(row: MoveRow) -> Result<RetainedMove> {
    let (session_key, player, choice, secret, commitment, created_at, committed_at, revealed_at) =
        row;

    Ok(RetainedMove {
        session_key,
        player: parse_address(&player)?,
        choice: MoveChoice::try_from(choice)?,
        secret: Secret::new(secret)?,
        commitment: Commitment::from_hex(&commitment)?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
        committed_at: committed_at.and_then(|t| DateTime::from_timestamp(t, 0)),
        revealed_at: revealed_at.and_then(|t| DateTime::from_timestamp(t, 0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(player: Address) -> RetainedMove {
        RetainedMove::new(
            "0xcontract/0xa/0xb",
            player,
            MoveChoice::Scissors,
            Secret::new("correct horse").unwrap(),
            Commitment::from_bytes([3u8; 32]),
        )
    }

    #[tokio::test]
    async fn test_save_load_and_lifecycle() {
        let storage = Storage::in_memory().await.unwrap();
        let store = MoveStore::new(&storage);
        let player = Address::repeat_byte(0xaa);
        let retained = sample(player);

        assert!(store.load(&retained.session_key, player).await.unwrap().is_none());

        store.save(&retained).await.unwrap();
        let loaded = store.load(&retained.session_key, player).await.unwrap().unwrap();
        assert_eq!(loaded.choice, MoveChoice::Scissors);
        assert_eq!(loaded.secret.expose(), "correct horse");
        assert_eq!(loaded.commitment, retained.commitment);
        assert!(!loaded.is_committed());

        store.mark_committed(&retained.session_key, player).await.unwrap();
        let loaded = store.load(&retained.session_key, player).await.unwrap().unwrap();
        assert!(loaded.awaiting_reveal());

        store.mark_revealed(&retained.session_key, player).await.unwrap();
        let loaded = store.load(&retained.session_key, player).await.unwrap().unwrap();
        assert!(loaded.is_revealed());
        assert!(!loaded.awaiting_reveal());
    }

    #[tokio::test]
    async fn test_records_are_scoped_by_player() {
        let storage = Storage::in_memory().await.unwrap();
        let store = MoveStore::new(&storage);
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);

        store.save(&sample(a)).await.unwrap();
        assert!(store.load("0xcontract/0xa/0xb", b).await.unwrap().is_none());
        assert!(store.mark_committed("0xcontract/0xa/0xb", b).await.is_err());

        store.mark_committed("0xcontract/0xa/0xb", a).await.unwrap();
        assert_eq!(store.discard_all(b).await.unwrap(), 0);
        assert_eq!(store.discard_all(a).await.unwrap(), 1);
        assert!(store.load("0xcontract/0xa/0xb", a).await.unwrap().is_none());

        store.save(&sample(a)).await.unwrap();
        store.discard("0xcontract/0xa/0xb", a).await.unwrap();
        assert!(store.load("0xcontract/0xa/0xb", a).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_moves_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rps.db");
        let player = Address::repeat_byte(0xcc);

        {
            let storage = Storage::new(&path).await.unwrap();
            let store = MoveStore::new(&storage);
            store.save(&sample(player)).await.unwrap();
            store.mark_committed("0xcontract/0xa/0xb", player).await.unwrap();
        }

        let storage = Storage::new(&path).await.unwrap();
        let store = MoveStore::new(&storage);
        let loaded = store.load("0xcontract/0xa/0xb", player).await.unwrap().unwrap();
        assert!(loaded.awaiting_reveal());
        assert_eq!(loaded.secret.expose(), "correct horse");
    }
}
