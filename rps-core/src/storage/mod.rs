pub mod move_store;

pub use move_store::{MoveStore, RetainedMove};

use crate::error::{CoreError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn).await
    }

    /// Non-durable storage, gone when dropped.
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Moves kept between commit and reveal; the contract only stores the digest
        conn.execute(
            "CREATE TABLE IF NOT EXISTS retained_moves (
                session_key TEXT NOT NULL,
                player TEXT NOT NULL,
                move INTEGER NOT NULL,
                secret TEXT NOT NULL,
                commitment TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                committed_at INTEGER,
                revealed_at INTEGER,
                PRIMARY KEY (session_key, player)
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
