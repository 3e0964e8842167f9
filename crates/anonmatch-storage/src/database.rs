// SPDX-FileCopyrightText: 2026 Anonmatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use anonmatch_core::AnonmatchError;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// Convert a tokio-rusqlite error into [`AnonmatchError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> AnonmatchError {
    AnonmatchError::Storage {
        source: Box::new(e),
    }
}

/// Connection tuning applied at open.
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    pub wal_mode: bool,
    pub busy_timeout: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            wal_mode: true,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// The single writer handle to the SQLite database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` with default options
    /// and apply pending migrations.
    pub async fn open(path: &str) -> Result<Self, AnonmatchError> {
        Self::open_with(path, OpenOptions::default()).await
    }

    pub async fn open_with(path: &str, options: OpenOptions) -> Result<Self, AnonmatchError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(AnonmatchError::storage)?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| AnonmatchError::Storage {
                source: Box::new(e),
            })?;

        conn.call(move |conn| {
            conn.busy_timeout(options.busy_timeout)?;
            if options.wal_mode {
                let mode: String =
                    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
                debug!(journal_mode = %mode, "journal mode set");
            }
            conn.execute_batch(
                "PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        let migrated = conn
            .call(|conn| Ok(crate::migrations::run_migrations(conn)))
            .await
            .map_err(map_tr_err)?;
        migrated?;

        info!(path, "database opened");
        Ok(Self { conn })
    }

    /// The shared connection. Query modules call through `connection().call()`.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), AnonmatchError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint and close the connection.
    pub async fn close(self) -> Result<(), AnonmatchError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(map_tr_err)
    }
}
