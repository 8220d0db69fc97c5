// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database handle, PRAGMA setup and lifecycle.
//!
//! Every query goes through the one `tokio_rusqlite::Connection` held here,
//! which serializes closures on a single background thread. Do not open
//! additional connections for writes.

use std::path::Path;

use palaver_core::PalaverError;
use tracing::debug;

use crate::migrations;

/// Converts a `tokio_rusqlite` error into [`PalaverError::Storage`].
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> PalaverError {
    PalaverError::Storage {
        source: Box::new(e),
    }
}

fn map_sqlite_err(e: rusqlite::Error) -> PalaverError {
    PalaverError::Storage {
        source: Box::new(e),
    }
}

/// The single-writer SQLite handle.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path` in WAL mode and
    /// applies pending migrations.
    pub async fn open(path: &str) -> Result<Self, PalaverError> {
        Self::open_with(path, true).await
    }

    /// Like [`Database::open`] with an explicit journal mode choice.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, PalaverError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| PalaverError::Storage {
                source: Box::new(e),
            })?;
        }

        // Migrations run on a short-lived blocking connection so refinery
        // errors keep their own type.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), PalaverError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(map_sqlite_err)?;
            let journal = if wal_mode { "WAL" } else { "DELETE" };
            conn.pragma_update_and_check(None, "journal_mode", journal, |row| {
                row.get::<_, String>(0)
            })
            .map_err(map_sqlite_err)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
                .map_err(map_sqlite_err)?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| PalaverError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_sqlite_err)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The shared connection. Query modules and the knowledge store run
    /// their closures through it.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Truncates the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), PalaverError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoints and closes the connection.
    pub async fn close(self) -> Result<(), PalaverError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(|e| PalaverError::Storage {
            source: Box::new(e),
        })
    }
}
