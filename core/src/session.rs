//! One SQLite connection, held for the lifetime of a run.

use rusqlite::{Connection, InterruptHandle, OpenFlags};
use thiserror::Error;

use crate::config::ConnectionConfig;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("cannot open database '{database}': {source}")]
    Open {
        database: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot configure connection to '{database}': {source}")]
    Configure {
        database: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// An open connection plus the name it was opened with.
///
/// The connection is released when the session is dropped, whichever way the
/// owning scope is left.
pub struct Session {
    conn: Connection,
    database: String,
}

impl Session {
    pub fn open(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        log::debug!("Opening database '{}'", config.database);

        let opened = if config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            if config.create_if_missing {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
            Connection::open_with_flags(&config.database, flags)
        };

        let conn = opened.map_err(|source| ConnectionError::Open {
            database: config.database.clone(),
            source,
        })?;

        configure_connection(&conn).map_err(|source| ConnectionError::Configure {
            database: config.database.clone(),
            source,
        })?;

        Ok(Self {
            conn,
            database: config.database.clone(),
        })
    }

    pub fn open_in_memory() -> Result<Self, ConnectionError> {
        Self::open(&ConnectionConfig::in_memory())
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Handle that aborts whatever statement is currently running on this
    /// session. Safe to move to another thread (e.g. a Ctrl-C handler).
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        log::debug!("Closing connection to '{}'", self.database);
    }
}

/// Pragmas for bulk loading and scanning. Durability is not a concern: the
/// dataset is regenerated on every run.
fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = OFF;
         PRAGMA cache_size = -131072;
         PRAGMA temp_store = MEMORY;
         PRAGMA foreign_keys = ON;",
    )
}
