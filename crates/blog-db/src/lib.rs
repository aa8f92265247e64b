pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::{Result, anyhow, bail};
use rusqlite::{Connection, Transaction};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

pub struct Database {
    conn: Mutex<Connection>,
}

/// Where a DSN points.
#[derive(Debug, PartialEq, Eq)]
pub enum Target {
    Memory,
    File(PathBuf),
}

/// Accepts `sqlite://path`, `sqlite::memory:`, `:memory:` or a bare path.
pub fn parse_dsn(dsn: &str) -> Result<Target> {
    let dsn = dsn.trim();
    let rest = match dsn.split_once("://") {
        Some(("sqlite", rest)) => rest,
        Some((scheme, _)) => bail!("Unsupported database scheme '{}'", scheme),
        None => dsn.strip_prefix("sqlite:").unwrap_or(dsn),
    };

    match rest {
        "" => bail!("Empty database path"),
        ":memory:" => Ok(Target::Memory),
        path => Ok(Target::File(PathBuf::from(path))),
    }
}

impl Database {
    pub fn open(dsn: &str) -> Result<Self> {
        let conn = match parse_dsn(dsn)? {
            Target::Memory => Connection::open_in_memory()?,
            Target::File(path) => {
                let conn = Connection::open(&path)?;
                // WAL mode for concurrent reads
                conn.pragma_update(None, "journal_mode", "WAL")?;
                info!("Database opened at {}", path.display());
                conn
            }
        };
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Runs `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
