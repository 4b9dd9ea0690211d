//! Record database bootstrap.
//!
//! Every connection handed to the record store comes from `open_db` or
//! `open_db_in_memory`, which enable foreign keys, set a busy timeout and
//! bring the schema to `migrations::latest_version()`.
//!
//! # Schema
//! - `records`: one row per record with `kind`, `tag`, `srd`, the
//!   optimistic `version` counter and the record tombstone.
//! - `record_translations`: one row per (record, language), keyed by a
//!   lowercase two-letter code. Rows are tombstoned, never deleted, and a
//!   protected row can never carry a tombstone.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`; a database written by
//!   a newer build is refused rather than downgraded.
//! - The store reads and writes nothing before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or migrating the record database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Database was migrated by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "record database is at schema version {db_version}; this build supports up to {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
