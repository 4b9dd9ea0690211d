//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist `MultilingualRecord` aggregates across `records` and
//!   `record_translations`.
//! - Provide the version-conditioned write used for optimistic concurrency.
//!
//! # Invariants
//! - Write paths call `MultilingualRecord::validate()` before SQL mutations.
//! - `atomic_update` commits only when the stored version equals the expected
//!   one, and bumps it by exactly one inside the same transaction.
//! - Translation rows are upserted, never physically deleted.
//! - A load reads the header and its translations inside one transaction.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::language::LanguageCode;
use crate::model::record::{
    MultilingualRecord, RecordId, RecordKind, RecordMetadata, RecordValidationError,
};
use crate::model::variant::{TranslationVariant, VariantContent};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(RecordValidationError),
    Db(DbError),
    NotFound(RecordId),
    /// Stored version moved past `expected_version` since the snapshot was read.
    Conflict {
        id: RecordId,
        expected_version: u64,
    },
    /// Insert collided with an existing id.
    AlreadyExists(RecordId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::Conflict {
                id,
                expected_version,
            } => write!(
                f,
                "record {id} was modified concurrently (expected version {expected_version})"
            ),
            Self::AlreadyExists(id) => write!(f, "record already exists: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "record store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "record store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RecordValidationError> for RepoError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable keyed storage for multilingual records.
pub trait RecordStore {
    /// Inserts a new record and returns its id.
    fn create_record(&self, record: &MultilingualRecord) -> RepoResult<RecordId>;
    /// Loads one record with all variants, tombstoned or not.
    fn load_by_id(&self, id: RecordId) -> RepoResult<Option<MultilingualRecord>>;
    /// Replaces the stored record if its version still equals
    /// `expected_version`; returns the record carrying the new version.
    fn atomic_update(
        &self,
        record: &MultilingualRecord,
        expected_version: u64,
    ) -> RepoResult<MultilingualRecord>;
    /// Languages with at least one active variant on a live record.
    fn distinct_languages(&self) -> RepoResult<BTreeSet<LanguageCode>>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn create_record(&self, record: &MultilingualRecord) -> RepoResult<RecordId> {
        (**self).create_record(record)
    }

    fn load_by_id(&self, id: RecordId) -> RepoResult<Option<MultilingualRecord>> {
        (**self).load_by_id(id)
    }

    fn atomic_update(
        &self,
        record: &MultilingualRecord,
        expected_version: u64,
    ) -> RepoResult<MultilingualRecord> {
        (**self).atomic_update(record, expected_version)
    }

    fn distinct_languages(&self) -> RepoResult<BTreeSet<LanguageCode>> {
        (**self).distinct_languages()
    }
}

/// SQLite-backed record store.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_record_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn create_record(&self, record: &MultilingualRecord) -> RepoResult<RecordId> {
        record.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM records WHERE uuid = ?1);",
            [record.id().to_string()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(RepoError::AlreadyExists(record.id()));
        }

        tx.execute(
            "INSERT INTO records (uuid, kind, tag, srd, version, deleted_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                record.id().to_string(),
                record.kind().as_str(),
                record.metadata().tag,
                bool_to_int(record.metadata().srd),
                version_to_db(record.version())?,
                record.deleted_at(),
                record.created_at(),
                record.updated_at(),
            ],
        )?;
        upsert_translations(&tx, record)?;
        tx.commit()?;

        Ok(record.id())
    }

    fn load_by_id(&self, id: RecordId) -> RepoResult<Option<MultilingualRecord>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let record = load_record(&tx, id)?;
        tx.commit()?;
        Ok(record)
    }

    fn atomic_update(
        &self,
        record: &MultilingualRecord,
        expected_version: u64,
    ) -> RepoResult<MultilingualRecord> {
        record.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE records
             SET
                kind = ?2,
                tag = ?3,
                srd = ?4,
                deleted_at = ?5,
                updated_at = ?6,
                version = version + 1
             WHERE uuid = ?1
               AND version = ?7;",
            params![
                record.id().to_string(),
                record.kind().as_str(),
                record.metadata().tag,
                bool_to_int(record.metadata().srd),
                record.deleted_at(),
                record.updated_at(),
                version_to_db(expected_version)?,
            ],
        )?;

        if changed == 0 {
            let exists: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM records WHERE uuid = ?1);",
                [record.id().to_string()],
                |row| row.get(0),
            )?;
            return Err(if exists == 1 {
                RepoError::Conflict {
                    id: record.id(),
                    expected_version,
                }
            } else {
                RepoError::NotFound(record.id())
            });
        }

        upsert_translations(&tx, record)?;
        tx.commit()?;

        Ok(record.clone().with_version(expected_version + 1))
    }

    fn distinct_languages(&self) -> RepoResult<BTreeSet<LanguageCode>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT t.lang
             FROM record_translations t
             JOIN records r ON r.uuid = t.record_uuid
             WHERE t.deleted_at IS NULL
               AND r.deleted_at IS NULL
             ORDER BY t.lang ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut languages = BTreeSet::new();
        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            languages.insert(parse_language(raw)?);
        }
        Ok(languages)
    }
}

fn load_record(conn: &Connection, id: RecordId) -> RepoResult<Option<MultilingualRecord>> {
    let header = conn
        .query_row(
            "SELECT kind, tag, srd, version, deleted_at, created_at, updated_at
             FROM records
             WHERE uuid = ?1;",
            [id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((kind_text, tag, srd, version, deleted_at, created_at, updated_at)) = header else {
        return Ok(None);
    };

    let kind = RecordKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid record kind `{kind_text}` in records.kind"))
    })?;
    let version = u64::try_from(version).map_err(|_| {
        RepoError::InvalidData(format!("negative version `{version}` in records.version"))
    })?;

    let metadata = RecordMetadata {
        tag,
        srd: int_to_bool(srd, "records.srd")?,
    };

    let variants = load_translations(conn, id)?;
    let record = MultilingualRecord::from_parts(
        id, kind, metadata, variants, deleted_at, version, created_at, updated_at,
    )?;
    Ok(Some(record))
}

fn load_translations(conn: &Connection, id: RecordId) -> RepoResult<Vec<TranslationVariant>> {
    let mut stmt = conn.prepare(
        "SELECT lang, is_protected, content_json, deleted_at, created_at, updated_at
         FROM record_translations
         WHERE record_uuid = ?1
         ORDER BY lang ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut variants = Vec::new();

    while let Some(row) = rows.next()? {
        let language = parse_language(row.get("lang")?)?;

        let is_protected = int_to_bool(
            row.get("is_protected")?,
            "record_translations.is_protected",
        )?;

        let content_json: String = row.get("content_json")?;
        let content: VariantContent = serde_json::from_str(&content_json).map_err(|err| {
            RepoError::InvalidData(format!(
                "invalid content for translation `{language}` of record {id}: {err}"
            ))
        })?;

        variants.push(TranslationVariant::from_parts(
            language,
            content,
            is_protected,
            row.get("deleted_at")?,
            row.get("created_at")?,
            row.get("updated_at")?,
        ));
    }

    Ok(variants)
}

fn upsert_translations(tx: &Transaction<'_>, record: &MultilingualRecord) -> RepoResult<()> {
    for (language, variant) in record.variants() {
        let content_json = serde_json::to_string(&variant.content).map_err(|err| {
            RepoError::InvalidData(format!(
                "cannot encode content for translation `{language}`: {err}"
            ))
        })?;

        tx.execute(
            "INSERT INTO record_translations (
                record_uuid,
                lang,
                is_protected,
                content_json,
                deleted_at,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (record_uuid, lang) DO UPDATE SET
                is_protected = excluded.is_protected,
                content_json = excluded.content_json,
                deleted_at = excluded.deleted_at,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at;",
            params![
                record.id().to_string(),
                language.as_str(),
                bool_to_int(variant.is_protected()),
                content_json,
                variant.deleted_at,
                variant.created_at,
                variant.updated_at,
            ],
        )?;
    }
    Ok(())
}

fn parse_language(raw: String) -> RepoResult<LanguageCode> {
    LanguageCode::try_from(raw).map_err(|err| RepoError::InvalidData(err.to_string()))
}

fn version_to_db(version: u64) -> RepoResult<i64> {
    i64::try_from(version)
        .map_err(|_| RepoError::InvalidData(format!("version {version} exceeds storage range")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn ensure_record_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["records", "record_translations"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

/// Parses a record id from user input.
pub fn parse_record_id(value: &str) -> Option<RecordId> {
    Uuid::parse_str(value.trim()).ok().filter(|id| !id.is_nil())
}
