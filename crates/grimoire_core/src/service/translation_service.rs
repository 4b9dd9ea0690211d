//! Translation lifecycle use-case service.
//!
//! # Responsibility
//! - Expose add/remove translation, record deletion, metadata edits and
//!   read projections.
//! - Run every mutation as load → apply rules on a local copy → conditional
//!   write, retrying on write conflicts.
//!
//! # Invariants
//! - Business-rule rejections are terminal and never retried.
//! - Only `RepoError::Conflict` triggers a retry, bounded by
//!   `max_write_attempts`; guards are re-evaluated on a fresh snapshot.
//! - The service keeps no record state between calls.

use crate::model::language::{InvalidLanguageCode, LanguageCode};
use crate::model::record::{
    now_epoch_ms, AddMode, MultilingualRecord, RecordId, RecordKind, RecordMetadata,
    RecordProjection, RecordValidationError, RemovedTranslation, TranslationRuleError,
};
use crate::model::variant::{TranslationVariant, VariantContent};
use crate::repo::record_repo::{RecordStore, RepoError};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default bound on conditional-write attempts per operation.
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;

/// Errors reported to lifecycle callers.
#[derive(Debug)]
pub enum TranslationServiceError {
    InvalidLanguageCode(InvalidLanguageCode),
    DuplicateActiveTranslation(LanguageCode),
    TranslationNotFound(LanguageCode),
    TranslationAlreadyDeleted(LanguageCode),
    ProtectedTranslationImmutable(LanguageCode),
    CannotRemoveLastActiveTranslation(LanguageCode),
    RecordGone(RecordId),
    NoActiveTranslation(RecordId),
    /// Write conflicts persisted through every attempt.
    ConcurrentModification {
        id: RecordId,
        attempts: u32,
    },
    RecordNotFound(RecordId),
    /// Creation input violates structural record rules.
    InvalidRecord(RecordValidationError),
    /// Store-level failure; callers may retry.
    StorageUnavailable(RepoError),
}

impl TranslationServiceError {
    /// Stable machine-readable code for logs and transport mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidLanguageCode(_) => "invalid_language_code",
            Self::DuplicateActiveTranslation(_) => "duplicate_active_translation",
            Self::TranslationNotFound(_) => "translation_not_found",
            Self::TranslationAlreadyDeleted(_) => "translation_already_deleted",
            Self::ProtectedTranslationImmutable(_) => "protected_translation_immutable",
            Self::CannotRemoveLastActiveTranslation(_) => "cannot_remove_last_active_translation",
            Self::RecordGone(_) => "record_gone",
            Self::NoActiveTranslation(_) => "no_active_translation",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::RecordNotFound(_) => "record_not_found",
            Self::InvalidRecord(_) => "invalid_record",
            Self::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl Display for TranslationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLanguageCode(err) => write!(f, "{err}"),
            Self::DuplicateActiveTranslation(lang) => {
                write!(f, "translation `{lang}` already exists and is active")
            }
            Self::TranslationNotFound(lang) => write!(f, "translation `{lang}` not found"),
            Self::TranslationAlreadyDeleted(lang) => {
                write!(f, "translation `{lang}` has already been deleted")
            }
            Self::ProtectedTranslationImmutable(lang) => write!(
                f,
                "translation `{lang}` is protected SRD content and cannot be removed or replaced"
            ),
            Self::CannotRemoveLastActiveTranslation(lang) => write!(
                f,
                "cannot delete translation `{lang}`: it is the last active translation"
            ),
            Self::RecordGone(id) => write!(f, "record {id} has been deleted"),
            Self::NoActiveTranslation(id) => write!(f, "record {id} has no active translation"),
            Self::ConcurrentModification { id, attempts } => write!(
                f,
                "record {id} kept changing concurrently; gave up after {attempts} attempts"
            ),
            Self::RecordNotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidRecord(err) => write!(f, "invalid record: {err}"),
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
        }
    }
}

impl Error for TranslationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLanguageCode(err) => Some(err),
            Self::InvalidRecord(err) => Some(err),
            Self::StorageUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvalidLanguageCode> for TranslationServiceError {
    fn from(value: InvalidLanguageCode) -> Self {
        Self::InvalidLanguageCode(value)
    }
}

impl From<RecordValidationError> for TranslationServiceError {
    fn from(value: RecordValidationError) -> Self {
        Self::InvalidRecord(value)
    }
}

impl From<TranslationRuleError> for TranslationServiceError {
    fn from(value: TranslationRuleError) -> Self {
        match value {
            TranslationRuleError::DuplicateActiveTranslation(lang) => {
                Self::DuplicateActiveTranslation(lang)
            }
            TranslationRuleError::TranslationNotFound(lang) => Self::TranslationNotFound(lang),
            TranslationRuleError::TranslationAlreadyDeleted(lang) => {
                Self::TranslationAlreadyDeleted(lang)
            }
            TranslationRuleError::ProtectedTranslationImmutable(lang) => {
                Self::ProtectedTranslationImmutable(lang)
            }
            TranslationRuleError::CannotRemoveLastActiveTranslation(lang) => {
                Self::CannotRemoveLastActiveTranslation(lang)
            }
            TranslationRuleError::RecordGone(id) => Self::RecordGone(id),
            TranslationRuleError::NoActiveTranslation(id) => Self::NoActiveTranslation(id),
        }
    }
}

impl From<RepoError> for TranslationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::RecordNotFound(id),
            RepoError::Validation(err) => Self::InvalidRecord(err),
            RepoError::Conflict { id, .. } => Self::ConcurrentModification { id, attempts: 1 },
            other => Self::StorageUnavailable(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, TranslationServiceError>;

/// Creation input for one translation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTranslation {
    /// Raw language code; validated against `^[a-z]{2}$`.
    pub language: String,
    pub content: VariantContent,
    pub is_protected: bool,
}

/// Response of `add_translation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedTranslation {
    pub available_languages: Vec<LanguageCode>,
}

/// Response of `delete_record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordDeleted {
    pub record_id: RecordId,
    pub deleted_at: i64,
}

/// Translation lifecycle facade over a record store.
pub struct TranslationService<S: RecordStore> {
    store: S,
    max_write_attempts: u32,
    clock: fn() -> i64,
}

impl<S: RecordStore> TranslationService<S> {
    /// Creates a service with default retry bound and wall clock.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            clock: now_epoch_ms,
        }
    }

    /// Sets the conditional-write attempt bound (minimum 1).
    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    /// Replaces the epoch-ms time source.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Creates a record from one or more initial translations.
    pub fn create_record(
        &self,
        kind: RecordKind,
        translations: Vec<NewTranslation>,
    ) -> ServiceResult<MultilingualRecord> {
        self.create_record_with_metadata(kind, RecordMetadata::default(), translations)
    }

    /// Creates a record carrying explicit `tag` and `srd` metadata.
    pub fn create_record_with_metadata(
        &self,
        kind: RecordKind,
        metadata: RecordMetadata,
        translations: Vec<NewTranslation>,
    ) -> ServiceResult<MultilingualRecord> {
        let now_ms = (self.clock)();
        let variants = translations
            .into_iter()
            .map(|input| -> Result<TranslationVariant, InvalidLanguageCode> {
                let language = LanguageCode::parse(&input.language)?;
                Ok(TranslationVariant::new(
                    language,
                    input.content,
                    input.is_protected,
                    now_ms,
                ))
            })
            .collect::<Result<Vec<_>, InvalidLanguageCode>>()?;

        let record = MultilingualRecord::new(kind, variants, now_ms)?.with_metadata(metadata);
        self.store.create_record(&record).map_err(|err| {
            error!(
                "event=record_create module=service status=error kind={} error={}",
                kind.as_str(),
                err
            );
            TranslationServiceError::from(err)
        })?;

        info!(
            "event=record_create module=service status=ok record_id={} kind={} languages={}",
            record.id(),
            kind.as_str(),
            join_languages(record.available_languages())
        );
        Ok(record)
    }

    /// Adds (or, with `AddMode::Overwrite`, replaces) one translation.
    pub fn add_translation(
        &self,
        record_id: RecordId,
        language: &str,
        content: VariantContent,
        is_protected: bool,
        mode: AddMode,
    ) -> ServiceResult<AddedTranslation> {
        let language = LanguageCode::parse(language)?;
        let (_, available_languages) =
            self.mutate("translation_add", record_id, &language, |record, now_ms| {
                record
                    .add_variant(language.clone(), content.clone(), is_protected, mode, now_ms)
                    .map(<[LanguageCode]>::to_vec)
            })?;

        Ok(AddedTranslation {
            available_languages,
        })
    }

    /// Soft-deletes one translation.
    ///
    /// Guard order: existence, protection, last-active.
    pub fn remove_translation(
        &self,
        record_id: RecordId,
        language: &str,
    ) -> ServiceResult<RemovedTranslation> {
        let language = LanguageCode::parse(language)?;
        let (_, removed) =
            self.mutate("translation_remove", record_id, &language, |record, now_ms| {
                record.remove_variant(&language, now_ms)
            })?;
        Ok(removed)
    }

    /// Tombstones a whole record regardless of its translations' protection.
    pub fn delete_record(&self, record_id: RecordId) -> ServiceResult<RecordDeleted> {
        let (_, deleted_at) =
            self.mutate_record("record_delete", record_id, None, |record, now_ms| {
                record.tombstone(now_ms)
            })?;
        Ok(RecordDeleted {
            record_id,
            deleted_at,
        })
    }

    /// Replaces the record's listing tag.
    pub fn update_record_metadata(
        &self,
        record_id: RecordId,
        tag: i64,
    ) -> ServiceResult<MultilingualRecord> {
        let (saved, _) =
            self.mutate_record("record_metadata_update", record_id, None, |record, now_ms| {
                record.set_tag(tag, now_ms)
            })?;
        Ok(saved)
    }

    /// Returns a single-language view, falling back to the first available
    /// language when `preferred` is absent, invalid or inactive.
    pub fn get_projection(
        &self,
        record_id: RecordId,
        preferred: Option<&str>,
    ) -> ServiceResult<RecordProjection> {
        let record = self.load_existing(record_id)?;
        let projection = record.project(preferred).map_err(|rule| {
            warn!(
                "event=record_projection module=service status=rejected record_id={} error_code={}",
                record_id,
                TranslationServiceError::from(rule.clone()).code()
            );
            TranslationServiceError::from(rule)
        })?;

        info!(
            "event=record_projection module=service status=ok record_id={} resolved_lang={}",
            record_id, projection.resolved_language
        );
        Ok(projection)
    }

    /// Returns the full record with every variant, tombstoned or not.
    pub fn get_record(&self, record_id: RecordId) -> ServiceResult<MultilingualRecord> {
        self.load_existing(record_id)
    }

    /// Languages with at least one active translation on a live record.
    pub fn distinct_languages(&self) -> ServiceResult<BTreeSet<LanguageCode>> {
        Ok(self.store.distinct_languages()?)
    }

    fn load_existing(&self, record_id: RecordId) -> ServiceResult<MultilingualRecord> {
        match self.store.load_by_id(record_id) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(TranslationServiceError::RecordNotFound(record_id)),
            Err(err) => {
                error!(
                    "event=record_load module=service status=error record_id={} error={}",
                    record_id, err
                );
                Err(err.into())
            }
        }
    }

    fn mutate<T>(
        &self,
        event: &'static str,
        record_id: RecordId,
        language: &LanguageCode,
        apply: impl FnMut(&mut MultilingualRecord, i64) -> Result<T, TranslationRuleError>,
    ) -> ServiceResult<(MultilingualRecord, T)> {
        self.mutate_record(event, record_id, Some(language), apply)
    }

    fn mutate_record<T>(
        &self,
        event: &'static str,
        record_id: RecordId,
        language: Option<&LanguageCode>,
        mut apply: impl FnMut(&mut MultilingualRecord, i64) -> Result<T, TranslationRuleError>,
    ) -> ServiceResult<(MultilingualRecord, T)> {
        let lang = language.map_or("-", LanguageCode::as_str);

        for attempt in 1..=self.max_write_attempts {
            let mut working = self.load_existing(record_id)?;
            let expected_version = working.version();

            let outcome = match apply(&mut working, (self.clock)()) {
                Ok(outcome) => outcome,
                Err(rule) => {
                    let err = TranslationServiceError::from(rule);
                    warn!(
                        "event={event} module=service status=rejected record_id={record_id} lang={lang} error_code={}",
                        err.code()
                    );
                    return Err(err);
                }
            };

            match self.store.atomic_update(&working, expected_version) {
                Ok(saved) => {
                    info!(
                        "event={event} module=service status=ok record_id={record_id} lang={lang} version={} languages={}",
                        saved.version(),
                        join_languages(saved.available_languages())
                    );
                    return Ok((saved, outcome));
                }
                Err(RepoError::Conflict { .. }) => {
                    warn!(
                        "event={event} module=service status=conflict record_id={record_id} lang={lang} attempt={attempt} expected_version={expected_version}"
                    );
                }
                Err(err) => {
                    error!(
                        "event={event} module=service status=error record_id={record_id} lang={lang} error={err}"
                    );
                    return Err(err.into());
                }
            }
        }

        Err(TranslationServiceError::ConcurrentModification {
            id: record_id,
            attempts: self.max_write_attempts,
        })
    }
}

fn join_languages(languages: &[LanguageCode]) -> String {
    languages
        .iter()
        .map(LanguageCode::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
