//! Multilingual record aggregate.
//!
//! # Responsibility
//! - Own the language → variant mapping of one reference record.
//! - Enforce translation lifecycle rules on a loaded snapshot.
//! - Produce single-language read projections.
//!
//! # Invariants
//! - `available_languages` always equals `compute_available(variants)`; it is
//!   recomputed on every mutation and on deserialization, never set directly.
//! - A record always keeps at least one active variant through this API.
//! - Protected variants are never tombstoned.
//! - Variant map keys match each variant's own `language`.
//! - `deleted_at` on the record is one-way.

use crate::model::availability::{compute_available, count_active};
use crate::model::language::LanguageCode;
use crate::model::variant::{TranslationVariant, VariantContent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable record identifier.
pub type RecordId = Uuid;

/// Collection a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Spell,
    Monster,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spell => "spell",
            Self::Monster => "monster",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "spell" => Some(Self::Spell),
            "monster" => Some(Self::Monster),
            _ => None,
        }
    }
}

/// Record-level metadata carried alongside the translations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Listing order key; higher sorts first.
    pub tag: i64,
    /// Record belongs to the SRD corpus.
    pub srd: bool,
}

/// How `add_variant` treats an existing active variant for the same language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddMode {
    /// Reject with `DuplicateActiveTranslation`.
    #[default]
    Insert,
    /// Replace unprotected active content.
    Overwrite,
}

/// Structural validation failures for record construction and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    NilId,
    /// A record must be created with at least one variant.
    EmptyRecord,
    DuplicateLanguage(LanguageCode),
    KeyMismatch {
        key: LanguageCode,
        language: LanguageCode,
    },
    /// Persisted state has a tombstone on protected content.
    ProtectedVariantDeleted(LanguageCode),
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "record id must not be nil"),
            Self::EmptyRecord => write!(f, "record must have at least one translation"),
            Self::DuplicateLanguage(lang) => write!(f, "duplicate translation language `{lang}`"),
            Self::KeyMismatch { key, language } => write!(
                f,
                "translation key `{key}` does not match variant language `{language}`"
            ),
            Self::ProtectedVariantDeleted(lang) => {
                write!(f, "protected translation `{lang}` carries a deletion marker")
            }
        }
    }
}

impl Error for RecordValidationError {}

/// Business-rule rejections produced by lifecycle operations.
///
/// Variants are reported in guard order; callers can rely on receiving the
/// most specific applicable one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationRuleError {
    DuplicateActiveTranslation(LanguageCode),
    TranslationNotFound(LanguageCode),
    TranslationAlreadyDeleted(LanguageCode),
    ProtectedTranslationImmutable(LanguageCode),
    CannotRemoveLastActiveTranslation(LanguageCode),
    RecordGone(RecordId),
    NoActiveTranslation(RecordId),
}

impl Display for TranslationRuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
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
        }
    }
}

impl Error for TranslationRuleError {}

/// Outcome of a successful translation removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedTranslation {
    pub deleted_language: LanguageCode,
    pub remaining_languages: Vec<LanguageCode>,
}

/// Single-language read view of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordProjection {
    pub record_id: RecordId,
    pub kind: RecordKind,
    pub resolved_language: LanguageCode,
    pub variant: TranslationVariant,
    pub available_languages: Vec<LanguageCode>,
    pub tag: i64,
    pub srd: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Reference record holding per-language content variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordWire")]
pub struct MultilingualRecord {
    id: RecordId,
    kind: RecordKind,
    #[serde(rename = "translations")]
    variants: BTreeMap<LanguageCode, TranslationVariant>,
    #[serde(rename = "languages")]
    available_languages: Vec<LanguageCode>,
    tag: i64,
    srd: bool,
    deleted_at: Option<i64>,
    version: u64,
    created_at: i64,
    updated_at: i64,
}

/// Decoding shape; `languages` is ignored and recomputed.
#[derive(Deserialize)]
struct RecordWire {
    id: RecordId,
    kind: RecordKind,
    translations: BTreeMap<LanguageCode, TranslationVariant>,
    #[serde(default)]
    tag: i64,
    #[serde(default)]
    srd: bool,
    deleted_at: Option<i64>,
    #[serde(default)]
    version: u64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<RecordWire> for MultilingualRecord {
    type Error = RecordValidationError;

    fn try_from(wire: RecordWire) -> Result<Self, Self::Error> {
        let mut variants = Vec::with_capacity(wire.translations.len());
        for (key, variant) in wire.translations {
            if key != variant.language {
                return Err(RecordValidationError::KeyMismatch {
                    key,
                    language: variant.language,
                });
            }
            variants.push(variant);
        }

        Self::from_parts(
            wire.id,
            wire.kind,
            RecordMetadata {
                tag: wire.tag,
                srd: wire.srd,
            },
            variants,
            wire.deleted_at,
            wire.version,
            wire.created_at,
            wire.updated_at,
        )
    }
}

impl MultilingualRecord {
    /// Creates a new record with a generated id and default metadata.
    ///
    /// # Errors
    /// - `EmptyRecord` when `variants` is empty.
    /// - `DuplicateLanguage` when two variants share a language.
    /// - `ProtectedVariantDeleted` when a protected variant arrives tombstoned.
    pub fn new(
        kind: RecordKind,
        variants: Vec<TranslationVariant>,
        now_ms: i64,
    ) -> Result<Self, RecordValidationError> {
        Self::from_parts(
            Uuid::new_v4(),
            kind,
            RecordMetadata::default(),
            variants,
            None,
            0,
            now_ms,
            now_ms,
        )
    }

    /// Rebuilds a record from stored parts, deriving availability.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: RecordId,
        kind: RecordKind,
        metadata: RecordMetadata,
        variants: Vec<TranslationVariant>,
        deleted_at: Option<i64>,
        version: u64,
        created_at: i64,
        updated_at: i64,
    ) -> Result<Self, RecordValidationError> {
        let mut map = BTreeMap::new();
        for variant in variants {
            let language = variant.language.clone();
            if map.insert(language.clone(), variant).is_some() {
                return Err(RecordValidationError::DuplicateLanguage(language));
            }
        }

        let record = Self {
            id,
            kind,
            available_languages: compute_available(&map),
            variants: map,
            tag: metadata.tag,
            srd: metadata.srd,
            deleted_at,
            version,
            created_at,
            updated_at,
        };
        record.validate()?;
        Ok(record)
    }

    /// Validates structural invariants.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id.is_nil() {
            return Err(RecordValidationError::NilId);
        }
        if self.variants.is_empty() {
            return Err(RecordValidationError::EmptyRecord);
        }
        for (key, variant) in &self.variants {
            if *key != variant.language {
                return Err(RecordValidationError::KeyMismatch {
                    key: key.clone(),
                    language: variant.language.clone(),
                });
            }
            if variant.is_protected() && !variant.is_active() {
                return Err(RecordValidationError::ProtectedVariantDeleted(key.clone()));
            }
        }
        Ok(())
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn metadata(&self) -> RecordMetadata {
        RecordMetadata {
            tag: self.tag,
            srd: self.srd,
        }
    }

    pub fn variants(&self) -> &BTreeMap<LanguageCode, TranslationVariant> {
        &self.variants
    }

    pub fn variant(&self, language: &LanguageCode) -> Option<&TranslationVariant> {
        self.variants.get(language)
    }

    /// Active languages, ascending.
    pub fn available_languages(&self) -> &[LanguageCode] {
        &self.available_languages
    }

    pub fn deleted_at(&self) -> Option<i64> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Returns a copy carrying `metadata`; intended for records not yet
    /// persisted.
    pub fn with_metadata(mut self, metadata: RecordMetadata) -> Self {
        self.tag = metadata.tag;
        self.srd = metadata.srd;
        self
    }

    /// Returns a copy carrying the version assigned by a store write.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Inserts or replaces a variant.
    ///
    /// Re-adding over a tombstoned variant is always allowed and clears the
    /// tombstone. Replacing an active variant requires `AddMode::Overwrite`
    /// and is refused for protected content.
    pub fn add_variant(
        &mut self,
        language: LanguageCode,
        content: VariantContent,
        is_protected: bool,
        mode: AddMode,
        now_ms: i64,
    ) -> Result<&[LanguageCode], TranslationRuleError> {
        self.ensure_not_deleted()?;

        if let Some(existing) = self.variants.get(&language) {
            if existing.is_active() {
                if mode == AddMode::Insert {
                    return Err(TranslationRuleError::DuplicateActiveTranslation(language));
                }
                if existing.is_protected() {
                    return Err(TranslationRuleError::ProtectedTranslationImmutable(language));
                }
            }
        }

        let mut variant = TranslationVariant::new(language.clone(), content, is_protected, now_ms);
        if let Some(existing) = self.variants.get(&language) {
            variant.created_at = existing.created_at;
        }
        self.variants.insert(language, variant);
        self.touch(now_ms);
        Ok(&self.available_languages)
    }

    /// Tombstones one variant.
    ///
    /// Guards run in order: existence, protection, last-active.
    pub fn remove_variant(
        &mut self,
        language: &LanguageCode,
        now_ms: i64,
    ) -> Result<RemovedTranslation, TranslationRuleError> {
        self.ensure_not_deleted()?;

        let active_count = count_active(&self.variants);
        let variant = self
            .variants
            .get_mut(language)
            .ok_or_else(|| TranslationRuleError::TranslationNotFound(language.clone()))?;
        if !variant.is_active() {
            return Err(TranslationRuleError::TranslationAlreadyDeleted(
                language.clone(),
            ));
        }
        if variant.is_protected() {
            return Err(TranslationRuleError::ProtectedTranslationImmutable(
                language.clone(),
            ));
        }
        if active_count <= 1 {
            return Err(TranslationRuleError::CannotRemoveLastActiveTranslation(
                language.clone(),
            ));
        }

        variant
            .soft_delete(now_ms)
            .map_err(|_| TranslationRuleError::ProtectedTranslationImmutable(language.clone()))?;
        self.touch(now_ms);

        Ok(RemovedTranslation {
            deleted_language: language.clone(),
            remaining_languages: self.available_languages.clone(),
        })
    }

    /// Replaces the listing tag. The `srd` flag is fixed at creation.
    pub fn set_tag(
        &mut self,
        tag: i64,
        now_ms: i64,
    ) -> Result<RecordMetadata, TranslationRuleError> {
        self.ensure_not_deleted()?;
        self.tag = tag;
        self.updated_at = now_ms;
        Ok(self.metadata())
    }

    /// Tombstones the whole record. Variants and their protection flags are
    /// left untouched.
    pub fn tombstone(&mut self, now_ms: i64) -> Result<i64, TranslationRuleError> {
        self.ensure_not_deleted()?;
        self.deleted_at = Some(now_ms);
        self.updated_at = now_ms;
        Ok(now_ms)
    }

    /// Builds a single-language projection.
    ///
    /// An absent, malformed or inactive `preferred` language falls back to
    /// the first available language.
    pub fn project(&self, preferred: Option<&str>) -> Result<RecordProjection, TranslationRuleError> {
        self.ensure_not_deleted()?;

        let requested = preferred
            .and_then(|raw| LanguageCode::parse(raw).ok())
            .filter(|language| self.available_languages.contains(language));
        let resolved = match requested {
            Some(language) => language,
            None => self
                .available_languages
                .first()
                .cloned()
                .ok_or(TranslationRuleError::NoActiveTranslation(self.id))?,
        };
        let variant = self
            .variants
            .get(&resolved)
            .cloned()
            .ok_or(TranslationRuleError::NoActiveTranslation(self.id))?;

        Ok(RecordProjection {
            record_id: self.id,
            kind: self.kind,
            resolved_language: resolved,
            variant,
            available_languages: self.available_languages.clone(),
            tag: self.tag,
            srd: self.srd,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn ensure_not_deleted(&self) -> Result<(), TranslationRuleError> {
        if self.is_deleted() {
            return Err(TranslationRuleError::RecordGone(self.id));
        }
        Ok(())
    }

    fn touch(&mut self, now_ms: i64) {
        self.available_languages = compute_available(&self.variants);
        self.updated_at = now_ms;
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::{
        AddMode, MultilingualRecord, RecordKind, RecordMetadata, RecordValidationError,
        TranslationRuleError,
    };
    use uuid::Uuid;
    use crate::model::language::LanguageCode;
    use crate::model::variant::{TranslationVariant, VariantContent};

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::parse(code).unwrap()
    }

    fn variant(code: &str, protected: bool) -> TranslationVariant {
        TranslationVariant::new(lang(code), VariantContent::named(code), protected, 1)
    }

    fn record(variants: Vec<TranslationVariant>) -> MultilingualRecord {
        MultilingualRecord::new(RecordKind::Spell, variants, 1).unwrap()
    }

    #[test]
    fn new_rejects_empty_and_duplicate_variants() {
        assert_eq!(
            MultilingualRecord::new(RecordKind::Spell, vec![], 1).unwrap_err(),
            RecordValidationError::EmptyRecord
        );
        assert_eq!(
            MultilingualRecord::new(
                RecordKind::Spell,
                vec![variant("en", false), variant("en", true)],
                1
            )
            .unwrap_err(),
            RecordValidationError::DuplicateLanguage(lang("en"))
        );
    }

    #[test]
    fn add_over_tombstone_revives_language() {
        let mut rec = record(vec![variant("en", false), variant("fr", false)]);
        rec.remove_variant(&lang("fr"), 5).unwrap();
        assert_eq!(rec.available_languages(), &[lang("en")]);

        let available = rec
            .add_variant(lang("fr"), VariantContent::named("Boule de feu"), false, AddMode::Insert, 9)
            .unwrap()
            .to_vec();
        assert_eq!(available, vec![lang("en"), lang("fr")]);
        let revived = rec.variant(&lang("fr")).unwrap();
        assert_eq!(revived.deleted_at, None);
        assert_eq!(revived.created_at, 1);
        assert_eq!(revived.updated_at, 9);
        assert_eq!(rec.updated_at(), 9);
    }

    #[test]
    fn overwrite_replaces_unprotected_but_not_protected_content() {
        let mut rec = record(vec![variant("en", true), variant("fr", false)]);

        let err = rec
            .add_variant(lang("fr"), VariantContent::named("x"), false, AddMode::Insert, 2)
            .unwrap_err();
        assert_eq!(err, TranslationRuleError::DuplicateActiveTranslation(lang("fr")));

        rec.add_variant(lang("fr"), VariantContent::named("x"), false, AddMode::Overwrite, 2)
            .unwrap();
        assert_eq!(rec.variant(&lang("fr")).unwrap().content.name, "x");
        assert_eq!(rec.variant(&lang("fr")).unwrap().created_at, 1);

        let err = rec
            .add_variant(lang("en"), VariantContent::named("y"), false, AddMode::Overwrite, 3)
            .unwrap_err();
        assert_eq!(err, TranslationRuleError::ProtectedTranslationImmutable(lang("en")));
        assert_eq!(rec.variant(&lang("en")).unwrap().content.name, "en");
    }

    #[test]
    fn remove_guard_order_is_existence_protection_last_active() {
        let mut rec = record(vec![variant("en", true)]);
        assert_eq!(
            rec.remove_variant(&lang("de"), 2).unwrap_err(),
            TranslationRuleError::TranslationNotFound(lang("de"))
        );
        assert_eq!(
            rec.remove_variant(&lang("en"), 2).unwrap_err(),
            TranslationRuleError::ProtectedTranslationImmutable(lang("en"))
        );

        let mut rec = record(vec![variant("en", false), variant("fr", false)]);
        rec.remove_variant(&lang("fr"), 2).unwrap();
        assert_eq!(
            rec.remove_variant(&lang("fr"), 3).unwrap_err(),
            TranslationRuleError::TranslationAlreadyDeleted(lang("fr"))
        );
        assert_eq!(
            rec.remove_variant(&lang("en"), 3).unwrap_err(),
            TranslationRuleError::CannotRemoveLastActiveTranslation(lang("en"))
        );
    }

    #[test]
    fn failed_remove_leaves_record_untouched() {
        let mut rec = record(vec![variant("en", false)]);
        let before = rec.clone();
        rec.remove_variant(&lang("en"), 7).unwrap_err();
        assert_eq!(rec, before);
    }

    #[test]
    fn tombstoned_record_rejects_mutation_and_projection() {
        let mut rec = record(vec![variant("en", true)]);
        assert_eq!(rec.tombstone(4).unwrap(), 4);
        let id = rec.id();
        assert_eq!(rec.tombstone(5).unwrap_err(), TranslationRuleError::RecordGone(id));
        assert_eq!(rec.project(None).unwrap_err(), TranslationRuleError::RecordGone(id));
        assert_eq!(
            rec.add_variant(lang("fr"), VariantContent::named("x"), false, AddMode::Insert, 6)
                .unwrap_err(),
            TranslationRuleError::RecordGone(id)
        );
        assert!(rec.variant(&lang("en")).unwrap().is_active());
    }

    #[test]
    fn projection_falls_back_to_first_available_language() {
        let rec = record(vec![variant("fr", false), variant("en", false)]);
        for preferred in [None, Some("de"), Some("FR"), Some("???")] {
            let projection = rec.project(preferred).unwrap();
            assert_eq!(projection.resolved_language, lang("en"));
            assert_eq!(projection.variant.language, lang("en"));
        }
        assert_eq!(rec.project(Some("fr")).unwrap().resolved_language, lang("fr"));
    }

    #[test]
    fn projection_without_active_variant_reports_no_active_translation() {
        let mut en = variant("en", false);
        en.deleted_at = Some(2);
        let id = Uuid::new_v4();
        let rec = MultilingualRecord::from_parts(
            id,
            RecordKind::Monster,
            RecordMetadata::default(),
            vec![en],
            None,
            0,
            1,
            2,
        )
        .unwrap();

        assert!(rec.available_languages().is_empty());
        for preferred in [None, Some("en")] {
            assert_eq!(
                rec.project(preferred).unwrap_err(),
                TranslationRuleError::NoActiveTranslation(id)
            );
        }
    }

    #[test]
    fn set_tag_updates_metadata_until_record_is_tombstoned() {
        let mut rec = record(vec![variant("en", true)]).with_metadata(RecordMetadata {
            tag: 3,
            srd: true,
        });

        let metadata = rec.set_tag(42, 7).unwrap();
        assert_eq!(metadata, RecordMetadata { tag: 42, srd: true });
        assert_eq!(rec.updated_at(), 7);
        assert_eq!(rec.project(None).unwrap().tag, 42);

        rec.tombstone(8).unwrap();
        assert_eq!(
            rec.set_tag(1, 9).unwrap_err(),
            TranslationRuleError::RecordGone(rec.id())
        );
        assert_eq!(rec.metadata().tag, 42);
    }

    #[test]
    fn deserialization_recomputes_languages_and_rejects_deleted_protected_content() {
        let rec = record(vec![variant("en", false), variant("fr", false)]);
        let mut json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["languages"], serde_json::json!(["en", "fr"]));
        assert_eq!(json["tag"], serde_json::json!(0));

        json["languages"] = serde_json::json!(["zz"]);
        json["translations"]["fr"]["deleted_at"] = serde_json::json!(3);
        let decoded: MultilingualRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(decoded.available_languages(), &[lang("en")]);

        let mut mismatched = json.clone();
        mismatched["translations"]["fr"]["language"] = serde_json::json!("es");
        let err = serde_json::from_value::<MultilingualRecord>(mismatched).unwrap_err();
        assert!(err.to_string().contains("does not match"), "{err}");

        json["translations"]["en"]["srd"] = serde_json::json!(true);
        json["translations"]["en"]["deleted_at"] = serde_json::json!(3);
        let err = serde_json::from_value::<MultilingualRecord>(json).unwrap_err();
        assert!(err.to_string().contains("protected translation `en`"), "{err}");
    }
}
