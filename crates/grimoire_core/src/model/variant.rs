//! Translation variant value entity.
//!
//! # Responsibility
//! - Hold one language's content for a record.
//! - Own per-variant soft-delete semantics.
//!
//! # Invariants
//! - `is_protected` is fixed at construction.
//! - A protected variant never carries a `deleted_at` tombstone.

use crate::model::language::LanguageCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque per-language payload.
///
/// Only `name` and `description` are named; domain-specific fields
/// (spell level, school, monster stats, ...) are carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantContent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl VariantContent {
    /// Creates content with a name and no extra fields.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style helper for the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder-style helper for one domain-specific field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Attempted to tombstone a protected variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedVariant;

/// One language's content for a multilingual record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationVariant {
    pub language: LanguageCode,
    pub content: VariantContent,
    /// Canonical SRD content. Serialized as `srd` to match the external schema.
    #[serde(rename = "srd")]
    is_protected: bool,
    /// Epoch ms tombstone. `None` means active.
    pub deleted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TranslationVariant {
    /// Creates an active variant stamped at `now_ms`.
    pub fn new(
        language: LanguageCode,
        content: VariantContent,
        is_protected: bool,
        now_ms: i64,
    ) -> Self {
        Self {
            language,
            content,
            is_protected,
            deleted_at: None,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Rebuilds a variant from persisted columns without validation.
    ///
    /// Callers must run `MultilingualRecord::validate()` on the aggregate.
    pub fn from_parts(
        language: LanguageCode,
        content: VariantContent,
        is_protected: bool,
        deleted_at: Option<i64>,
        created_at: i64,
        updated_at: i64,
    ) -> Self {
        Self {
            language,
            content,
            is_protected,
            deleted_at,
            created_at,
            updated_at,
        }
    }

    pub fn is_protected(&self) -> bool {
        self.is_protected
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Tombstones this variant.
    ///
    /// # Errors
    /// - `ProtectedVariant` when the variant is SRD content; state is unchanged.
    pub fn soft_delete(&mut self, now_ms: i64) -> Result<(), ProtectedVariant> {
        if self.is_protected {
            return Err(ProtectedVariant);
        }
        self.deleted_at = Some(now_ms);
        self.updated_at = now_ms;
        Ok(())
    }
}
