//! Core domain logic for Grimoire multilingual reference records.
//! This crate is the single source of truth for translation lifecycle rules.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::availability::{compute_available, count_active};
pub use model::language::{InvalidLanguageCode, LanguageCode};
pub use model::record::{
    AddMode, MultilingualRecord, RecordId, RecordKind, RecordMetadata, RecordProjection,
    RecordValidationError, RemovedTranslation, TranslationRuleError,
};
pub use model::variant::{TranslationVariant, VariantContent};
pub use repo::record_repo::{
    parse_record_id, RecordStore, RepoError, RepoResult, SqliteRecordStore,
};
pub use service::translation_service::{
    AddedTranslation, NewTranslation, RecordDeleted, ServiceResult, TranslationService,
    TranslationServiceError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
