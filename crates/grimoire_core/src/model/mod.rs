//! Domain model for multilingual reference records.
//!
//! # Responsibility
//! - Define the record aggregate, its translation variants and language keys.
//! - Keep lifecycle rules pure so they run on any loaded snapshot.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.
//! - Requestable languages are derived, never stored as source of truth.

pub mod availability;
pub mod language;
pub mod record;
pub mod variant;
