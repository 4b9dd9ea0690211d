//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the record store contract consumed by lifecycle services.
//! - Isolate SQLite query details from business orchestration.
//!
//! # Invariants
//! - Repository writes enforce `MultilingualRecord::validate()` before
//!   persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

pub mod record_repo;
