//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record store calls into translation lifecycle APIs.
//! - Keep transport layers decoupled from storage details.

pub mod translation_service;
