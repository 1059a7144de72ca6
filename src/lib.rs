//! Configuration reconciliation for a running proxy engine.
//!
//! Routing entities (TCP/UDP stream forwards, proxy hosts, redirections,
//! dead hosts) live in a store; the engine serves whatever sits in its
//! config directory. This crate keeps the two in agreement: it renders an
//! entity into config text, validates the result against the engine
//! before touching the live directory, commits atomically and triggers a
//! serialized graceful reload.

// Core pipeline
pub mod engine;
pub mod reconcile;
pub mod render;

// Data model & lifecycle
pub mod entity;
pub mod manager;
pub mod store;

// Collaborators
pub mod access;
pub mod audit;
pub mod certs;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod resilience;

pub use config::DirectorSettings;
pub use error::{Error, Result};
pub use manager::EntityManager;
pub use reconcile::Reconciler;
