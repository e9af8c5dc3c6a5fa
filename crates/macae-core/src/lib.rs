//! Core types and error definitions for the MACAE engine.
//!
//! This crate provides the foundational types shared across all MACAE crates:
//! the error taxonomy, the persisted data model and the plan/step state
//! machine.
//!
//! # Main types
//!
//! - [`MacaeError`]: Unified error enum for all MACAE subsystems.
//! - [`MacaeResult`]: Convenience alias for `Result<T, MacaeError>`.
//! - [`AgentType`]: Discriminator for every agent variant.
//! - [`Plan`] / [`Step`]: A decomposed task and its ordered sub-tasks.
//! - [`StoredItem`]: Tagged union of every persisted document kind.

/// Error taxonomy and caller-facing error codes.
pub mod error;
/// Persisted records and request payloads.
pub mod models;
/// Step transitions and the derived plan aggregate.
pub mod plan_state;

pub use error::{ErrorCode, MacaeError, MacaeResult};
pub use models::*;
