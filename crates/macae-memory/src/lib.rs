//! Session-scoped persistence for plans, steps and messages.
//!
//! Agents never talk to a database directly; they receive a Memory Context
//! for their session. Two backends exist: a process-local store and a durable
//! JSON-lines document store. The [`MemoryProvider`] picks one of them on
//! first use and falls back to local storage when the durable store cannot
//! be initialized. Every context of a provider then uses the same backend.
//!
//! # Main types
//!
//! - [`MemoryContext`]: Trait every backend implements.
//! - [`LocalMemoryContext`]: In-memory backend over shared [`LocalStorage`].
//! - [`FileMemoryContext`]: Durable backend over a [`FileStore`].
//! - [`MemoryProvider`]: Fallback policy and per-session cache.
//! - [`MemoryConfig`]: The `[memory]` configuration section.

/// Memory configuration section.
pub mod config;
/// The Memory Context trait and typed helpers.
pub mod context;
/// Durable JSON-lines document store.
pub mod file;
/// Process-local document store.
pub mod local;
/// Context initialization with fallback.
pub mod provider;

pub use config::MemoryConfig;
pub use context::{typed, MemoryContext, MemoryContextExt, QueryParams};
pub use file::{FileMemoryContext, FileStore};
pub use local::{LocalMemoryContext, LocalStorage};
pub use provider::MemoryProvider;
