//! Input screening for the MACAE engine.
//!
//! Everything a user types passes through here before an agent sees it.
//!
//! # Main types
//!
//! - [`ContentSafety`]: Pluggable responsible-AI check.
//! - [`BlockedTermsCheck`]: Default check matching a list of blocked terms.
//! - [`rai_success`]: Runs a check, treating checker failures as safe.
//! - [`Sanitizer`]: Strips control characters and enforces length limits.
//! - [`SecurityConfig`]: The `[security]` configuration section.

/// Security configuration section.
pub mod config;
/// Content-safety screening.
pub mod content_safety;
/// Input sanitization utilities.
pub mod sanitizer;

pub use config::SecurityConfig;
pub use content_safety::{rai_success, BlockedTermsCheck, ContentSafety, SafetyVerdict};
pub use sanitizer::{SanitizeResult, Sanitizer};
