use async_trait::async_trait;
use macae_core::MacaeResult;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Terms that block a task outright when no richer check is configured.
pub const DEFAULT_BLOCKED_TERMS: [&str; 5] = ["malware", "illegal", "hack", "virus", "exploit"];

/// Outcome of screening a piece of user text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum SafetyVerdict {
    /// Nothing objectionable found.
    Safe,
    /// The text must not be processed.
    Blocked {
        /// What triggered the block.
        reason: String,
    },
}

impl SafetyVerdict {
    /// Whether the text may proceed.
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }
}

/// Pluggable content-safety check run before any agent sees user input.
#[async_trait]
pub trait ContentSafety: Send + Sync {
    /// Screen `text`. An error means the check itself could not run.
    async fn check(&self, text: &str) -> MacaeResult<SafetyVerdict>;
}

/// Case-insensitive substring match against a list of blocked terms.
#[derive(Debug, Clone)]
pub struct BlockedTermsCheck {
    terms: Vec<String>,
}

impl BlockedTermsCheck {
    /// A check over `terms`; blank terms are dropped.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.into().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// The lowercase blocked terms.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

impl Default for BlockedTermsCheck {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_TERMS)
    }
}

#[async_trait]
impl ContentSafety for BlockedTermsCheck {
    async fn check(&self, text: &str) -> MacaeResult<SafetyVerdict> {
        let lowered = text.to_lowercase();
        match self.terms.iter().find(|term| lowered.contains(term.as_str())) {
            Some(term) => {
                warn!(term = %term, "Blocked term detected");
                Ok(SafetyVerdict::Blocked {
                    reason: format!("blocked term: {term}"),
                })
            }
            None => Ok(SafetyVerdict::Safe),
        }
    }
}

/// `true` when `text` may be processed.
///
/// A failing checker does not block legitimate requests: the error is
/// logged and the text is treated as safe.
pub async fn rai_success(checker: &dyn ContentSafety, text: &str) -> bool {
    match checker.check(text).await {
        Ok(verdict) => verdict.is_safe(),
        Err(e) => {
            error!(error = %e, "Content safety check failed, allowing input");
            true
        }
    }
}
