use crate::content_safety::{BlockedTermsCheck, DEFAULT_BLOCKED_TERMS};
use crate::sanitizer::{Sanitizer, DEFAULT_MAX_DESCRIPTION_LENGTH};
use serde::{Deserialize, Serialize};

/// The `[security]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Longest accepted task description, in bytes.
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
    /// Case-insensitive terms that block a task.
    #[serde(default = "default_blocked_terms")]
    pub blocked_terms: Vec<String>,
}

fn default_max_description_length() -> usize {
    DEFAULT_MAX_DESCRIPTION_LENGTH
}

fn default_blocked_terms() -> Vec<String> {
    DEFAULT_BLOCKED_TERMS.iter().map(|t| t.to_string()).collect()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_description_length: default_max_description_length(),
            blocked_terms: default_blocked_terms(),
        }
    }
}

impl SecurityConfig {
    /// Sanitizer enforcing the configured length limit.
    pub fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(self.max_description_length)
    }

    /// Content check over the configured blocked terms.
    pub fn content_safety(&self) -> BlockedTermsCheck {
        BlockedTermsCheck::new(self.blocked_terms.iter().cloned())
    }
}
