/// Normalizes user-supplied text before it reaches an agent or the store.
///
/// Control characters are stripped (newlines and tabs survive), surrounding
/// whitespace is trimmed, and overly long or empty descriptions are rejected.
pub struct Sanitizer {
    max_length: usize,
}

/// Default upper bound on a task description, in bytes.
pub const DEFAULT_MAX_DESCRIPTION_LENGTH: usize = 10_000;

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_DESCRIPTION_LENGTH,
        }
    }
}

impl Sanitizer {
    /// A sanitizer rejecting input longer than `max_length` bytes.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Longest accepted input, in bytes.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Sanitize free text such as a task description or feedback.
    pub fn sanitize(&self, input: &str) -> SanitizeResult {
        if input.len() > self.max_length {
            return SanitizeResult::Rejected(format!(
                "Input exceeds maximum length of {} bytes",
                self.max_length
            ));
        }

        let stripped: String = input
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
            .collect();
        let cleaned = stripped.trim();

        if cleaned.is_empty() {
            return SanitizeResult::Rejected("Input is empty".to_string());
        }

        if cleaned != input {
            SanitizeResult::Cleaned(cleaned.to_string())
        } else {
            SanitizeResult::Clean(cleaned.to_string())
        }
    }

    /// Identifiers (user, session) are kept to a printable ASCII subset so
    /// they can be logged and used as cache keys verbatim.
    pub fn sanitize_identifier(&self, value: &str) -> String {
        value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
            .take(256)
            .collect()
    }
}

/// Outcome of [`Sanitizer::sanitize`].
#[derive(Debug, PartialEq)]
pub enum SanitizeResult {
    /// Input was already clean.
    Clean(String),
    /// Input was cleaned (control characters or padding removed).
    Cleaned(String),
    /// Input was rejected entirely.
    Rejected(String),
}

impl SanitizeResult {
    /// Whether the input was rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self, SanitizeResult::Rejected(_))
    }

    /// The usable text, or `None` when rejected.
    pub fn into_string(self) -> Option<String> {
        match self {
            SanitizeResult::Clean(s) | SanitizeResult::Cleaned(s) => Some(s),
            SanitizeResult::Rejected(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_input() {
        let s = Sanitizer::default();
        let result = s.sanitize("Plan a product launch\nfor Q3");
        assert!(matches!(result, SanitizeResult::Clean(_)));
    }

    #[test]
    fn test_control_chars_and_padding_stripped() {
        let s = Sanitizer::default();
        let result = s.sanitize("  Onboard\x00\x07 Jessica  ");
        assert_eq!(result, SanitizeResult::Cleaned("Onboard Jessica".to_string()));
    }

    #[test]
    fn test_length_rejection() {
        let s = Sanitizer::new(10);
        assert!(s.sanitize("This is too long for the limit").is_rejected());
    }

    #[test]
    fn test_blank_rejected() {
        let s = Sanitizer::default();
        assert!(s.sanitize(" \x01\t ").is_rejected());
        assert!(s.sanitize("").into_string().is_none());
    }

    #[test]
    fn test_identifier_sanitization() {
        let s = Sanitizer::default();
        assert_eq!(s.sanitize_identifier("user-42\x1b[31m"), "user-4231m");
        assert_eq!(s.sanitize_identifier("a b@c.io"), "ab@c.io");
    }
}
