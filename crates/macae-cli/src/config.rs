//! `macae.toml` loading with environment overrides.

use macae_agent::ClientConfig;
use macae_memory::MemoryConfig;
use macae_security::SecurityConfig;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration; every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MacaeConfig {
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// User id used when `--user` is not given.
    #[serde(default)]
    pub default_user: Option<String>,
}

impl MacaeConfig {
    /// Read `path` if it exists, otherwise start from defaults, then apply
    /// environment overrides.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::parse(&text).map_err(|e| {
                anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.memory.apply_overrides(&lookup);
        self.client.apply_overrides(&lookup);
        if let Some(user) = lookup("MACAE_USER_ID").filter(|u| !u.trim().is_empty()) {
            self.default_user = Some(user);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = MacaeConfig::parse("").unwrap();
        assert!(!config.memory.use_local_storage);
        assert!(!config.client.is_configured());
        assert_eq!(config.security.max_description_length, 10_000);
        assert!(config.default_user.is_none());
    }

    #[test]
    fn test_sections_are_read() {
        let config = MacaeConfig::parse(
            r#"
            default_user = "alice"

            [memory]
            use_local_storage = true

            [client]
            endpoint = "https://example.openai.azure.com"
            deployment = "gpt-4o"
            api_key = "secret"

            [security]
            blocked_terms = ["forbidden"]
            "#,
        )
        .unwrap();
        assert!(config.memory.use_local_storage);
        assert!(config.client.is_configured());
        assert_eq!(config.security.blocked_terms, vec!["forbidden"]);
        assert_eq!(config.default_user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = MacaeConfig::parse("default_user = \"alice\"").unwrap();
        let env: HashMap<&str, &str> = [
            ("MACAE_USER_ID", "bob"),
            ("USE_LOCAL_STORAGE", "true"),
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt-4o-mini"),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.default_user.as_deref(), Some("bob"));
        assert!(config.memory.use_local_storage);
        assert_eq!(config.client.deployment.as_deref(), Some("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = MacaeConfig::load(&tmp.path().join("absent.toml")).await.unwrap();
        assert_eq!(config.security.max_description_length, 10_000);
    }
}
