use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The `[memory]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Skip the durable store and keep everything in process memory.
    #[serde(default)]
    pub use_local_storage: bool,
    /// Directory holding the durable document file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Deadline for each durable store operation.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".macae")
}

fn default_operation_timeout_ms() -> u64 {
    5_000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            use_local_storage: false,
            data_dir: default_data_dir(),
            operation_timeout_ms: default_operation_timeout_ms(),
        }
    }
}

impl MemoryConfig {
    /// Configuration that never touches the durable store.
    pub fn local() -> Self {
        Self {
            use_local_storage: true,
            ..Self::default()
        }
    }

    /// Per-operation deadline for the durable store.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Apply `USE_LOCAL_STORAGE` and `MACAE_DATA_DIR` from the process
    /// environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(flag) = lookup("USE_LOCAL_STORAGE") {
            self.use_local_storage = parse_flag(&flag);
        }
        if let Some(dir) = lookup("MACAE_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
