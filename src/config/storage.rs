use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A wrapper for the cookie jar configuration:
/// - enabled: if false, the jar is unavailable and token operations become no-ops.
/// - backend: where cookies live (memory, file).
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct StorageConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub backend: Option<StorageBackend>,
}

/// The cookie jar backends, selected via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum StorageBackend {
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "file")]
    File(FileJarConfig),
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct FileJarConfig {
    /// Path of the cookie file; its parent directory is created on demand.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            enabled: true,
            backend: Some(StorageBackend::Memory),
        }
    }
}
