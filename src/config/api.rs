use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Settings for the generic API client.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ApiConfig {
    /// Relative request paths are resolved against this URL.
    pub base_url: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
    /// How many times a failed request is re-sent. No backoff.
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
}

fn default_timeout_in_ms() -> u64 {
    30_000
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ApiConfig {
            base_url: base_url.into(),
            timeout_in_ms: default_timeout_in_ms(),
            retries: 0,
            default_headers: HashMap::new(),
        }
    }
}
