use std::path::Path;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::api::ApiConfig;
use super::logging::LoggingConfig;
use super::session::SessionConfig;
use super::storage::StorageConfig;
use crate::error::SetupError;

/// Environment variables with this prefix override file values;
/// `__` separates nested keys (e.g. `SESSIONTRON_SESSION__NAMESPACE`).
pub const ENV_PREFIX: &str = "SESSIONTRON_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: API client, session endpoints, storage and logging.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub api: ApiConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConfigV1 {
    /// Builds a config in code, with memory storage and console logging.
    pub fn new(api: ApiConfig, session: SessionConfig) -> Self {
        ConfigV1 {
            api,
            session,
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Load config from a YAML file, with `SESSIONTRON_*` environment overrides.
pub fn load_config(path: impl AsRef<Path>) -> Result<ConfigV1, SetupError> {
    let figment = Figment::new()
        .merge(Yaml::file(path.as_ref()))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));
    extract(figment)
}

/// Parse config from an in-memory YAML document.
pub fn parse_config(yaml: &str) -> Result<ConfigV1, SetupError> {
    extract(Figment::new().merge(Yaml::string(yaml)))
}

fn extract(figment: Figment) -> Result<ConfigV1, SetupError> {
    let config = figment.extract::<Config>().map_err(Box::new)?;
    // handle configuration migration between versions here when necessary
    match config {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
