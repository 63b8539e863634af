use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What to conclude about a token whose payload carries no `exp` claim.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MissingExpiryPolicy {
    /// Treat the token as valid until the server rejects it.
    #[default]
    AssumeValid,
    /// Treat the token as already expired.
    AssumeExpired,
}

/// Endpoints and timing knobs for the session coordinator and interceptor.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SessionConfig {
    /// Namespace active at start-up; see `SessionCoordinator::configure`.
    pub namespace: String,
    pub login_path: String,
    pub profile_path: String,
    pub refresh_path: String,
    /// Where `logout` navigates to unless the redirect is suppressed.
    #[serde(default = "default_login_route")]
    pub login_route: String,
    /// Requests whose URL contains any of these substrings bypass credentials.
    #[serde(default)]
    pub public_paths: Vec<String>,
    #[serde(default = "default_expiry_buffer_secs")]
    pub expiry_buffer_secs: u64,
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,
    #[serde(default = "default_refresh_timeout_ms")]
    pub refresh_timeout_ms: u64,
    #[serde(default)]
    pub missing_expiry: MissingExpiryPolicy,
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_expiry_buffer_secs() -> u64 {
    300
}

fn default_refresh_token_days() -> i64 {
    30
}

fn default_refresh_timeout_ms() -> u64 {
    10_000
}

impl SessionConfig {
    /// A config with the given namespace and endpoint paths and defaults elsewhere.
    /// The three endpoints are pre-seeded into the public allow-list.
    pub fn new(
        namespace: impl Into<String>,
        login_path: impl Into<String>,
        profile_path: impl Into<String>,
        refresh_path: impl Into<String>,
    ) -> Self {
        let login_path = login_path.into();
        let refresh_path = refresh_path.into();
        SessionConfig {
            namespace: namespace.into(),
            public_paths: vec![login_path.clone(), refresh_path.clone()],
            login_path,
            profile_path: profile_path.into(),
            refresh_path,
            login_route: default_login_route(),
            expiry_buffer_secs: default_expiry_buffer_secs(),
            refresh_token_days: default_refresh_token_days(),
            refresh_timeout_ms: default_refresh_timeout_ms(),
            missing_expiry: MissingExpiryPolicy::default(),
        }
    }

    pub fn expiry_buffer(&self) -> Duration {
        Duration::from_secs(self.expiry_buffer_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }
}
