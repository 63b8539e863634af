use serde::Serialize;

use crate::models::UserProfile;

/// Where the session is in its lifecycle.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
    RefreshingToken,
    Error,
}

/// Observable session state. Only the coordinator mutates it.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub phase: SessionPhase,
    pub current_user: Option<UserProfile>,
    pub loading: bool,
    pub error: Option<String>,
    pub requires_password_change: bool,
}

/// Options for `SessionCoordinator::logout`.
#[derive(Debug, Clone, Copy)]
pub struct LogoutOptions {
    /// Navigate to the login entry point afterwards.
    pub redirect: bool,
}

impl LogoutOptions {
    /// Clear the session without navigating anywhere.
    pub fn silent() -> Self {
        LogoutOptions { redirect: false }
    }
}

impl Default for LogoutOptions {
    fn default() -> Self {
        LogoutOptions { redirect: true }
    }
}
