//! Error types shared by the client, session and interceptor layers.
//!
//! Every runtime failure is normalized into an [`ApiError`] so callers see one
//! shape regardless of whether the problem was the network, the server, or
//! the session itself. [`SetupError`] covers start-up problems only.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used for status 0 (no response at all).
pub const TRANSPORT_MESSAGE: &str = "Unable to reach the server. Check your connection.";

/// Broad category of a normalized error.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network unreachable, connection reset, DNS failure.
    Transport,
    /// The request, the refresh call, or a queued wait exceeded its deadline.
    Timeout,
    /// The server answered 401.
    Unauthorized,
    /// The server answered 422 or supplied per-field errors.
    Validation,
    /// Any other non-success status.
    Http,
    /// The request could not be built (bad URL, unserializable body).
    InvalidRequest,
    /// The response body was not what the caller asked for.
    Decode,
    /// A refresh was needed but no refresh token was stored.
    RefreshImpossible,
    /// The session was logged out or switched while the operation was pending.
    SessionEnded,
}

/// Uniform error shape: `{ message, status, statusText, url, fieldErrors? }`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: u16,
    pub status_text: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, Vec<String>>>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, url: impl Into<String>) -> Self {
        ApiError {
            kind,
            message: message.into(),
            status: 0,
            status_text: String::new(),
            url: url.into(),
            field_errors: None,
        }
    }

    /// No response was received.
    pub fn transport(url: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, TRANSPORT_MESSAGE, url)
    }

    pub fn timeout(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message, url)
    }

    pub fn invalid_request(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message, url)
    }

    pub fn decode(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message, url)
    }

    pub fn refresh_impossible(namespace: &str) -> Self {
        Self::new(
            ErrorKind::RefreshImpossible,
            format!("No refresh token available for namespace '{}'", namespace),
            "",
        )
    }

    pub fn session_ended() -> Self {
        Self::new(
            ErrorKind::SessionEnded,
            "The session ended before the operation completed",
            "",
        )
    }

    /// Builds an error from a non-success response.
    ///
    /// The server's own message wins over the fixed status table; field errors
    /// are kept whenever the body carries them.
    pub fn from_response(status: http::StatusCode, url: impl Into<String>, body: &[u8]) -> Self {
        let parsed: Option<Value> = serde_json::from_slice(body).ok();
        let server_message = parsed.as_ref().and_then(server_message);
        let field_errors = parsed.as_ref().and_then(field_errors);

        let code = status.as_u16();
        let kind = match code {
            401 => ErrorKind::Unauthorized,
            408 => ErrorKind::Timeout,
            422 => ErrorKind::Validation,
            _ if field_errors.is_some() => ErrorKind::Validation,
            _ => ErrorKind::Http,
        };

        ApiError {
            kind,
            message: server_message.unwrap_or_else(|| status_message(code).to_string()),
            status: code,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            url: url.into(),
            field_errors,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Fixed status-to-message table, used only when the server gave no message.
pub fn status_message(status: u16) -> &'static str {
    match status {
        0 => TRANSPORT_MESSAGE,
        400 => "Invalid request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not found",
        408 => "Request timed out",
        409 => "Conflict",
        422 => "Invalid input",
        429 => "Rate limited",
        500 => "Internal server error",
        502..=504 => "Service unavailable",
        500..=599 => "Server error",
        _ => "Request failed",
    }
}

fn server_message(body: &Value) -> Option<String> {
    ["message", "error", "detail"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn field_errors(body: &Value) -> Option<HashMap<String, Vec<String>>> {
    let map = body
        .get("fieldErrors")
        .or_else(|| body.get("errors"))?
        .as_object()?;

    let errors: HashMap<String, Vec<String>> = map
        .iter()
        .filter_map(|(field, value)| {
            let messages = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect(),
                _ => return None,
            };
            Some((field.clone(), messages))
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(errors)
    }
}

/// Problems that stop the library from starting.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),
    #[error("invalid logging configuration: {0}")]
    Logging(String),
    #[error("invalid base url '{0}'")]
    BaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
