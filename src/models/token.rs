use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which half of the token pair a record holds.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Cookie name prefix for this kind, e.g. `app_token_` + namespace.
    pub fn cookie_prefix(&self) -> &'static str {
        match self {
            TokenKind::Access => "app_token_",
            TokenKind::Refresh => "app_refresh_",
        }
    }

    pub fn cookie_name(&self, namespace: &str) -> String {
        format!("{}{}", self.cookie_prefix(), namespace)
    }
}

/// A token as held in the cookie jar.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    pub raw_token: String,
    pub namespace: String,
    /// `None` means a session cookie with no known expiry.
    pub expiry: Option<DateTime<Utc>>,
    pub kind: TokenKind,
}

impl TokenRecord {
    pub fn new(
        raw_token: impl Into<String>,
        namespace: impl Into<String>,
        expiry: Option<DateTime<Utc>>,
        kind: TokenKind,
    ) -> Self {
        TokenRecord {
            raw_token: raw_token.into(),
            namespace: namespace.into(),
            expiry,
            kind,
        }
    }

    pub fn cookie_name(&self) -> String {
        self.kind.cookie_name(&self.namespace)
    }
}
