//! Cookie layout for persisted tokens.
//!
//! Each token is one cookie named `app_token_<ns>` or `app_refresh_<ns>`,
//! with a percent-encoded value, `Path=/`, `SameSite=Strict`, `Secure` over
//! https, and `Expires` when the expiry is known.

use chrono::{DateTime, TimeZone, Utc};
use cookie::time::OffsetDateTime;
use cookie::{Cookie, SameSite};

use crate::models::TokenRecord;

/// Builds the cookie that persists `record`.
pub fn token_cookie(record: &TokenRecord, secure: bool) -> Cookie<'static> {
    let mut builder = Cookie::build((record.cookie_name(), record.raw_token.clone()))
        .path("/")
        .same_site(SameSite::Strict)
        .secure(secure);

    if let Some(expiry) = record
        .expiry
        .and_then(|t| OffsetDateTime::from_unix_timestamp(t.timestamp()).ok())
    {
        builder = builder.expires(expiry);
    }

    builder.build()
}

/// The `Expires` attribute as a chrono timestamp; `None` for session cookies.
pub fn cookie_expiry(cookie: &Cookie<'_>) -> Option<DateTime<Utc>> {
    cookie
        .expires_datetime()
        .and_then(|t| Utc.timestamp_opt(t.unix_timestamp(), 0).single())
}

/// A cookie whose `Expires` is in the past no longer exists as far as readers are concerned.
pub fn has_lapsed(cookie: &Cookie<'_>, now: DateTime<Utc>) -> bool {
    cookie_expiry(cookie).map(|exp| now >= exp).unwrap_or(false)
}

/// `Set-Cookie` style line with the value percent-encoded.
pub fn render(cookie: &Cookie<'_>) -> String {
    cookie.encoded().to_string()
}

/// Parses a line produced by [`render`]. Returns `None` for anything malformed.
pub fn parse(line: &str) -> Option<Cookie<'static>> {
    Cookie::parse_encoded(line.trim().to_string()).ok()
}
