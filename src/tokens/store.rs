use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use super::claims::{self, Claims};
use super::cookie::{cookie_expiry, token_cookie};
use crate::config::MissingExpiryPolicy;
use crate::models::{TokenKind, TokenRecord};
use crate::storage::CookieJar;

/// Default window before expiry in which a token already counts as expired.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(5 * 60);
/// Default lifetime of a refresh token cookie.
pub const DEFAULT_REFRESH_DAYS: i64 = 30;

/// Namespace-scoped access/refresh token persistence.
///
/// The token store is the only component that reads or writes token cookies.
/// Storage failures are logged and swallowed: reads come back empty and
/// writes are dropped, so an unusable medium looks like an empty one.
#[derive(Clone)]
pub struct TokenStore {
    jar: Arc<dyn CookieJar>,
    secure: bool,
    buffer: Duration,
    missing_expiry: MissingExpiryPolicy,
}

impl TokenStore {
    /// `secure` marks cookies `Secure`, which should follow the transport scheme.
    pub fn new(jar: Arc<dyn CookieJar>, secure: bool) -> Self {
        if !jar.is_available() {
            warn!("Token storage medium is unavailable; token operations are no-ops.");
        }
        TokenStore {
            jar,
            secure,
            buffer: DEFAULT_EXPIRY_BUFFER,
            missing_expiry: MissingExpiryPolicy::default(),
        }
    }

    pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_missing_expiry(mut self, policy: MissingExpiryPolicy) -> Self {
        self.missing_expiry = policy;
        self
    }

    pub fn is_available(&self) -> bool {
        self.jar.is_available()
    }

    pub fn expiry_buffer(&self) -> Duration {
        self.buffer
    }

    /// Persists an access token.
    ///
    /// Expiry is `explicit_expiry_secs` from now when given, else the token's
    /// `exp` claim, else unknown (a session cookie).
    pub async fn save_access_token(
        &self,
        token: &str,
        namespace: &str,
        explicit_expiry_secs: Option<i64>,
    ) {
        let expiry = match explicit_expiry_secs {
            Some(secs) => offset_from_now(TimeDelta::try_seconds(secs)),
            None => claims::decode(token).and_then(|c| c.expires_at()),
        };
        if expiry.is_none() {
            debug!(
                "Access token for '{}' has no known expiry; storing as session cookie",
                namespace
            );
        }
        self.write(TokenRecord::new(token, namespace, expiry, TokenKind::Access))
            .await;
    }

    /// Persists a refresh token that lapses after `expiry_days` (30 when `None`).
    pub async fn save_refresh_token(&self, token: &str, namespace: &str, expiry_days: Option<i64>) {
        let days = expiry_days.unwrap_or(DEFAULT_REFRESH_DAYS);
        let expiry = offset_from_now(TimeDelta::try_days(days));
        if expiry.is_none() {
            debug!(
                "Refresh token lifetime of {} days for '{}' is out of range; storing as session cookie",
                days, namespace
            );
        }
        self.write(TokenRecord::new(token, namespace, expiry, TokenKind::Refresh))
            .await;
    }

    pub async fn get_access_token(&self, namespace: &str) -> Option<String> {
        self.read(TokenKind::Access, namespace)
            .await
            .map(|r| r.raw_token)
    }

    pub async fn get_refresh_token(&self, namespace: &str) -> Option<String> {
        self.read(TokenKind::Refresh, namespace)
            .await
            .map(|r| r.raw_token)
    }

    /// Deletes both tokens for `namespace`. Absent tokens are not an error.
    pub async fn remove_all(&self, namespace: &str) {
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            let name = kind.cookie_name(namespace);
            if let Err(e) = self.jar.remove(&name).await {
                warn!("Failed to remove cookie '{}': {}", name, e);
            }
        }
    }

    /// True iff an access token exists and is not expired within the buffer window.
    ///
    /// Both the stored cookie expiry and the token's own `exp` claim count.
    pub async fn has_valid_token(&self, namespace: &str) -> bool {
        self.is_valid_for(namespace, self.buffer).await
    }

    /// True iff an access token exists and stays unexpired for at least `horizon`.
    pub async fn is_valid_for(&self, namespace: &str, horizon: Duration) -> bool {
        let Some(record) = self.read(TokenKind::Access, namespace).await else {
            return false;
        };
        if let Some(expiry) = record.expiry {
            if within_buffer(expiry, horizon, Utc::now()) {
                return false;
            }
        }
        !self.is_expired(&record.raw_token, horizon)
    }

    /// True iff `now >= exp*1000 - buffer`; tokens without `exp` follow the
    /// configured [`MissingExpiryPolicy`].
    pub fn is_expired(&self, token: &str, buffer: Duration) -> bool {
        claims::is_expired_at(token, buffer, Utc::now(), self.missing_expiry)
    }

    /// Decodes a token's claims; `None` for malformed tokens.
    pub fn decode(&self, token: &str) -> Option<Claims> {
        claims::decode(token)
    }

    /// The `sub` claim of the namespace's current access token.
    pub async fn get_subject_id(&self, namespace: &str) -> Option<String> {
        let token = self.get_access_token(namespace).await?;
        claims::decode(&token)?.sub
    }

    async fn write(&self, record: TokenRecord) {
        let name = record.cookie_name();
        if let Err(e) = self.jar.set(token_cookie(&record, self.secure)).await {
            warn!("Failed to persist cookie '{}': {}", name, e);
        }
    }

    async fn read(&self, kind: TokenKind, namespace: &str) -> Option<TokenRecord> {
        let name = kind.cookie_name(namespace);
        match self.jar.get(&name).await {
            Ok(Some(cookie)) => Some(TokenRecord::new(
                cookie.value(),
                namespace,
                cookie_expiry(&cookie),
                kind,
            )),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read cookie '{}': {}", name, e);
                None
            }
        }
    }
}

/// `now + delta`, or `None` when either step overflows.
fn offset_from_now(delta: Option<TimeDelta>) -> Option<DateTime<Utc>> {
    delta.and_then(|d| Utc::now().checked_add_signed(d))
}

/// True when `expiry` falls within `buffer` of `now`.
fn within_buffer(expiry: DateTime<Utc>, buffer: Duration, now: DateTime<Utc>) -> bool {
    let buffer_ms = i64::try_from(buffer.as_millis()).unwrap_or(i64::MAX);
    now.timestamp_millis().saturating_add(buffer_ms) >= expiry.timestamp_millis()
}
