use std::collections::HashMap;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::MissingExpiryPolicy;
use crate::utils::value::value_to_string;

/// Claims carried in the payload segment of a signed token.
///
/// Registered claims are read leniently: a NumericDate may be fractional and
/// `sub`/`iss` may be numbers. Anything that does not fit stays in `extra`.
#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct Claims {
    /// Expiry, seconds since the epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Any additional claim fields we don't explicitly model.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Claims {
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        Claims {
            exp: take_with(&mut map, "exp", numeric_date),
            iat: take_with(&mut map, "iat", numeric_date),
            sub: take_with(&mut map, "sub", string_or_number),
            iss: take_with(&mut map, "iss", string_or_number),
            extra: map.into_iter().collect(),
        }
    }

    /// The `exp` claim as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .and_then(|secs| Utc.timestamp_millis_opt(secs.saturating_mul(1000)).single())
    }
}

/// Removes `key` if `convert` accepts its value; otherwise it is left in place.
fn take_with<T>(
    map: &mut Map<String, Value>,
    key: &str,
    convert: fn(&Value) -> Option<T>,
) -> Option<T> {
    let converted = map.get(key).and_then(convert)?;
    map.remove(key);
    Some(converted)
}

fn numeric_date(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs.floor() as i64))
}

fn string_or_number(value: &Value) -> Option<String> {
    match value {
        Value::String(_) | Value::Number(_) => Some(value_to_string(value.clone())),
        _ => None,
    }
}

/// Decodes the payload of a `header.payload.signature` token.
///
/// The signature is not verified; this only reads what the token says about
/// itself. Any malformed input yields `None`.
pub fn decode(token: &str) -> Option<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        debug!("Token has {} segments, expected 3", segments.len());
        return None;
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| debug!("Token payload is not base64url: {}", e))
        .ok()?;

    serde_json::from_slice::<Map<String, Value>>(&payload)
        .map(Claims::from_map)
        .map_err(|e| debug!("Token payload is not a claims object: {}", e))
        .ok()
}

/// True iff `now >= exp*1000 - buffer`.
///
/// Tokens that cannot be decoded, or that carry no `exp`, are judged by
/// `policy`.
pub fn is_expired_at(
    token: &str,
    buffer: Duration,
    now: DateTime<Utc>,
    policy: MissingExpiryPolicy,
) -> bool {
    match decode(token).and_then(|c| c.exp) {
        Some(exp) => {
            let buffer_ms = i64::try_from(buffer.as_millis()).unwrap_or(i64::MAX);
            now.timestamp_millis() >= exp.saturating_mul(1000).saturating_sub(buffer_ms)
        }
        None => policy == MissingExpiryPolicy::AssumeExpired,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    /// Mints an HS256 token with the given claims.
    pub(crate) fn mint(claims: &Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("Failed to create token")
    }

    #[test]
    fn test_decode_returns_embedded_claims() {
        let token = mint(&json!({"sub": "user-7", "exp": 4102444800i64, "role": "admin"}));
        let claims = decode(&token).expect("claims should decode");
        assert_eq!(claims.sub.as_deref(), Some("user-7"));
        assert_eq!(claims.exp, Some(4102444800));
        assert_eq!(claims.extra.get("role"), Some(&json!("admin")));
        assert_eq!(
            claims.expires_at().map(|t| t.timestamp()),
            Some(4102444800)
        );
    }

    #[test]
    fn test_decode_accepts_padded_payload() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"sub":"abc"}"#);
        assert!(payload.ends_with('='));
        let token = format!("x.{}.y", payload);
        assert_eq!(decode(&token).unwrap().sub.as_deref(), Some("abc"));
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert!(decode("").is_none());
        assert!(decode("onlyone").is_none());
        assert!(decode("two.parts").is_none());
        assert!(decode("a.b.c.d").is_none());
        assert!(decode("a.!!!not-base64!!!.c").is_none());

        let not_json = URL_SAFE_NO_PAD.encode(b"not json");
        assert!(decode(&format!("a.{}.c", not_json)).is_none());

        let not_object = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        assert!(decode(&format!("a.{}.c", not_object)).is_none());
    }

    #[test]
    fn test_decode_tolerates_loosely_typed_claims() {
        let token = mint(&json!({"sub": 42, "iss": 7, "exp": 4102444800.75, "iat": "yesterday"}));
        let claims = decode(&token).expect("claims should decode");
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert_eq!(claims.iss.as_deref(), Some("7"));
        assert_eq!(claims.exp, Some(4102444800));
        assert_eq!(claims.iat, None);
        assert_eq!(claims.extra.get("iat"), Some(&json!("yesterday")));

        let nested = mint(&json!({"sub": {"id": 1}}));
        let claims = decode(&nested).expect("claims should decode");
        assert_eq!(claims.sub, None);
        assert_eq!(claims.extra.get("sub"), Some(&json!({"id": 1})));
    }

    #[test]
    fn test_past_exp_expires_regardless_of_other_claims() {
        let token = mint(&json!({"sub": 42, "exp": 1000}));
        let now = Utc::now();
        assert!(is_expired_at(&token, Duration::ZERO, now, MissingExpiryPolicy::AssumeValid));
    }

    #[test]
    fn test_is_expired_boundary() {
        let exp = 2_000_000_000i64;
        let token = mint(&json!({"exp": exp}));
        let buffer = Duration::from_secs(300);
        let policy = MissingExpiryPolicy::AssumeValid;

        let edge = Utc.timestamp_opt(exp - 300, 0).unwrap();
        assert!(is_expired_at(&token, buffer, edge, policy));

        let just_before = Utc.timestamp_millis_opt((exp - 300) * 1000 - 1).unwrap();
        assert!(!is_expired_at(&token, buffer, just_before, policy));

        let no_buffer = Utc.timestamp_opt(exp - 1, 0).unwrap();
        assert!(!is_expired_at(&token, Duration::ZERO, no_buffer, policy));
    }

    #[test]
    fn test_missing_exp_follows_policy() {
        let token = mint(&json!({"sub": "forever"}));
        let now = Utc::now();
        let buffer = Duration::from_secs(300);
        assert!(!is_expired_at(&token, buffer, now, MissingExpiryPolicy::AssumeValid));
        assert!(is_expired_at(&token, buffer, now, MissingExpiryPolicy::AssumeExpired));
        assert!(!is_expired_at("garbage", buffer, now, MissingExpiryPolicy::AssumeValid));
    }
}
