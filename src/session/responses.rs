use serde::Deserialize;

use crate::models::UserProfile;

/// Body of a login or refresh response.
///
/// Servers spell these fields several ways; all the common spellings are accepted.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct TokenResponse {
    #[serde(alias = "access_Token", alias = "accessToken", alias = "token")]
    pub access_token: String,
    #[serde(default, alias = "refresh_Token", alias = "refreshToken")]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds, when the server states it.
    #[serde(default, alias = "expiresIn")]
    pub expires_in: Option<i64>,
    #[serde(default, alias = "profile")]
    pub user: Option<UserProfile>,
    #[serde(
        default,
        alias = "requiresPasswordChange",
        alias = "mustChangePassword"
    )]
    pub requires_password_change: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_mixed_case_access_token() {
        let response: TokenResponse = serde_json::from_value(json!({
            "access_Token": "T1",
            "user": {"id": 1, "displayName": "A"}
        }))
        .unwrap();
        assert_eq!(response.access_token, "T1");
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.user.unwrap().id, "1");
        assert!(!response.requires_password_change);
    }

    #[test]
    fn test_accepts_camel_case_fields() {
        let response: TokenResponse = serde_json::from_value(json!({
            "accessToken": "T2",
            "refreshToken": "R2",
            "expiresIn": 900,
            "mustChangePassword": true
        }))
        .unwrap();
        assert_eq!(response.access_token, "T2");
        assert_eq!(response.refresh_token.as_deref(), Some("R2"));
        assert_eq!(response.expires_in, Some(900));
        assert!(response.requires_password_change);
    }

    #[test]
    fn test_missing_access_token_is_an_error() {
        assert!(serde_json::from_value::<TokenResponse>(json!({"user": {"id": 1}})).is_err());
    }
}
