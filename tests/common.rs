#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Value};

use sessiontron::config::{ApiConfig, ConfigV1, SessionConfig};
use sessiontron::session::Navigator;
use sessiontron::startup::build_session_with_navigator;
use sessiontron::state::SessionContext;

pub const NAMESPACE: &str = "portal";
pub const LOGIN_PATH: &str = "/auth/login";
pub const PROFILE_PATH: &str = "/auth/me";
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Signs `claims` as an HS256 token.
pub fn mint(claims: &Value) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .expect("failed to sign test token")
}

/// A token for `id` that expires `secs` from now.
pub fn token(id: &str, secs: i64) -> String {
    mint(&json!({
        "sub": "user-1",
        "jti": id,
        "exp": Utc::now().timestamp() + secs,
    }))
}

/// Remembers every navigation target instead of going anywhere.
#[derive(Default)]
pub struct RecordingNavigator {
    targets: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        self.targets.lock().unwrap().push(target.to_string());
    }
}

pub fn test_config(base_url: &str) -> ConfigV1 {
    let mut session = SessionConfig::new(NAMESPACE, LOGIN_PATH, PROFILE_PATH, REFRESH_PATH);
    session.public_paths.push("/public/".to_string());
    ConfigV1::new(ApiConfig::new(base_url), session)
}

pub async fn build(config: ConfigV1) -> (SessionContext, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::default());
    let context = build_session_with_navigator(Arc::new(config), navigator.clone())
        .await
        .expect("session should build");
    (context, navigator)
}

pub async fn build_for(server: &ServerGuard) -> (SessionContext, Arc<RecordingNavigator>) {
    build(test_config(&server.url())).await
}

/// Mocks a login that hands out `access`/`refresh` and embeds the user.
pub async fn mock_login(server: &mut ServerGuard, access: &str, refresh: Option<&str>) -> Mock {
    let mut body = json!({
        "access_token": access,
        "user": {"id": "1", "displayName": "Ann"},
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    server
        .mock("POST", LOGIN_PATH)
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

/// Like [`mock_login`], but only answers logins by `username`.
pub async fn mock_login_as(
    server: &mut ServerGuard,
    username: &str,
    access: &str,
    refresh: &str,
) -> Mock {
    let body = json!({
        "access_token": access,
        "refresh_token": refresh,
        "user": {"id": username, "displayName": username},
    });
    server
        .mock("POST", LOGIN_PATH)
        .match_body(Matcher::PartialJson(json!({ "username": username })))
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await
}

pub async fn login_as(context: &SessionContext, username: &str) {
    context
        .session
        .login(&json!({"username": username, "password": "secret"}))
        .await
        .expect("login should succeed");
}

pub async fn login(context: &SessionContext) {
    context
        .session
        .login(&json!({"username": "ann", "password": "secret"}))
        .await
        .expect("login should succeed");
}
