//! Session construction.
//!
//! Builds the cookie jar, token store, API client, session coordinator and
//! request interceptor from a loaded configuration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::ApiClient;
use crate::config::ConfigV1;
use crate::error::SetupError;
use crate::interceptor::RequestInterceptor;
use crate::metrics::Metrics;
use crate::session::{LogNavigator, Navigator, SessionCoordinator};
use crate::state::SessionContext;
use crate::storage::create_jar;
use crate::tokens::TokenStore;

/// Builds a session whose logout redirects are only logged.
pub async fn build_session(config: Arc<ConfigV1>) -> Result<SessionContext, SetupError> {
    build_session_with_navigator(config, Arc::new(LogNavigator)).await
}

/// Builds a session that hands logout redirects to `navigator`.
///
/// If the configured namespace already holds a valid token (a durable jar
/// from an earlier run), its profile is loaded before returning. Failing to
/// load it is logged, not fatal.
///
/// # Errors
///
/// Returns an error if the API base URL is invalid or the HTTP client
/// cannot be constructed.
pub async fn build_session_with_navigator(
    config: Arc<ConfigV1>,
    navigator: Arc<dyn Navigator>,
) -> Result<SessionContext, SetupError> {
    let metrics = Metrics::new();
    let client = Arc::new(ApiClient::new(&config.api, metrics.clone())?);

    let jar = create_jar(&config.storage).await;
    let tokens = TokenStore::new(jar, client.is_secure())
        .with_expiry_buffer(config.session.expiry_buffer())
        .with_missing_expiry(config.session.missing_expiry);

    let session = Arc::new(SessionCoordinator::new(
        config.session.clone(),
        client.clone(),
        tokens,
        navigator,
        metrics.clone(),
    ));
    let interceptor = Arc::new(RequestInterceptor::new(session.clone(), metrics.clone()));

    info!(
        "Session ready for '{}' against {}",
        config.session.namespace,
        client.base_url()
    );
    if let Err(e) = session.configure(&config.session.namespace).await {
        warn!("Could not restore the stored session: {}", e);
    }

    Ok(SessionContext {
        config,
        session,
        interceptor,
        metrics,
    })
}
