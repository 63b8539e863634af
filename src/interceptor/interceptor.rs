use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::refresh::{claim, settle, Claim, Cycle, RefreshSlots, RefreshStatus, Slot};
use crate::client::{ApiRequest, ApiResponse};
use crate::error::ApiError;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::session::{LogoutOptions, SessionCoordinator};

/// Slack given to waiters on top of the refresh timeout, so the refresh task
/// reports its own timeout before the waiters give up.
const WAIT_GRACE: Duration = Duration::from_millis(500);

/// Attaches credentials to outbound requests and recovers from expired tokens.
///
/// A 401 on an authenticated request triggers at most one refresh per
/// namespace; every request that hits a 401 meanwhile waits for that refresh
/// and is replayed once with the new token.
pub struct RequestInterceptor {
    session: Arc<SessionCoordinator>,
    public_paths: Vec<String>,
    refresh_timeout: Duration,
    slots: RefreshSlots,
    metrics: Metrics,
}

impl RequestInterceptor {
    pub fn new(session: Arc<SessionCoordinator>, metrics: Metrics) -> Self {
        let config = session.config();
        let public_paths = config
            .public_paths
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect();
        let refresh_timeout = config.refresh_timeout();
        RequestInterceptor {
            session,
            public_paths,
            refresh_timeout,
            slots: RefreshSlots::default(),
            metrics,
        }
    }

    pub fn session(&self) -> &Arc<SessionCoordinator> {
        &self.session
    }

    /// True if `url` contains any allow-listed substring.
    pub fn is_public(&self, url: &str) -> bool {
        self.public_paths.iter().any(|p| url.contains(p.as_str()))
    }

    /// Refresh progress for `namespace` in the current session.
    pub fn refresh_status(&self, namespace: &str) -> RefreshStatus {
        self.slots.status(namespace, self.session.epoch())
    }

    /// Sends `request` and deserializes the JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.json()
    }

    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let client = self.session.client();
        let url = client.resolve_url(&request.path)?;
        if self.is_public(url.as_str()) {
            debug!("{} {} is public; sending without credentials", request.method, url);
            self.metrics.record_intercepted("public");
            return client.execute(&request.anonymous()).await;
        }

        let (namespace, epoch) = self.session.scope();
        let attached = self.session.token_store().get_access_token(&namespace).await;
        let outbound = match &attached {
            Some(token) => request.clone().with_bearer(token),
            None => request.clone().anonymous(),
        };

        match (client.execute(&outbound).await, attached) {
            (Err(err), Some(rejected)) if err.is_unauthorized() => {
                debug!("{} {} was rejected with 401; recovering", request.method, url);
                self.recover(request, &namespace, epoch, &rejected).await
            }
            (result, _) => {
                self.metrics.record_intercepted("passed");
                result
            }
        }
    }

    /// Obtains a fresh token and replays `request` with it, once.
    async fn recover(
        &self,
        request: ApiRequest,
        namespace: &str,
        epoch: u64,
        rejected: &str,
    ) -> Result<ApiResponse, ApiError> {
        let token = match self.fresh_token(namespace, epoch, rejected).await {
            Ok(token) => token,
            Err(err) => {
                self.metrics.record_intercepted("failed");
                return Err(err);
            }
        };

        let result = self
            .session
            .client()
            .execute(&request.with_bearer(token))
            .await;
        self.metrics.record_intercepted(if result.is_ok() {
            "recovered"
        } else {
            "failed"
        });
        result
    }

    /// A token to replay with, for the session that was active at `epoch`.
    ///
    /// A request whose session ended while it was out is never recovered.
    async fn fresh_token(
        &self,
        namespace: &str,
        epoch: u64,
        rejected: &str,
    ) -> Result<String, ApiError> {
        if self.session.epoch() != epoch {
            debug!("Session for '{}' ended while the request was out", namespace);
            return Err(ApiError::session_ended());
        }
        if let Some(current) = self.session.token_store().get_access_token(namespace).await {
            if current != rejected {
                debug!("A newer token for '{}' is already stored; replaying", namespace);
                return Ok(current);
            }
        }

        let slot = self.slots.slot(namespace);
        let mut rx = slot.subscribe();
        match claim(&slot, epoch, rejected) {
            Claim::Ready(token) => return Ok(token),
            Claim::Ended => return Err(ApiError::session_ended()),
            Claim::Lead => self.spawn_refresh(namespace, epoch, slot),
            Claim::Follow => {
                debug!("Refresh for '{}' already in flight; waiting", namespace);
                self.metrics.record_queued();
            }
        }
        self.await_refresh(&mut rx, epoch).await
    }

    /// Runs the refresh on its own task so an abandoned caller cannot leave
    /// the slot stuck in flight.
    fn spawn_refresh(&self, namespace: &str, epoch: u64, slot: Slot) {
        info!(
            event_name = "interceptor.refresh.started",
            event_domain = "interceptor",
            "Access token for '{}' rejected; refreshing",
            namespace
        );
        let session = self.session.clone();
        let namespace = namespace.to_string();
        let limit = self.refresh_timeout;
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let status = match timeout(limit, session.refresh_scoped(&namespace, epoch)).await {
                Ok(Ok(token)) => RefreshStatus::Refreshed(token),
                Ok(Err(err)) => RefreshStatus::Failed(err),
                Err(_) => {
                    warn!(
                        event_name = "interceptor.refresh.timeout",
                        event_domain = "interceptor",
                        "Token refresh for '{}' timed out after {:?}; logging out",
                        namespace,
                        limit
                    );
                    metrics.record_refresh("timeout");
                    session
                        .logout_if_current(epoch, LogoutOptions::default())
                        .await;
                    RefreshStatus::Failed(ApiError::timeout(
                        "Token refresh timed out",
                        &session.config().refresh_path,
                    ))
                }
            };
            if !settle(&slot, epoch, status) {
                debug!("Refresh outcome for '{}' arrived after a newer session began", namespace);
            }
        });
    }

    async fn await_refresh(
        &self,
        rx: &mut watch::Receiver<Cycle>,
        epoch: u64,
    ) -> Result<String, ApiError> {
        let limit = self.refresh_timeout + WAIT_GRACE;
        let waited = timeout(
            limit,
            rx.wait_for(|c| c.epoch != epoch || !matches!(c.status, RefreshStatus::InFlight)),
        )
        .await;

        match waited {
            Ok(Ok(cycle)) if cycle.epoch == epoch => match &cycle.status {
                RefreshStatus::Refreshed(token) => Ok(token.clone()),
                RefreshStatus::Failed(err) => Err(err.clone()),
                _ => Err(ApiError::session_ended()),
            },
            Ok(_) => Err(ApiError::session_ended()),
            Err(_) => Err(ApiError::timeout(
                "Timed out waiting for token refresh",
                &self.session.config().refresh_path,
            )),
        }
    }
}
