use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::navigator::Navigator;
use super::responses::TokenResponse;
use super::state::{LogoutOptions, SessionPhase, SessionState};
use crate::client::{ApiClient, ApiRequest};
use crate::config::SessionConfig;
use crate::error::{ApiError, ErrorKind};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::user::ProfileEnvelope;
use crate::models::UserProfile;
use crate::tokens::TokenStore;

/// How far ahead `is_token_expiring_soon` looks.
pub const EXPIRING_SOON_HORIZON: Duration = Duration::from_secs(5 * 60);

/// Owns the session: login, profile, refresh, logout and namespace switching.
///
/// State lives in a watch channel; every transition goes through this type.
/// Each logout or namespace switch starts a new epoch, and results that
/// arrive for an older epoch are discarded rather than applied.
pub struct SessionCoordinator {
    config: SessionConfig,
    client: Arc<ApiClient>,
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
    metrics: Metrics,
    namespace: RwLock<String>,
    state: watch::Sender<SessionState>,
    epoch: AtomicU64,
    // Token commits and logout take this so they never interleave.
    transition: Mutex<()>,
}

impl SessionCoordinator {
    pub fn new(
        config: SessionConfig,
        client: Arc<ApiClient>,
        tokens: TokenStore,
        navigator: Arc<dyn Navigator>,
        metrics: Metrics,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        SessionCoordinator {
            namespace: RwLock::new(config.namespace.clone()),
            config,
            client,
            tokens,
            navigator,
            metrics,
            state,
            epoch: AtomicU64::new(0),
            transition: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn namespace(&self) -> String {
        self.namespace
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.state.borrow().current_user.clone()
    }

    /// Opaque counter that changes on every logout and namespace switch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// The active namespace together with its epoch, read as one pair.
    pub fn scope(&self) -> (String, u64) {
        let namespace = self.namespace.read().unwrap_or_else(PoisonError::into_inner);
        (namespace.clone(), self.epoch())
    }

    /// Authenticates with the login endpoint and adopts the returned session.
    ///
    /// When the response carries no user, the profile endpoint is queried.
    /// On failure nothing is persisted and the session moves to `Error`.
    pub async fn login<C: Serialize + ?Sized>(
        &self,
        credentials: &C,
    ) -> Result<UserProfile, ApiError> {
        let namespace = self.namespace();
        let epoch = self.epoch();
        info!("Logging in to namespace '{}'", namespace);
        self.state.send_modify(|s| {
            s.phase = SessionPhase::Authenticating;
            s.loading = true;
            s.error = None;
        });

        match self.authenticate(&namespace, epoch, credentials).await {
            Ok(user) => {
                self.metrics.record_login("success");
                info!(
                    event_name = "session.login.success",
                    event_domain = "session",
                    "Logged in as '{}' ({})",
                    user.display_name,
                    user.id
                );
                Ok(user)
            }
            Err(err) => {
                self.metrics.record_login("failure");
                warn!("Login to namespace '{}' failed: {}", namespace, err);
                if err.kind != ErrorKind::SessionEnded {
                    self.fail(epoch, &err);
                }
                Err(err)
            }
        }
    }

    async fn authenticate<C: Serialize + ?Sized>(
        &self,
        namespace: &str,
        epoch: u64,
        credentials: &C,
    ) -> Result<UserProfile, ApiError> {
        let request = ApiRequest::post(&self.config.login_path)
            .json(credentials)?
            .anonymous();
        let response = self.request_tokens(&request).await?;
        self.commit_tokens(namespace, epoch, &response, true).await?;

        let user = match response.user {
            Some(user) => user,
            None => match self.fetch_profile(&response.access_token).await {
                Ok(user) => user,
                Err(err) => {
                    debug!("Profile lookup after login failed; discarding tokens");
                    self.discard_tokens(namespace, epoch).await;
                    return Err(err);
                }
            },
        };

        if self.adopt_user(epoch, user.clone(), Some(response.requires_password_change)) {
            Ok(user)
        } else {
            Err(ApiError::session_ended())
        }
    }

    /// Fetches the profile with the stored access token and adopts it.
    ///
    /// A 401 here means the stored token is dead, so the session is cleared.
    pub async fn load_profile(&self) -> Result<UserProfile, ApiError> {
        let namespace = self.namespace();
        let epoch = self.epoch();
        let Some(token) = self.tokens.get_access_token(&namespace).await else {
            return Err(ApiError::new(
                ErrorKind::Unauthorized,
                "Not signed in",
                &self.config.profile_path,
            ));
        };

        self.state.send_modify(|s| s.loading = true);
        match self.fetch_profile(&token).await {
            Ok(user) => {
                if self.adopt_user(epoch, user.clone(), None) {
                    Ok(user)
                } else {
                    Err(ApiError::session_ended())
                }
            }
            Err(err) if err.is_unauthorized() && self.is_current(epoch) => {
                warn!("Stored token for '{}' was rejected; clearing session", namespace);
                self.logout(LogoutOptions::silent()).await;
                Err(err)
            }
            Err(err) => {
                self.state.send_if_modified(|s| {
                    if !self.is_current(epoch) {
                        return false;
                    }
                    s.loading = false;
                    s.error = Some(err.message.clone());
                    true
                });
                Err(err)
            }
        }
    }

    /// Exchanges the stored token pair for a new one and returns the new access token.
    ///
    /// Without a complete pair there is nothing to exchange: the session is
    /// logged out and `RefreshImpossible` comes back. A failed exchange also
    /// logs out. A result that arrives after a logout is dropped.
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        let (namespace, epoch) = self.scope();
        self.refresh_scoped(&namespace, epoch).await
    }

    /// `refresh_token` on behalf of a caller that captured `scope()` earlier.
    ///
    /// Fails with `SessionEnded` without touching anything if that epoch is
    /// already over.
    pub async fn refresh_scoped(&self, namespace: &str, epoch: u64) -> Result<String, ApiError> {
        if !self.is_current(epoch) {
            debug!("Refresh for '{}' requested by an ended session; skipped", namespace);
            self.metrics.record_refresh("discarded");
            return Err(ApiError::session_ended());
        }

        let access = self.tokens.get_access_token(namespace).await;
        let refresh = self.tokens.get_refresh_token(namespace).await;
        let (Some(access), Some(refresh)) = (access, refresh) else {
            warn!(
                "Cannot refresh namespace '{}' without a stored token pair; logging out",
                namespace
            );
            self.metrics.record_refresh("impossible");
            self.logout_if_current(epoch, LogoutOptions::default()).await;
            return Err(ApiError::refresh_impossible(namespace));
        };

        self.state.send_if_modified(|s| {
            if !self.is_current(epoch) {
                return false;
            }
            s.phase = SessionPhase::RefreshingToken;
            true
        });

        let request = ApiRequest::post(&self.config.refresh_path)
            .json(&json!({ "access_token": access, "refresh_token": refresh }))?
            .anonymous();
        let response = match self.request_tokens(&request).await {
            Ok(response) => response,
            Err(err) if self.is_current(epoch) => {
                warn!(
                    event_name = "session.refresh.failure",
                    event_domain = "session",
                    "Token refresh for '{}' failed: {}; logging out",
                    namespace,
                    err
                );
                self.metrics.record_refresh("failure");
                self.logout_if_current(epoch, LogoutOptions::default()).await;
                return Err(err);
            }
            Err(err) => {
                self.metrics.record_refresh("discarded");
                return Err(err);
            }
        };

        if let Err(err) = self.commit_tokens(namespace, epoch, &response, false).await {
            info!("Refresh for '{}' resolved after the session ended; discarded", namespace);
            self.metrics.record_refresh("discarded");
            return Err(err);
        }

        self.state.send_if_modified(|s| {
            if !self.is_current(epoch) {
                return false;
            }
            s.phase = SessionPhase::Authenticated;
            s.error = None;
            if response.requires_password_change {
                s.requires_password_change = true;
            }
            true
        });
        self.metrics.record_refresh("success");
        info!("Refreshed access token for namespace '{}'", namespace);
        Ok(response.access_token)
    }

    /// Clears tokens and state for the active namespace.
    ///
    /// Anything still pending for the old session is invalidated. Navigates
    /// to the login route unless `options.redirect` is false.
    pub async fn logout(&self, options: LogoutOptions) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.end_session(options).await;
    }

    /// `logout`, but only if `epoch` is still the current one.
    ///
    /// Returns false, and leaves the newer session alone, otherwise.
    pub async fn logout_if_current(&self, epoch: u64, options: LogoutOptions) -> bool {
        if self
            .epoch
            .compare_exchange(epoch, epoch + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.end_session(options).await;
        true
    }

    async fn end_session(&self, options: LogoutOptions) {
        let namespace = self.namespace();
        {
            let _guard = self.transition.lock().await;
            self.tokens.remove_all(&namespace).await;
            self.client.set_default_bearer(None);
        }
        self.state.send_replace(SessionState::default());
        info!(
            event_name = "session.logout",
            event_domain = "session",
            "Session for namespace '{}' ended",
            namespace
        );

        if options.redirect {
            self.navigator.navigate(&self.config.login_route);
        }
    }

    /// True iff a user is loaded and the stored access token is still valid.
    pub async fn is_authenticated(&self) -> bool {
        let has_user = self.state.borrow().current_user.is_some();
        has_user && self.tokens.has_valid_token(&self.namespace()).await
    }

    /// True if there is no access token or it expires within five minutes.
    pub async fn is_token_expiring_soon(&self) -> bool {
        !self
            .tokens
            .is_valid_for(&self.namespace(), EXPIRING_SOON_HORIZON)
            .await
    }

    /// Switches to `namespace`. State is reset and, if that namespace already
    /// holds a valid token, its profile is loaded.
    pub async fn configure(&self, namespace: &str) -> Result<(), ApiError> {
        let previous = {
            let mut current = self.namespace.write().unwrap_or_else(PoisonError::into_inner);
            // Bumped under the lock so `scope()` never pairs a namespace with another's epoch.
            self.epoch.fetch_add(1, Ordering::SeqCst);
            std::mem::replace(&mut *current, namespace.to_string())
        };
        if previous != namespace {
            info!("Switching session namespace '{}' -> '{}'", previous, namespace);
        }
        {
            let _guard = self.transition.lock().await;
            let token = self.tokens.get_access_token(namespace).await;
            self.client.set_default_bearer(token);
        }
        self.state.send_replace(SessionState::default());

        if self.tokens.has_valid_token(namespace).await {
            self.load_profile().await.map(|_| ())
        } else {
            debug!("No valid token stored for namespace '{}'", namespace);
            Ok(())
        }
    }

    /// Clears the password-change flag once the user has dealt with it.
    pub fn acknowledge_password_change(&self) {
        self.state.send_if_modified(|s| {
            let changed = s.requires_password_change;
            s.requires_password_change = false;
            changed
        });
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    async fn request_tokens(&self, request: &ApiRequest) -> Result<TokenResponse, ApiError> {
        self.client.execute(request).await?.json()
    }

    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        let request = ApiRequest::get(&self.config.profile_path).with_bearer(token);
        let envelope: ProfileEnvelope = self.client.execute(&request).await?.json()?;
        Ok(envelope.into())
    }

    /// Persists a token response unless the epoch moved on.
    ///
    /// A login replaces the whole pair; a refresh keeps the old refresh token
    /// when the server did not rotate it.
    async fn commit_tokens(
        &self,
        namespace: &str,
        epoch: u64,
        response: &TokenResponse,
        replace_pair: bool,
    ) -> Result<(), ApiError> {
        let _guard = self.transition.lock().await;
        if !self.is_current(epoch) {
            return Err(ApiError::session_ended());
        }

        if replace_pair {
            self.tokens.remove_all(namespace).await;
        }
        self.tokens
            .save_access_token(&response.access_token, namespace, response.expires_in)
            .await;
        if let Some(refresh) = &response.refresh_token {
            self.tokens
                .save_refresh_token(refresh, namespace, Some(self.config.refresh_token_days))
                .await;
        }
        self.client
            .set_default_bearer(Some(response.access_token.clone()));
        Ok(())
    }

    async fn discard_tokens(&self, namespace: &str, epoch: u64) {
        let _guard = self.transition.lock().await;
        if self.is_current(epoch) {
            self.tokens.remove_all(namespace).await;
            self.client.set_default_bearer(None);
        }
    }

    /// Moves to `Authenticated` with `user`; false if the epoch moved on.
    fn adopt_user(
        &self,
        epoch: u64,
        user: UserProfile,
        requires_password_change: Option<bool>,
    ) -> bool {
        let mut adopted = false;
        self.state.send_if_modified(|s| {
            // Checked under the channel lock so a concurrent logout cannot be overwritten.
            if !self.is_current(epoch) {
                return false;
            }
            s.phase = SessionPhase::Authenticated;
            s.current_user = Some(user);
            s.loading = false;
            s.error = None;
            if let Some(flag) = requires_password_change {
                s.requires_password_change = flag;
            }
            adopted = true;
            true
        });
        adopted
    }

    fn fail(&self, epoch: u64, err: &ApiError) {
        self.state.send_if_modified(|s| {
            if !self.is_current(epoch) {
                return false;
            }
            s.phase = SessionPhase::Error;
            s.current_user = None;
            s.loading = false;
            s.error = Some(err.message.clone());
            true
        });
    }
}
