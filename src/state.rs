//! Handles shared by everything built on top of a session.

use std::sync::Arc;

use crate::config::ConfigV1;
use crate::interceptor::RequestInterceptor;
use crate::metrics::Metrics;
use crate::session::SessionCoordinator;

/// Everything `startup::build_session` wires together.
///
/// Cloning is cheap; every field is shared.
#[derive(Clone)]
pub struct SessionContext {
    /// Configuration the session was built from.
    pub config: Arc<ConfigV1>,
    /// Login, logout, refresh and the observable session state.
    pub session: Arc<SessionCoordinator>,
    /// Entry point for authenticated requests.
    pub interceptor: Arc<RequestInterceptor>,
    pub metrics: Metrics,
}
