use tracing::info;

/// Receives the login entry point when the session ends.
///
/// Applications hook their router in here; the library itself never
/// decides how navigation happens.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

/// Default navigator: records the redirect in the log and does nothing else.
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, target: &str) {
        info!("Session ended; redirecting to '{}'", target);
    }
}
