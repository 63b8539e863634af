pub mod coordinator;
pub mod navigator;
mod responses;
pub mod state;

pub use coordinator::{SessionCoordinator, EXPIRING_SOON_HORIZON};
pub use navigator::{LogNavigator, Navigator};
pub use state::{LogoutOptions, SessionPhase, SessionState};
