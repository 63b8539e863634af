// This module re-exports important pieces for convenience,
// so we can "use crate::config::*" easily.
pub mod api;
pub mod config;
pub mod logging;
pub mod session;
pub mod storage;

pub use api::*;
pub use config::*;
pub use logging::*;
pub use session::*;
pub use storage::*;
