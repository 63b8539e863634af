//! Library exports for sessiontron, shared between the binary and tests.

pub mod client;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod metrics;
pub mod models;
pub mod session;
pub mod startup;
pub mod state;
pub mod storage;
pub mod tokens;
pub mod utils;
