//! Token persistence: claim decoding, cookie layout and the namespace-scoped store.

pub mod claims;
pub mod cookie;
pub mod store;

pub use claims::{decode, Claims};
pub use store::{TokenStore, DEFAULT_EXPIRY_BUFFER, DEFAULT_REFRESH_DAYS};
