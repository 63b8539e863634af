//! Generic HTTP calling: request building, URL resolution, retries and error normalization.

pub mod api_client;
pub mod request;

pub use api_client::ApiClient;
pub use request::{ApiRequest, ApiResponse};
