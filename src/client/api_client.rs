use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use http::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use tracing::{debug, warn};

use super::request::{ApiRequest, ApiResponse};
use crate::config::ApiConfig;
use crate::error::{ApiError, SetupError};
use crate::metrics::{Metrics, MetricsRecorder};

/// Builds requests against a base URL and normalizes every failure into [`ApiError`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    retries: u32,
    default_headers: HeaderMap,
    // Installed by the session after login/refresh, cleared on logout.
    default_bearer: RwLock<Option<String>>,
    metrics: Metrics,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, metrics: Metrics) -> Result<Self, SetupError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|_| SetupError::BaseUrl(config.base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(SetupError::BaseUrl(config.base_url.clone()));
        }

        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    default_headers.insert(name, value);
                }
                _ => warn!("Ignoring invalid default header '{}'", name),
            }
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .build()?;

        Ok(ApiClient {
            http,
            base_url,
            retries: config.retries,
            default_headers,
            default_bearer: RwLock::new(None),
            metrics,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Cookies should be `Secure` when we talk to the API over TLS.
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    /// Absolute `http(s)` URLs pass through; anything else is appended to the base URL.
    pub fn resolve_url(&self, path: &str) -> Result<Url, ApiError> {
        if let Ok(url) = Url::parse(path) {
            if matches!(url.scheme(), "http" | "https") {
                return Ok(url);
            }
        }

        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| ApiError::invalid_request(format!("Invalid URL: {}", e), path))
    }

    pub fn set_default_bearer(&self, token: Option<String>) {
        let mut bearer = self
            .default_bearer
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *bearer = token;
    }

    pub fn default_bearer(&self) -> Option<String> {
        self.default_bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sends `request`, re-sending up to the retry count on any failure.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.resolve_url(&request.path)?;
        let retries = request.retries.unwrap_or(self.retries);

        let mut attempt = 0;
        loop {
            match self.send_once(request, &url).await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < retries => {
                    attempt += 1;
                    debug!(
                        "{} {} failed ({}); retry {}/{}",
                        request.method, url, err.message, attempt, retries
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(&self, request: &ApiRequest, url: &Url) -> Result<ApiResponse, ApiError> {
        let mut headers = self.default_headers.clone();
        headers.extend(request.headers.clone());

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(headers);

        let bearer = if request.anonymous {
            None
        } else {
            request.bearer.clone().or_else(|| self.default_bearer())
        };
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let result = builder.send().await;
        let elapsed = started.elapsed().as_secs_f64();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.metrics
                    .record_request(request.method.as_str(), 0, elapsed);
                debug!("{} {} did not complete: {}", request.method, url, e);
                return Err(if e.is_timeout() {
                    ApiError::timeout("The request timed out", url.as_str())
                } else {
                    ApiError::transport(url.as_str())
                });
            }
        };

        let status = response.status();
        self.metrics
            .record_request(request.method.as_str(), status.as_u16(), elapsed);
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|_| ApiError::transport(url.as_str()))?
            .to_vec();

        if status.is_success() {
            Ok(ApiResponse {
                status,
                headers,
                url: url.to_string(),
                body,
            })
        } else {
            debug!("{} {} answered {}", request.method, url, status);
            Err(ApiError::from_response(status, url.as_str(), &body))
        }
    }
}
