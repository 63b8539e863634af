use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// A replayable description of an outbound call.
///
/// Requests are plain data so the interceptor can re-send them with a new
/// credential after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute URL, or a path resolved against the client's base URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    /// Explicit bearer credential; wins over the client's default.
    pub bearer: Option<String>,
    /// Send with no credential at all, not even the client's default.
    pub anonymous: bool,
    /// Overrides the client's retry count.
    pub retries: Option<u32>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            bearer: None,
            anonymous: false,
            retries: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serializes `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| {
            ApiError::invalid_request(format!("Failed to serialize body: {}", e), &self.path)
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a header; invalid names or values are rejected at build time.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ApiError::invalid_request(format!("Invalid header name '{}'", name), &self.path)
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            ApiError::invalid_request(format!("Invalid value for header '{}'", name), &self.path)
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self.anonymous = false;
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.bearer = None;
        self.anonymous = true;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: http::StatusCode,
    pub headers: HeaderMap,
    pub url: String,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Deserializes the body. An empty body is read as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice(body).map_err(|e| {
            ApiError::decode(format!("Unexpected response body: {}", e), &self.url)
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_sets_fields() {
        let request = ApiRequest::post("/items")
            .json(&json!({"name": "x"}))
            .unwrap()
            .query("page", "2")
            .header("X-Trace", "abc")
            .unwrap()
            .with_retries(3);

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Some(json!({"name": "x"})));
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(request.headers["x-trace"], "abc");
        assert_eq!(request.retries, Some(3));
    }

    #[test]
    fn test_bearer_and_anonymous_are_exclusive() {
        let request = ApiRequest::get("/a").with_bearer("t").anonymous();
        assert!(request.anonymous);
        assert_eq!(request.bearer, None);

        let request = ApiRequest::get("/a").anonymous().with_bearer("t");
        assert!(!request.anonymous);
        assert_eq!(request.bearer.as_deref(), Some("t"));
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        assert!(ApiRequest::get("/a").header("bad header", "v").is_err());
        assert!(ApiRequest::get("/a").header("x-ok", "line\nbreak").is_err());
    }

    #[test]
    fn test_empty_body_reads_as_null() {
        let response = ApiResponse {
            status: http::StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            url: "http://x/".to_string(),
            body: Vec::new(),
        };
        let value: Option<Value> = response.json().unwrap();
        assert_eq!(value, None);
        assert!(response.json::<Vec<u8>>().is_err());
    }
}
