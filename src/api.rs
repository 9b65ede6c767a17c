//! Order backend client.
//!
//! [`OrderBackend`] is the seam the refresh coordinator talks to;
//! [`HttpBackend`] implements it over `reqwest` against the three endpoints
//! the dashboard uses:
//!
//! - `GET {base}/orders` (in progress)
//! - `GET {base}/orders/concluded`
//! - `POST {base}/orders/{id}/invoice`

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::ApiError;

/// Default timeout for API requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which collection a fetch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    InProgress,
    Concluded,
}

impl Collection {
    pub fn path(self) -> &'static str {
        match self {
            Collection::InProgress => "/orders",
            Collection::Concluded => "/orders/concluded",
        }
    }
}

#[async_trait]
pub trait OrderBackend: Send + Sync {
    /// Fetch one collection's response body (`{ "orders": [...] }`).
    async fn fetch_orders(&self, collection: Collection) -> Result<Value, ApiError>;

    /// Ask the backend to move an order to invoicing.
    async fn invoice(&self, order_id: &str) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> ApiError {
    let message = if err.is_connect() {
        format!("Cannot reach order backend at {url}")
    } else if err.is_timeout() {
        format!("Connection to {url} timed out")
    } else if err.is_builder() {
        format!("Invalid order backend URL: {url}")
    } else {
        format!("Network error communicating with {url}: {err}")
    };
    ApiError::Transport(message)
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        404 => "Order not found".to_string(),
        422 => "Order backend rejected the request".to_string(),
        s if s >= 500 => "Order backend server error".to_string(),
        _ => "Unexpected response from order backend".to_string(),
    }
}

/// Prefer the backend's own `detail`/`message` when the error body has one.
fn status_failure(status: StatusCode, body_text: &str) -> ApiError {
    let message = serde_json::from_str::<Value>(body_text)
        .ok()
        .and_then(|json| {
            json.get("detail")
                .or_else(|| json.get("message"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| status_error(status));
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Percent-encode a path segment (RFC 3986 unreserved characters pass).
pub(crate) fn percent_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for b in input.bytes() {
        let is_unreserved =
            b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.' || b == b'~';
        if is_unreserved {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{b:02X}"));
        }
    }
    encoded
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// `base_url` must already be normalized (see `config::normalize_api_url`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Use a pre-built client (custom TLS roots, proxies, ...).
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl OrderBackend for HttpBackend {
    async fn fetch_orders(&self, collection: Collection) -> Result<Value, ApiError> {
        let url = self.url(collection.path());
        let start = Instant::now();

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();
        let body_text = resp
            .text()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;

        if !status.is_success() {
            return Err(status_failure(status, &body_text));
        }

        let body = serde_json::from_str::<Value>(&body_text)
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        debug!(
            path = collection.path(),
            latency_ms = start.elapsed().as_millis() as u64,
            "fetched order collection"
        );
        Ok(body)
    }

    async fn invoice(&self, order_id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/orders/{}/invoice", percent_encode(order_id)));

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();

        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_failure(status, &body_text));
        }

        info!(order_id, "order sent to invoicing");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{local_client, spawn_stub, StubRoutes};
    use super::*;

    async fn backend_for(routes: &StubRoutes) -> HttpBackend {
        let addr = spawn_stub(routes.clone()).await;
        HttpBackend::with_client(local_client(), format!("http://{addr}"))
    }

    #[test]
    fn percent_encode_escapes_reserved_bytes() {
        assert_eq!(percent_encode("abc-123_~."), "abc-123_~.");
        assert_eq!(percent_encode("a/b c"), "a%2Fb%20c");
        assert_eq!(percent_encode("ç"), "%C3%A7");
    }

    #[test]
    fn status_failure_prefers_backend_detail() {
        let err = status_failure(StatusCode::NOT_FOUND, r#"{"detail":"Pedido não encontrado"}"#);
        assert_eq!(
            err,
            ApiError::Status {
                status: 404,
                message: "Pedido não encontrado".into()
            }
        );
        let err = status_failure(StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(err.to_string(), "Order backend server error (HTTP 502)");
    }

    #[tokio::test]
    async fn fetch_orders_returns_decoded_body() {
        let routes = StubRoutes::default();
        routes.set("GET /orders", 200, r#"{"orders":[{"id":"1"}]}"#);
        routes.set("GET /orders/concluded", 200, r#"{"orders":[]}"#);
        let backend = backend_for(&routes).await;

        let body = backend.fetch_orders(Collection::InProgress).await.unwrap();
        assert_eq!(body["orders"][0]["id"], "1");
        let body = backend.fetch_orders(Collection::Concluded).await.unwrap();
        assert_eq!(body["orders"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn fetch_orders_maps_non_2xx_to_status_error() {
        let routes = StubRoutes::default();
        routes.set("GET /orders", 500, r#"{"detail":"db down"}"#);
        let backend = backend_for(&routes).await;

        let err = backend
            .fetch_orders(Collection::InProgress)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.to_string(), "db down (HTTP 500)");
    }

    #[tokio::test]
    async fn fetch_orders_maps_bad_json_to_decode_error() {
        let routes = StubRoutes::default();
        routes.set("GET /orders", 200, "not json");
        let backend = backend_for(&routes).await;

        let err = backend
            .fetch_orders(Collection::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend = HttpBackend::with_client(local_client(), format!("http://{addr}"));

        let err = backend
            .fetch_orders(Collection::Concluded)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn invoice_posts_to_encoded_order_path() {
        let routes = StubRoutes::default();
        routes.set("POST /orders/a%20b/invoice", 200, r#"{"message":"ok"}"#);
        let backend = backend_for(&routes).await;

        backend.invoice("a b").await.expect("invoice succeeds");
        assert_eq!(routes.seen(), vec!["POST /orders/a%20b/invoice".to_string()]);
    }

    #[tokio::test]
    async fn invoice_unknown_order_fails() {
        let routes = StubRoutes::default();
        let backend = backend_for(&routes).await;

        let err = backend.invoice("missing").await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }
}
