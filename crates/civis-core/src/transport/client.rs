//! HTTP client for the municipal admin API.
//!
//! Provides a wrapper around reqwest with:
//! - A single base URL and request timeout
//! - Bearer token injection for every request without an explicit
//!   `Authorization` header
//! - Typed JSON decoding at the boundary
//! - Centralized 401 handling through [`UnauthorizedEvent`] listeners

use crate::config::{ClientConfig, NetworkConfig};
use crate::events::{EventBus, ListenerId};
use crate::transport::QueryParams;
use crate::{CivisError, Result};
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Emitted once for every response with status 401.
#[derive(Debug, Clone)]
pub struct UnauthorizedEvent {
    pub method: Method,
    pub path: String,
    /// Stored token the failing request carried, if any.
    pub token: Option<String>,
}

/// HTTP client shared by the session store, query cache and mutations.
///
/// The stored token is the only global mutable state in the client layer.
/// Only the session store writes it; the client itself clears it when the
/// server rejects it.
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    token: RwLock<Option<String>>,
    unauthorized: EventBus<UnauthorizedEvent>,
}

impl ApiClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| CivisError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
            token: RwLock::new(None),
            unauthorized: EventBus::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Replace the token attached to subsequent requests.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Register a listener for 401 responses.
    pub fn on_unauthorized<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&UnauthorizedEvent) + Send + Sync + 'static,
    {
        self.unauthorized.subscribe(listener)
    }

    pub fn remove_unauthorized_listener(&self, id: ListenerId) -> bool {
        self.unauthorized.unsubscribe(id)
    }

    /// Drop the token and every unauthorized listener.
    pub fn reset(&self) {
        self.set_token(None);
        self.unauthorized.clear();
    }

    /// GET `path` and decode the body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: &QueryParams) -> Result<T> {
        self.request(Method::GET, path, None, params).await
    }

    /// POST a JSON body to `path`.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body), &QueryParams::new()).await
    }

    /// PUT a JSON body to `path`.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(body), &QueryParams::new()).await
    }

    /// DELETE `path`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, None, &QueryParams::new()).await
    }

    /// Issue a request using the stored bearer token.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        params: &QueryParams,
    ) -> Result<T> {
        self.request_with_auth(method, path, body, params, None).await
    }

    /// Issue a request, optionally with an explicit `Authorization` value.
    ///
    /// An explicit value is sent as-is and the stored token is left out.
    pub async fn request_with_auth<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        params: &QueryParams,
        authorization: Option<&str>,
    ) -> Result<T> {
        let url = self.url_for(path);
        let mut request = self.client.request(method.clone(), &url);

        if !params.is_empty() {
            request = request.query(params.pairs());
        }

        let sent_token = match authorization {
            Some(value) => {
                request = request.header(header::AUTHORIZATION, value);
                None
            }
            None if self.is_off_base(path) => {
                debug!("Not sending the stored token to {}", url);
                None
            }
            None => {
                let token = self.token();
                if let Some(token) = &token {
                    request = request.bearer_auth(token);
                }
                token
            }
        };

        if let Some(body) = &body {
            request = request.json(body);
        }

        debug!("{} {}", method, path);
        let response = request.send().await.map_err(|e| {
            warn!("{} {} failed without a response: {}", method, path, e);
            CivisError::from(e)
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(&method, path, sent_token);
            let server_message = match response.bytes().await {
                Ok(bytes) => extract_server_message(&bytes),
                Err(e) => {
                    debug!("{} {} 401 body unreadable: {}", method, path, e);
                    None
                }
            };
            return Err(CivisError::from_status(401, server_message));
        }

        let bytes = response.bytes().await.map_err(CivisError::from)?;

        if !status.is_success() {
            let server_message = extract_server_message(&bytes);
            debug!("{} {} returned {}: {:?}", method, path, status, server_message);
            return Err(CivisError::from_status(status.as_u16(), server_message));
        }

        decode_body(path, &bytes)
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Absolute URL pointing somewhere other than the configured API.
    fn is_off_base(&self, path: &str) -> bool {
        let absolute = path.starts_with("http://") || path.starts_with("https://");
        absolute && path != self.base_url && !path.starts_with(&format!("{}/", self.base_url))
    }

    pub(crate) fn handle_unauthorized(&self, method: &Method, path: &str, sent_token: Option<String>) {
        // Clear before notifying so listeners never observe the stale token.
        if sent_token.is_some() {
            let mut stored = self.token.write().unwrap_or_else(PoisonError::into_inner);
            if *stored == sent_token {
                *stored = None;
            }
        }

        warn!("{} {} rejected with 401", method, path);
        self.unauthorized.emit(&UnauthorizedEvent {
            method: method.clone(),
            path: path.to_string(),
            token: sent_token,
        });
    }
}

/// Decode a success body. An empty body decodes as JSON `null`.
fn decode_body<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T> {
    let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        bytes
    };
    serde_json::from_slice(bytes).map_err(|e| CivisError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Pull `message` (or `error`) out of an error payload.
pub fn extract_server_message(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    ["message", "error"]
        .iter()
        .filter_map(|field| value.get(field).and_then(|v| v.as_str()))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Deserialize)]
    struct Pong {
        ok: bool,
    }

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&ClientConfig::new(server.base_url())).unwrap()
    }

    #[test]
    fn test_extract_server_message() {
        assert_eq!(
            extract_server_message("{\"message\":\"Cidade inválida\"}".as_bytes()).as_deref(),
            Some("Cidade inválida")
        );
        assert_eq!(
            extract_server_message(br#"{"error":"forbidden"}"#).as_deref(),
            Some("forbidden")
        );
        assert_eq!(extract_server_message(br#"{"message":"  "}"#), None);
        assert_eq!(extract_server_message(b"<html>oops</html>"), None);
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        let value: Option<Pong> = decode_body("/x", b"").unwrap();
        assert!(value.is_none());
        assert!(decode_body::<()>("/x", b"  ").is_ok());
    }

    #[tokio::test]
    async fn test_bearer_token_is_attached() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/api/ping")
                    .header("authorization", "Bearer tok123");
                then.status(200).json_body(json!({ "ok": true }));
            })
            .await;

        let client = client_for(&server);
        client.set_token(Some("tok123".into()));
        let pong: Pong = client.get("/api/ping", &QueryParams::new()).await.unwrap();

        assert!(pong.ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_explicit_authorization_is_not_overridden() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/api/ping")
                    .header("authorization", "Bearer other");
                then.status(200).json_body(json!({ "ok": true }));
            })
            .await;

        let client = client_for(&server);
        client.set_token(Some("tok123".into()));
        let pong: Pong = client
            .request_with_auth(Method::GET, "/api/ping", None, &QueryParams::new(), Some("Bearer other"))
            .await
            .unwrap();

        assert!(pong.ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_carries_status_and_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("PUT").path("/api/admin/users/u1");
                then.status(422).json_body(json!({ "message": "E-mail já utilizado" }));
            })
            .await;

        let client = client_for(&server);
        let err = client
            .put::<serde_json::Value, _>("/api/admin/users/u1", &json!({ "email": "a@b.com" }))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(422));
        assert_eq!(err.user_message(), "E-mail já utilizado");
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token_and_notifies_once_per_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/api/dashboard/overview");
                then.status(401).json_body(json!({ "message": "jwt expired" }));
            })
            .await;

        let client = client_for(&server);
        client.set_token(Some("tok123".into()));

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        client.on_unauthorized(move |event| {
            assert_eq!(event.path, "/api/dashboard/overview");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = client
            .get::<serde_json::Value>("/api/dashboard/overview", &QueryParams::new())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(client.token(), None);
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        let _ = client
            .get::<serde_json::Value>("/api/dashboard/overview", &QueryParams::new())
            .await;
        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unauthorized_keeps_newer_token() {
        let client = ApiClient::new(&ClientConfig::new("http://localhost:3333")).unwrap();
        client.set_token(Some("old".into()));
        client.handle_unauthorized(&Method::GET, "/api/admin/users", Some("stale".into()));
        assert_eq!(client.token().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_network_failure_is_distinct_kind() {
        let config = ClientConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2));
        let client = ApiClient::new(&config).unwrap();

        let err = client
            .get::<serde_json::Value>("/api/ping", &QueryParams::new())
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_unauthorized_with_truncated_body_still_tears_down() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = "HTTP/1.1 401 Unauthorized\r\n\
                            Content-Type: application/json\r\n\
                            Content-Length: 100\r\n\r\n\
                            {\"message\"";
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        let client = ApiClient::new(&ClientConfig::new(format!("http://{}", addr))).unwrap();
        client.set_token(Some("tok".into()));
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        client.on_unauthorized(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = client
            .get::<serde_json::Value>("/api/admin/users", &QueryParams::new())
            .await
            .unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(client.token(), None);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stored_token_stays_on_the_api_host() {
        let api = MockServer::start_async().await;
        let other = MockServer::start_async().await;
        let leaked = other
            .mock_async(|when, then| {
                when.method("GET").path("/files/a").header_exists("authorization");
                then.status(200).json_body(json!({ "ok": false }));
            })
            .await;
        let plain = other
            .mock_async(|when, then| {
                when.method("GET").path("/files/a");
                then.status(200).json_body(json!({ "ok": true }));
            })
            .await;

        let client = client_for(&api);
        client.set_token(Some("tok123".into()));
        let pong: Pong = client
            .get(&format!("{}/files/a", other.base_url()), &QueryParams::new())
            .await
            .unwrap();

        assert!(pong.ok);
        leaked.assert_hits_async(0).await;
        plain.assert_async().await;
    }

    #[test]
    fn test_off_base_detection() {
        let client = ApiClient::new(&ClientConfig::new("https://api.example")).unwrap();
        assert!(!client.is_off_base("/api/x"));
        assert!(!client.is_off_base("https://api.example/api/x"));
        assert!(client.is_off_base("https://api.example.evil/api/x"));
        assert!(client.is_off_base("http://other/x"));
    }

    #[test]
    fn test_url_for_joins_paths() {
        let client = ApiClient::new(&ClientConfig::new("https://api.example/")).unwrap();
        assert_eq!(client.url_for("/api/x"), "https://api.example/api/x");
        assert_eq!(client.url_for("api/x"), "https://api.example/api/x");
        assert_eq!(client.url_for("https://other/x"), "https://other/x");
    }
}
