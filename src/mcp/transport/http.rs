use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use super::{
    backoff, begin_handshake, ensure_ready, negotiate, reply_result, status_error,
    InitializationResult, McpTransport, TransportConfig, TransportError, TransportState,
};
use crate::mcp::types::{JsonRpcRequest, RequestId};

const SESSION_HEADER: &str = "MCP-Session-Id";
const VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Streamable-HTTP transport for remote MCP servers.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    next_id: AtomicI64,
    state: Mutex<TransportState>,
    protocol_version: Mutex<Option<String>>,
    session_id: Mutex<Option<String>>,
    config: TransportConfig,
}

impl HttpTransport {
    pub fn new(base_url: &str, config: TransportConfig) -> Result<Self, TransportError> {
        info!("Creating HTTP transport for URL: {}", base_url);

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Failed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            next_id: AtomicI64::new(1),
            state: Mutex::new(TransportState::Uninitialized),
            protocol_version: Mutex::new(None),
            session_id: Mutex::new(None),
            config,
        })
    }

    async fn call_with_retry(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let mut attempt = 0;
        loop {
            match self.call_once(method, params.clone()).await {
                Err(e) if e.is_retryable() && attempt < self.config.retry_count => {
                    warn!(
                        "Request failed (attempt {}/{}): {}, retrying...",
                        attempt + 1,
                        self.config.retry_count + 1,
                        e
                    );
                    sleep(backoff(attempt)).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn call_once(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        trace!("Sending HTTP request: method={}, id={}", method, id);

        let message = JsonRpcRequest::call(RequestId::Number(id), method, Some(params));
        let reply = self.post_with_fallback(&message).await?;
        reply_result(reply)
    }

    /// Notifications get no reply; any body the server sends back is ignored.
    async fn notify(&self, method: &str) -> Result<(), TransportError> {
        let message = JsonRpcRequest::notify(method, Some(json!({})));
        self.post_with_fallback(&message).await.map(|_| ())
    }

    /// POST to the base URL, retrying `<base>/rpc` once if the base rejects the method.
    async fn post_with_fallback(&self, message: &JsonRpcRequest) -> Result<Value, TransportError> {
        let primary = self.base_url.as_str();
        match self.post(primary, message).await {
            Err(TransportError::Http { status, message: body })
                if status == StatusCode::NOT_FOUND.as_u16()
                    || status == StatusCode::METHOD_NOT_ALLOWED.as_u16() =>
            {
                let fallback = format!("{}/rpc", primary);
                debug!(
                    "Primary MCP HTTP endpoint '{}' returned {}, retrying '{}'",
                    primary, status, fallback
                );
                self.post(&fallback, message)
                    .await
                    .map_err(|fallback_err| TransportError::Http {
                        status,
                        message: format!(
                            "Primary endpoint '{}' failed ({}): {}. Fallback '{}' failed: {}",
                            primary, status, body, fallback, fallback_err
                        ),
                    })
            }
            outcome => outcome,
        }
    }

    async fn post(&self, url: &str, message: &JsonRpcRequest) -> Result<Value, TransportError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .json(message);
        if let Some(version) = self.protocol_version.lock().await.clone() {
            request = request.header(VERSION_HEADER, version);
        }
        if let Some(session) = self.session_id.lock().await.clone() {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.config.timeout))?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            *self.session_id.lock().await = Some(session.to_string());
        }

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::NOT_FOUND {
                // The server forgot the session.
                *self.session_id.lock().await = None;
            }
            return Err(status_error(response).await);
        }

        let expects_reply = !message.is_notification();
        if !expects_reply && status == StatusCode::ACCEPTED {
            return Ok(json!({}));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await.map_err(|e| {
            TransportError::InvalidResponse(format!("Failed to read response body: {}", e))
        })?;

        if body.trim().is_empty() {
            return if expects_reply {
                Err(TransportError::InvalidResponse(
                    "Empty response body for JSON-RPC request".to_string(),
                ))
            } else {
                Ok(json!({}))
            };
        }

        decode_body(&body).map_err(|reason| {
            let preview: String = body.chars().take(240).collect();
            TransportError::InvalidResponse(format!(
                "Failed to parse response body (content-type: '{}'): {}. Body preview: {}",
                content_type, reason, preview
            ))
        })
    }
}

/// A reply body is either plain JSON or an SSE frame whose `data:` lines
/// carry the JSON.
fn decode_body(body: &str) -> Result<Value, String> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }

    let data: Vec<&str> = body
        .lines()
        .filter_map(|line| line.trim().strip_prefix("data:"))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect();
    if data.is_empty() {
        return Err("no JSON payload or SSE data lines found".to_string());
    }

    serde_json::from_str(&data.join("\n")).map_err(|e| format!("invalid SSE data JSON: {}", e))
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn initialize(&mut self) -> Result<InitializationResult, TransportError> {
        begin_handshake(&self.state).await?;
        info!("Initializing MCP HTTP transport for: {}", self.base_url);

        let this = &*self;
        let outcome = negotiate(&this.base_url, |params| this.call_with_retry("initialize", params)).await;
        let init = match outcome {
            Ok(init) => init,
            Err(e) => {
                *self.state.lock().await = TransportState::Failed;
                return Err(e);
            }
        };

        *self.protocol_version.lock().await = Some(init.protocol_version.clone());
        if let Err(e) = self.notify("notifications/initialized").await {
            warn!("Failed to send initialized notification: {}", e);
        }

        *self.state.lock().await = TransportState::Initialized;
        info!(
            "MCP HTTP transport initialized with protocol version: {}",
            init.protocol_version
        );
        Ok(init)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        ensure_ready(&self.state).await?;
        self.call_with_retry(method, params).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        debug!("Closing HTTP transport for: {}", self.base_url);
        *self.state.lock().await = TransportState::Uninitialized;
        *self.session_id.lock().await = None;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        *self.state.lock().await == TransportState::Initialized
    }
}
