//! MCP transports.
//!
//! - `HttpTransport`: streamable HTTP, one POST per JSON-RPC message, replies as
//!   JSON or as an SSE-framed body.
//! - `SseTransport`: the legacy SSE binding. A long-lived GET stream announces a
//!   POST endpoint, and replies to POSTed requests arrive on the stream.
//!
//! Both perform the initialize handshake themselves so callers only ever see an
//! initialized session or an error.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use super::types::{InitializeRequest, InitializeResponse, JsonRpcResponse, PeerInfo, ServerCapabilities};

mod http;
mod sse;

pub use http::HttpTransport;
pub use sse::{SseEvent, SseEventParser, SseTransport};

/// Protocol versions offered during the handshake, most preferred first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-06-18", "2024-10-07"];

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Uninitialized,
    Initializing,
    Initialized,
    Failed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportState::Uninitialized => "uninitialized",
            TransportState::Initializing => "initializing",
            TransportState::Initialized => "initialized",
            TransportState::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Transport not initialized")]
    NotInitialized,

    #[error("Transport already initialized")]
    AlreadyInitialized,

    #[error("Transport failed: {0}")]
    Failed(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Protocol negotiation failed")]
    ProtocolNegotiationFailed,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
}

impl TransportError {
    pub fn connection<E: fmt::Display>(err: E) -> Self {
        TransportError::Connection(err.to_string())
    }

    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        TransportError::Serialization(err.to_string())
    }

    /// Failures worth another attempt: the server was not reached or went quiet.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Connection(_) | TransportError::Timeout(_) | TransportError::Failed(_)
        )
    }

    fn from_reqwest(err: reqwest::Error, limit: Duration) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(limit)
        } else {
            TransportError::connection(format!("HTTP request failed: {}", err))
        }
    }
}

/// Result of a successful initialization handshake.
#[derive(Debug, Clone)]
pub struct InitializationResult {
    pub protocol_version: String,
    pub server_capabilities: ServerCapabilities,
    pub server_info: PeerInfo,
}

impl From<InitializeResponse> for InitializationResult {
    fn from(response: InitializeResponse) -> Self {
        Self {
            protocol_version: response.protocol_version,
            server_capabilities: response.capabilities,
            server_info: response.server_info,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connect and per-request timeout.
    pub timeout: Duration,
    /// Extra attempts for retryable failures.
    pub retry_count: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_count: 0,
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// A session-oriented channel to one MCP server.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Run the initialize handshake. Idempotent once it has succeeded.
    async fn initialize(&mut self) -> Result<InitializationResult, TransportError>;

    /// Send a request and wait for its `result`.
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    async fn close(&self) -> Result<(), TransportError>;

    async fn is_healthy(&self) -> bool;
}

/// Doubling delay from 100ms, capped at 10s.
fn backoff(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2_u32.saturating_pow(attempt.min(10)))
        .min(RETRY_MAX_DELAY)
}

fn client_info() -> PeerInfo {
    PeerInfo::new("toolhub", env!("CARGO_PKG_VERSION"))
}

/// Decode a reply envelope, turning an `error` member into a transport error.
fn reply_result(reply: Value) -> Result<Value, TransportError> {
    let envelope: JsonRpcResponse = serde_json::from_value(reply)
        .map_err(|e| TransportError::InvalidResponse(format!("malformed JSON-RPC reply: {}", e)))?;
    envelope
        .into_result()
        .map_err(|e| TransportError::InvalidResponse(format!("MCP error response: {}", e)))
}

/// Move `Uninitialized` to `Initializing`; anything else refuses a new handshake.
async fn begin_handshake(state: &Mutex<TransportState>) -> Result<(), TransportError> {
    let mut state = state.lock().await;
    match *state {
        TransportState::Uninitialized => {
            *state = TransportState::Initializing;
            Ok(())
        }
        TransportState::Failed => Err(TransportError::Failed(
            "Transport is in failed state".to_string(),
        )),
        TransportState::Initializing | TransportState::Initialized => {
            Err(TransportError::AlreadyInitialized)
        }
    }
}

async fn ensure_ready(state: &Mutex<TransportState>) -> Result<(), TransportError> {
    match *state.lock().await {
        TransportState::Initialized => Ok(()),
        TransportState::Failed => Err(TransportError::Failed(
            "Transport is in failed state".to_string(),
        )),
        TransportState::Uninitialized | TransportState::Initializing => {
            Err(TransportError::NotInitialized)
        }
    }
}

/// Offer each supported protocol version until the server accepts one.
/// Connection-level failures end the loop early.
async fn negotiate<F, Fut>(
    url: &str,
    mut send_initialize: F,
) -> Result<InitializationResult, TransportError>
where
    F: FnMut(Value) -> Fut,
    Fut: Future<Output = Result<Value, TransportError>>,
{
    let mut last_error = None;

    for &version in SUPPORTED_PROTOCOL_VERSIONS {
        debug!("Trying protocol version {} with {}", version, url);
        let params = serde_json::to_value(InitializeRequest::new(version, client_info()))
            .map_err(TransportError::serialization)?;

        match send_initialize(params).await {
            Ok(result) => {
                let response: InitializeResponse = serde_json::from_value(result)
                    .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
                return Ok(response.into());
            }
            Err(e @ (TransportError::Connection(_) | TransportError::Timeout(_))) => return Err(e),
            Err(e) => {
                debug!("Protocol version {} rejected: {}", version, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(TransportError::ProtocolNegotiationFailed))
}

/// Turn a non-2xx reply into `TransportError::Http`, keeping the body as the message.
async fn status_error(response: reqwest::Response) -> TransportError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    TransportError::Http { status, message }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_transport_state_display() {
        assert_eq!(TransportState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(TransportState::Initialized.to_string(), "initialized");
        assert_eq!(TransportState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(TransportError::Connection("refused".into()).is_retryable());
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!TransportError::InvalidResponse("bad".into()).is_retryable());
        assert!(!TransportError::Http {
            status: 500,
            message: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        assert_eq!(backoff(0), Duration::from_millis(100));
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(3), Duration::from_millis(800));
        assert_eq!(backoff(20), RETRY_MAX_DELAY);
    }

    #[test]
    fn test_reply_result() {
        let ok = reply_result(json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": []}})).unwrap();
        assert_eq!(ok["tools"], json!([]));

        let err = reply_result(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "nope"}
        }))
        .unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(ref m) if m.contains("nope")));

        assert!(reply_result(json!({"hello": "world"})).is_err());
    }

    #[tokio::test]
    async fn test_handshake_guards() {
        let state = Mutex::new(TransportState::Uninitialized);
        assert!(matches!(ensure_ready(&state).await, Err(TransportError::NotInitialized)));

        begin_handshake(&state).await.unwrap();
        assert!(matches!(
            begin_handshake(&state).await,
            Err(TransportError::AlreadyInitialized)
        ));

        *state.lock().await = TransportState::Failed;
        assert!(matches!(begin_handshake(&state).await, Err(TransportError::Failed(_))));
        assert!(matches!(ensure_ready(&state).await, Err(TransportError::Failed(_))));
    }

    #[tokio::test]
    async fn test_negotiate_falls_through_rejected_versions() {
        let mut offered = Vec::new();
        let init = negotiate("http://srv", |params: Value| {
            offered.push(params["protocolVersion"].as_str().unwrap_or_default().to_string());
            let accept = offered.len() == 2;
            async move {
                if accept {
                    Ok(json!({
                        "protocolVersion": "2025-06-18",
                        "serverInfo": {"name": "srv", "version": "1"}
                    }))
                } else {
                    Err(TransportError::InvalidResponse("unsupported version".into()))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(init.protocol_version, "2025-06-18");
        assert_eq!(offered, vec!["2024-11-05", "2025-06-18"]);
    }

    #[tokio::test]
    async fn test_negotiate_stops_on_connection_error() {
        let mut attempts = 0;
        let err = negotiate("http://srv", |_params: Value| {
            attempts += 1;
            async { Err(TransportError::Connection("refused".into())) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, TransportError::Connection(_)));
        assert_eq!(attempts, 1);
    }
}
