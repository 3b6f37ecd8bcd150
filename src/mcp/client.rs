//! High-level MCP client.
//!
//! Wraps a transport with typed tool operations and a per-request deadline.
//!
//! # Example
//! ```rust,ignore
//! use toolhub_lib::mcp::client::McpClient;
//! use toolhub_lib::mcp::transport::{HttpTransport, TransportConfig};
//!
//! let transport = HttpTransport::new("http://localhost:5011/mcp", TransportConfig::default())?;
//! let mut client = McpClient::new(Box::new(transport));
//! client.initialize().await?;
//! let tools = client.list_all_tools().await?;
//! let result = client.call_tool("echo", Some(serde_json::json!({"text": "hi"}))).await?;
//! client.close().await?;
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, trace};

use super::transport::{McpTransport, TransportError, DEFAULT_REQUEST_TIMEOUT};
use super::types::{
    CallToolRequest, CallToolResult, ListToolsRequest, ListToolsResult, PeerInfo,
    ServerCapabilities, Tool,
};

/// Upper bound on `tools/list` pages followed before giving up.
const MAX_LIST_PAGES: usize = 100;

/// Current state of the MCP client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    Initializing,
    Initialized,
    Failed(String),
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientState::Uninitialized => write!(f, "uninitialized"),
            ClientState::Initializing => write!(f, "initializing"),
            ClientState::Initialized => write!(f, "initialized"),
            ClientState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Errors that can occur during MCP client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Client not initialized")]
    NotInitialized,

    #[error("Client is currently initializing")]
    Initializing,

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Request '{method}' timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("Server capability not available: {0}")]
    CapabilityNotAvailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn invalid_response<E: fmt::Display>(err: E) -> Self {
        ClientError::InvalidResponse(err.to_string())
    }

    /// Whether the server could not be reached at all, as opposed to misbehaving once reached.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(TransportError::Connection(_))
                | ClientError::Transport(TransportError::Timeout(_))
                | ClientError::Transport(TransportError::Http { .. })
                | ClientError::InitializationFailed(_)
                | ClientError::Timeout { .. }
        )
    }
}

/// Handshake outcome cached for the life of a session.
#[derive(Debug, Clone)]
struct Session {
    protocol_version: String,
    server_info: PeerInfo,
    capabilities: ServerCapabilities,
}

/// Typed tool operations over one server session.
pub struct McpClient {
    transport: Box<dyn McpTransport>,
    state: ClientState,
    session: Option<Session>,
    timeout: Duration,
}

impl fmt::Debug for McpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpClient")
            .field("state", &self.state)
            .field("server", &self.server_info().map(|info| info.name.as_str()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl McpClient {
    pub fn new(transport: Box<dyn McpTransport>) -> Self {
        Self::with_timeout(transport, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(transport: Box<dyn McpTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            state: ClientState::Uninitialized,
            session: None,
            timeout,
        }
    }

    /// Run the handshake once. A failed handshake sticks: later calls report
    /// `InitializationFailed` without touching the transport again.
    pub async fn initialize(&mut self) -> Result<ServerCapabilities, ClientError> {
        match self.state {
            ClientState::Initialized => {
                return Ok(self
                    .session
                    .as_ref()
                    .map(|s| s.capabilities.clone())
                    .unwrap_or_default());
            }
            ClientState::Initializing => return Err(ClientError::Initializing),
            ClientState::Failed(ref reason) => {
                return Err(ClientError::InitializationFailed(reason.clone()))
            }
            ClientState::Uninitialized => self.state = ClientState::Initializing,
        }

        let outcome = deadline("initialize", self.timeout, self.transport.initialize()).await;
        let init = match outcome {
            Ok(init) => init,
            Err(e) => {
                self.state = ClientState::Failed(e.to_string());
                return Err(e);
            }
        };

        debug!(
            "MCP session initialized with {} ({})",
            init.server_info.name, init.protocol_version
        );
        let capabilities = init.server_capabilities.clone();
        self.session = Some(Session {
            protocol_version: init.protocol_version,
            server_info: init.server_info,
            capabilities: init.server_capabilities,
        });
        self.state = ClientState::Initialized;
        Ok(capabilities)
    }

    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.transport.close().await?;
        self.session = None;
        self.state = ClientState::Uninitialized;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state == ClientState::Initialized
    }

    /// Initialized and the transport still reports a live session.
    pub async fn is_connected(&self) -> bool {
        self.is_initialized() && self.transport.is_healthy().await
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn server_info(&self) -> Option<&PeerInfo> {
        self.session.as_ref().map(|s| &s.server_info)
    }

    pub fn protocol_version(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.protocol_version.as_str())
    }

    /// Guard for tool operations: the session must be up and must not have
    /// declined the tools capability.
    fn tools_ready(&self) -> Result<(), ClientError> {
        match (&self.state, &self.session) {
            (ClientState::Initialized, Some(session)) if session.capabilities.tools.is_none() => {
                Err(ClientError::CapabilityNotAvailable("tools".to_string()))
            }
            (ClientState::Initialized, _) => Ok(()),
            (ClientState::Uninitialized, _) => Err(ClientError::NotInitialized),
            (ClientState::Initializing, _) => Err(ClientError::Initializing),
            (ClientState::Failed(reason), _) => {
                Err(ClientError::InitializationFailed(reason.clone()))
            }
        }
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, ClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params).map_err(TransportError::serialization)?;
        trace!("MCP call: {}", method);
        let value = deadline(method, self.timeout, self.transport.request(method, params)).await?;
        serde_json::from_value(value).map_err(ClientError::invalid_response)
    }

    /// Fetch one page of the server's tool list.
    pub async fn list_tools(&self, cursor: Option<String>) -> Result<ListToolsResult, ClientError> {
        self.tools_ready()?;
        self.call("tools/list", ListToolsRequest { cursor }).await
    }

    /// Follow `nextCursor` until the server stops returning one.
    pub async fn list_all_tools(&self) -> Result<Vec<Tool>, ClientError> {
        let mut tools = Vec::new();
        let mut cursor = None;

        for _ in 0..MAX_LIST_PAGES {
            let page = self.list_tools(cursor).await?;
            tools.extend(page.tools);
            cursor = page.next_cursor.filter(|next| !next.is_empty());
            if cursor.is_none() {
                return Ok(tools);
            }
        }

        Err(ClientError::InvalidResponse(format!(
            "tools/list did not terminate after {} pages",
            MAX_LIST_PAGES
        )))
    }

    /// Invoke a tool. Non-object arguments are wrapped as `{"value": ..}`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<CallToolResult, ClientError> {
        self.tools_ready()?;
        let request = CallToolRequest {
            name: name.to_string(),
            arguments: arguments.map(into_arguments),
        };
        self.call("tools/call", request).await
    }
}

fn into_arguments(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => Map::from_iter([("value".to_string(), other)]),
    }
}

/// Bound a transport future by the client's per-request timeout.
async fn deadline<T>(
    method: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, ClientError> {
    match timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ClientError::Timeout {
            method: method.to_string(),
            timeout: limit,
        }),
    }
}
