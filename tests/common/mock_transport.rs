//! Transport that talks to a `MockMcpServer` in-process.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use toolhub_lib::mcp::transport::{
    InitializationResult, McpTransport, TransportError, TransportState,
};
use toolhub_lib::mcp::types::*;

use super::mock_mcp_server::MockMcpServer;

pub struct MockTransport {
    server: Arc<MockMcpServer>,
    state: Mutex<TransportState>,
    next_id: AtomicI64,
}

impl MockTransport {
    pub fn new(server: Arc<MockMcpServer>) -> Self {
        Self {
            server,
            state: Mutex::new(TransportState::Uninitialized),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn boxed(self) -> Box<dyn McpTransport> {
        Box::new(self)
    }

    fn refused(&self) -> TransportError {
        TransportError::Connection(format!("{}: connection refused", self.server.name()))
    }

    async fn exchange(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let response = self
            .server
            .handle_request(JsonRpcRequest::call(id, method, params))
            .await;

        if let Some(error) = response.error {
            return Err(TransportError::InvalidResponse(format!(
                "MCP error response: {}",
                error.message
            )));
        }
        Ok(response.result.unwrap_or_else(|| serde_json::json!({})))
    }
}

#[async_trait]
impl McpTransport for MockTransport {
    async fn initialize(&mut self) -> Result<InitializationResult, TransportError> {
        if !self.server.is_reachable() {
            *self.state.lock().await = TransportState::Failed;
            return Err(self.refused());
        }

        *self.state.lock().await = TransportState::Initializing;
        let params = serde_json::to_value(InitializeRequest::new(
            "2024-11-05",
            PeerInfo::new("toolhub-tests", "0.0.0"),
        ))
        .map_err(TransportError::serialization)?;

        let result = match self.exchange("initialize", Some(params)).await {
            Ok(result) => result,
            Err(e) => {
                *self.state.lock().await = TransportState::Failed;
                return Err(e);
            }
        };
        let response: InitializeResponse = serde_json::from_value(result)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        let notification =
            JsonRpcRequest::notify("notifications/initialized", Some(serde_json::json!({})));
        let _ = self.server.handle_request(notification).await;

        *self.state.lock().await = TransportState::Initialized;
        Ok(InitializationResult::from(response))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        if !self.server.is_reachable() {
            return Err(self.refused());
        }
        if *self.state.lock().await != TransportState::Initialized {
            return Err(TransportError::NotInitialized);
        }
        self.exchange(method, Some(params)).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        *self.state.lock().await = TransportState::Uninitialized;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        *self.state.lock().await == TransportState::Initialized && self.server.is_healthy()
    }
}
