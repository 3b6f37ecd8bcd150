//! Connector that routes URLs to in-process mock servers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use toolhub_lib::mcp::client::{ClientError, McpClient};
use toolhub_lib::mcp::transport::TransportError;
use toolhub_lib::mcp::McpConnector;

use super::mock_mcp_server::MockMcpServer;
use super::mock_transport::MockTransport;

pub struct MockConnector {
    servers: Mutex<HashMap<String, Arc<MockMcpServer>>>,
    connects: Mutex<Vec<String>>,
    timeout: Duration,
}

impl MockConnector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            servers: Mutex::new(HashMap::new()),
            connects: Mutex::new(Vec::new()),
            timeout,
        }
    }

    /// Serve `server` at `url` and hand it back for later inspection.
    pub fn mount(&self, url: &str, server: MockMcpServer) -> Arc<MockMcpServer> {
        let server = Arc::new(server);
        self.servers
            .lock()
            .unwrap()
            .insert(url.to_string(), server.clone());
        server
    }

    /// URLs of every connection attempt, in order.
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl McpConnector for MockConnector {
    async fn connect(&self, url: &str) -> Result<McpClient, ClientError> {
        self.connects.lock().unwrap().push(url.to_string());
        let server = self.servers.lock().unwrap().get(url).cloned();
        let server = server.ok_or_else(|| {
            TransportError::Connection(format!("{}: no route to host", url))
        })?;

        let mut client = McpClient::with_timeout(MockTransport::new(server).boxed(), self.timeout);
        client.initialize().await?;
        Ok(client)
    }
}
