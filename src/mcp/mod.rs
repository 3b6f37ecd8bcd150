//! MCP (Model Context Protocol) client support.
//!
//! - `transport`: streamable HTTP and legacy SSE bindings
//! - `client`: typed tool operations over a transport
//! - `schema`: `$ref` flattening of remote input schemas
//! - `McpConnector`: the seam the catalog and dispatcher open sessions through

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod client;
pub mod schema;
pub mod transport;
pub mod types;

use client::{ClientError, McpClient};
use transport::{HttpTransport, McpTransport, SseTransport, TransportConfig};

/// Wire binding used to reach a remote server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum McpTransportType {
    /// Streamable HTTP endpoint.
    #[default]
    Http,
    /// Legacy Server-Sent Events endpoint.
    Sse,
}

impl McpTransportType {
    /// Infer the binding from a server URL: a path ending in `/sse` is SSE.
    pub fn for_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.trim_end_matches('/').ends_with("/sse") {
            McpTransportType::Sse
        } else {
            McpTransportType::Http
        }
    }
}

impl fmt::Display for McpTransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McpTransportType::Http => write!(f, "http"),
            McpTransportType::Sse => write!(f, "sse"),
        }
    }
}

/// Opens initialized client sessions to remote servers.
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<McpClient, ClientError>;
}

/// Network connector choosing HTTP or SSE per URL.
#[derive(Debug, Clone, Default)]
pub struct TransportConnector {
    config: TransportConfig,
}

impl TransportConnector {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl McpConnector for TransportConnector {
    async fn connect(&self, url: &str) -> Result<McpClient, ClientError> {
        let kind = McpTransportType::for_url(url);
        debug!("Connecting to MCP server {} over {}", url, kind);

        let transport: Box<dyn McpTransport> = match kind {
            McpTransportType::Http => Box::new(HttpTransport::new(url, self.config.clone())?),
            McpTransportType::Sse => Box::new(SseTransport::new(url, self.config.clone())?),
        };

        let mut client = McpClient::with_timeout(transport, self.config.timeout);
        client.initialize().await?;
        Ok(client)
    }
}

/// Turn a server-reported tool name into a dispatch-safe identifier.
///
/// Hyphens become underscores, anything that is not a word character is
/// dropped, and a leading digit gets an underscore prefix.
pub fn sanitize_function_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c == '-' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    if sanitized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}
