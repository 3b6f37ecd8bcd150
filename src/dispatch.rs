//! Ad hoc tool invocation.
//!
//! `validate` resolves a tool from the caller's `name` + `source` (+ `usage`
//! for remote tools) and runs it once. It does not consult the catalog, so a
//! tool can be tried before any scan has seen it.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::core::tool::ToolSource;
use crate::db::{queries, Database};
use crate::error::ServiceError;
use crate::mcp::McpConnector;
use crate::plugins::{plugin_name, PluginDiscovery};
use crate::tools::{NativeRegistry, NullObserver, ToolObserver};

/// A request to run one tool with caller-supplied arguments.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolValidateRequest {
    pub name: String,
    /// Kept as text so unknown values surface as `UnsupportedSource`.
    pub source: String,
    /// Server name for remote tools.
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub inputs: Option<Value>,
    /// Constructor values for native tools.
    #[serde(default)]
    pub params: Option<Value>,
}

pub struct DispatchRouter {
    db: Arc<Database>,
    config: Arc<Config>,
    natives: Arc<NativeRegistry>,
    plugins: Arc<dyn PluginDiscovery>,
    connector: Arc<dyn McpConnector>,
    observer: Option<Arc<dyn ToolObserver>>,
}

impl DispatchRouter {
    pub fn new(
        db: Arc<Database>,
        config: Arc<Config>,
        natives: Arc<NativeRegistry>,
        plugins: Arc<dyn PluginDiscovery>,
        connector: Arc<dyn McpConnector>,
    ) -> Self {
        Self {
            db,
            config,
            natives,
            plugins,
            connector,
            observer: None,
        }
    }

    /// Observer handed to native tools that take one. Without it they get a `NullObserver`.
    pub fn with_observer(mut self, observer: Arc<dyn ToolObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run a tool once and return its result.
    ///
    /// Remote and native tools yield a string; plugins yield whatever value
    /// they return.
    pub async fn validate(
        &self,
        request: &ToolValidateRequest,
        tenant_id: &str,
    ) -> Result<Value, ServiceError> {
        let result = match request.source.parse::<ToolSource>() {
            Ok(ToolSource::Mcp) => self.validate_remote(request, tenant_id).await,
            Ok(ToolSource::Local) => self.validate_native(request).await,
            Ok(ToolSource::Langchain) => self.validate_plugin(request),
            Err(_) => Err(ServiceError::UnsupportedSource(request.source.clone())),
        };

        match &result {
            Ok(_) => info!(tool = %request.name, source = %request.source, "Tool validated"),
            Err(e) => error!(
                tool = %request.name,
                source = %request.source,
                tenant_id,
                "Tool validation failed: {}",
                e
            ),
        }
        result
    }

    async fn validate_remote(
        &self,
        request: &ToolValidateRequest,
        tenant_id: &str,
    ) -> Result<Value, ServiceError> {
        let usage = request.usage.as_deref().unwrap_or_default();
        let url = if usage == self.config.default_mcp_name {
            self.config.default_mcp_endpoint()
        } else {
            queries::get_mcp_server_by_name_and_tenant(&self.db, usage, tenant_id)?.ok_or_else(
                || {
                    ServiceError::NotFound(format!(
                        "MCP server '{}' for tenant '{}'",
                        usage, tenant_id
                    ))
                },
            )?
        };

        let mut client = self.connector.connect(&url).await.map_err(|e| {
            if e.is_connection_failure() {
                ServiceError::McpConnectionFailed(format!("{}: {}", url, e))
            } else {
                ServiceError::ExecutionFailed(e.to_string())
            }
        })?;

        let outcome = if client.is_connected().await {
            client
                .call_tool(&request.name, request.inputs.clone())
                .await
                .map_err(|e| ServiceError::ExecutionFailed(e.to_string()))
        } else {
            Err(ServiceError::McpConnectionFailed(format!(
                "{}: session is not connected",
                url
            )))
        };
        if let Err(e) = client.close().await {
            debug!(url = %url, "Error closing MCP session: {}", e);
        }

        let result = outcome?;
        let text = result.first_text().map(str::to_string);
        if result.is_error == Some(true) {
            return Err(ServiceError::ExecutionFailed(
                text.unwrap_or_else(|| format!("remote tool '{}' reported an error", request.name)),
            ));
        }
        text.map(Value::String).ok_or_else(|| {
            ServiceError::ExecutionFailed(format!(
                "remote tool '{}' returned no text content",
                request.name
            ))
        })
    }

    async fn validate_native(&self, request: &ToolValidateRequest) -> Result<Value, ServiceError> {
        let class = self
            .natives
            .find(&request.name)
            .ok_or_else(|| ServiceError::NotFound(format!("local tool '{}'", request.name)))?;

        let params = object_arg(request.params.as_ref(), "params")?;
        let inputs = object_arg(request.inputs.as_ref(), "inputs")?;

        let observer = class.accepts_observer().then(|| {
            self.observer
                .clone()
                .unwrap_or_else(|| Arc::new(NullObserver) as Arc<dyn ToolObserver>)
        });
        let tool = class
            .instantiate(&params, observer)
            .map_err(|e| ServiceError::ExecutionFailed(e.to_string()))?;

        let output = tokio::task::spawn_blocking(move || tool.forward(&inputs))
            .await
            .map_err(|e| ServiceError::ExecutionFailed(e.to_string()))?
            .map_err(|e| ServiceError::ExecutionFailed(e.to_string()))?;
        Ok(Value::String(output))
    }

    fn validate_plugin(&self, request: &ToolValidateRequest) -> Result<Value, ServiceError> {
        let found = self
            .plugins
            .discover()
            .into_iter()
            .find(|discovered| plugin_name(discovered.plugin.as_ref()) == request.name)
            .ok_or_else(|| ServiceError::NotFound(format!("langchain tool '{}'", request.name)))?;

        let inputs = object_arg(request.inputs.as_ref(), "inputs")?;
        found
            .plugin
            .invoke(&inputs)
            .map_err(|e| ServiceError::ExecutionFailed(e.to_string()))
    }
}

/// Keyword arguments from an optional JSON object; absent or null means none.
fn object_arg(value: Option<&Value>, what: &str) -> Result<Map<String, Value>, ServiceError> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(ServiceError::ExecutionFailed(format!(
            "{} must be a JSON object, got {}",
            what, other
        ))),
    }
}
