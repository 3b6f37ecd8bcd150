//! `ToolConfigService`: the single entry point that owns the store, the
//! registries and the MCP connector, and exposes catalog, configuration and
//! dispatch operations per tenant.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::catalog::{CatalogReconciler, ScanSummary};
use crate::config::Config;
use crate::core::tool::ParamDescriptor;
use crate::db::queries::{self, ToolInfoRow, ToolInstanceRow, ToolInstanceUpsert};
use crate::db::{Database, DbError};
use crate::dispatch::{DispatchRouter, ToolValidateRequest};
use crate::error::ServiceError;
use crate::mcp::transport::TransportConfig;
use crate::mcp::{McpConnector, TransportConnector};
use crate::plugins::{BuiltinPlugins, PluginDiscovery};
use crate::tools::{NativeRegistry, ToolObserver};

/// One catalog row as shown to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ToolListing {
    pub tool_id: i64,
    pub name: String,
    pub origin_name: String,
    pub description: String,
    pub source: String,
    pub is_available: bool,
    pub create_time: String,
    pub usage: Option<String>,
    pub params: Vec<ParamDescriptor>,
    pub inputs: String,
    pub category: Option<String>,
}

impl TryFrom<ToolInfoRow> for ToolListing {
    type Error = DbError;

    fn try_from(row: ToolInfoRow) -> Result<Self, Self::Error> {
        let params = row.params()?;
        Ok(Self {
            tool_id: row.tool_id,
            name: row.name,
            origin_name: row.origin_name,
            description: row.description,
            source: row.source,
            is_available: row.is_available,
            create_time: row.create_time,
            usage: row.usage,
            params,
            inputs: row.inputs,
            category: row.category,
        })
    }
}

/// Saved configuration of a tool on an agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfoSearch {
    pub params: Option<Value>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolInstanceInfoRequest {
    pub tool_id: i64,
    pub agent_id: i64,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub enabled: bool,
}

pub struct ToolConfigService {
    db: Arc<Database>,
    config: Arc<Config>,
    reconciler: CatalogReconciler,
    router: DispatchRouter,
}

impl ToolConfigService {
    /// Service over the built-in tools and plugins, reaching remote servers
    /// over the network.
    pub fn new(db: Arc<Database>, config: Config) -> Self {
        let transport =
            TransportConfig::with_timeout(config.mcp_timeout).with_retry_count(config.mcp_retry_count);
        let natives = NativeRegistry::builtin(&config.workspace_root);
        Self::with_parts(
            db,
            config,
            Arc::new(natives),
            Arc::new(BuiltinPlugins::default()),
            Arc::new(TransportConnector::new(transport)),
        )
    }

    pub fn with_parts(
        db: Arc<Database>,
        config: Config,
        natives: Arc<NativeRegistry>,
        plugins: Arc<dyn PluginDiscovery>,
        connector: Arc<dyn McpConnector>,
    ) -> Self {
        let config = Arc::new(config);
        let reconciler = CatalogReconciler::new(
            db.clone(),
            config.clone(),
            natives.clone(),
            plugins.clone(),
            connector.clone(),
        );
        let router = DispatchRouter::new(db.clone(), config.clone(), natives, plugins, connector);
        Self {
            db,
            config,
            reconciler,
            router,
        }
    }

    /// Progress observer handed to native tools run through `validate_tool`.
    pub fn with_observer(mut self, observer: Arc<dyn ToolObserver>) -> Self {
        self.router = self.router.with_observer(observer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn register_tenant(&self, tenant_id: &str) -> Result<(), ServiceError> {
        queries::insert_tenant(&self.db, tenant_id)?;
        Ok(())
    }

    pub fn register_mcp_server(
        &self,
        tenant_id: &str,
        user_id: &str,
        name: &str,
        url: &str,
    ) -> Result<(), ServiceError> {
        queries::upsert_mcp_record(&self.db, tenant_id, user_id, name, url, true)?;
        info!(tenant_id, server = name, url, "Registered MCP server");
        Ok(())
    }

    pub fn set_mcp_server_status(
        &self,
        tenant_id: &str,
        name: &str,
        connected: bool,
    ) -> Result<(), ServiceError> {
        queries::update_mcp_record_status(&self.db, tenant_id, name, connected).map_err(
            |e| match e {
                DbError::NotFound(what) => ServiceError::NotFound(what),
                other => other.into(),
            },
        )
    }

    /// Rescan the tenant's tools, recording `user_id` as the author of new rows.
    pub async fn update_tool_list(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<usize, ServiceError> {
        self.reconciler.scan(tenant_id, user_id).await
    }

    pub async fn scan_all_tenants(&self) -> Result<ScanSummary, ServiceError> {
        self.reconciler.scan_all_tenants().await
    }

    /// Every catalog row of the tenant, unavailable ones included.
    pub fn list_all_tools(&self, tenant_id: &str) -> Result<Vec<ToolListing>, ServiceError> {
        let listings = queries::query_all_tools(&self.db, tenant_id)?
            .into_iter()
            .map(ToolListing::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(listings)
    }

    pub fn search_tool_info(
        &self,
        agent_id: i64,
        tool_id: i64,
        tenant_id: &str,
    ) -> Result<ToolInfoSearch, ServiceError> {
        match queries::query_tool_instance(&self.db, agent_id, tool_id, tenant_id)? {
            Some(instance) => Ok(ToolInfoSearch {
                params: Some(instance.params()?),
                enabled: instance.enabled,
            }),
            None => Ok(ToolInfoSearch {
                params: None,
                enabled: false,
            }),
        }
    }

    /// Save an agent's configuration of a catalog tool.
    pub fn update_tool_info(
        &self,
        request: &ToolInstanceInfoRequest,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<ToolInstanceRow, ServiceError> {
        if queries::get_tool_info(&self.db, request.tool_id, tenant_id)?.is_none() {
            return Err(ServiceError::NotFound(format!(
                "tool {} for tenant '{}'",
                request.tool_id, tenant_id
            )));
        }

        let instance = ToolInstanceUpsert {
            tool_id: request.tool_id,
            agent_id: request.agent_id,
            params: request.params.clone(),
            enabled: request.enabled,
        };
        Ok(queries::upsert_tool_instance(
            &self.db, &instance, tenant_id, user_id,
        )?)
    }

    /// Params of the user's most recently saved instance of a tool.
    pub fn load_last_tool_config(
        &self,
        tool_id: i64,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Value, ServiceError> {
        let instance = queries::query_last_tool_instance(&self.db, tool_id, tenant_id, user_id)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("tool configuration for tool {}", tool_id))
            })?;
        Ok(instance.params()?)
    }

    pub async fn validate_tool(
        &self,
        request: &ToolValidateRequest,
        tenant_id: &str,
    ) -> Result<Value, ServiceError> {
        self.router.validate(request, tenant_id).await
    }
}
