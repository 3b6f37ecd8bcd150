//! Catalog reconciliation.
//!
//! A scan collects descriptors from the three sources in a fixed order
//! (native, remote, plugin) and writes them into the tenant's catalog in one
//! transaction. A remote failure aborts the scan before anything is written.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::adapters::{native, plugin, remote};
use crate::config::Config;
use crate::core::tool::ToolDescriptor;
use crate::db::{queries, Database};
use crate::error::ServiceError;
use crate::mcp::McpConnector;
use crate::plugins::PluginDiscovery;
use crate::tools::NativeRegistry;

/// Outcome of a bulk scan over every known tenant.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ScanSummary {
    /// Available catalog tools across the tenants that scanned successfully.
    pub total_tools: usize,
    pub successful: usize,
    /// One entry per failed tenant: `"<tenant> (timeout)"` or `"<tenant> (error: ..)"`.
    pub failed: Vec<String>,
}

impl ScanSummary {
    pub fn tenants(&self) -> usize {
        self.successful + self.failed.len()
    }
}

pub struct CatalogReconciler {
    db: Arc<Database>,
    config: Arc<Config>,
    natives: Arc<NativeRegistry>,
    plugins: Arc<dyn PluginDiscovery>,
    connector: Arc<dyn McpConnector>,
    tenant_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CatalogReconciler {
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
            tenant_locks: DashMap::new(),
        }
    }

    /// Gather descriptors from every source without touching the catalog.
    pub async fn collect(&self, tenant_id: &str) -> Result<Vec<ToolDescriptor>, ServiceError> {
        let mut tools = native::descriptors(&self.natives);

        let remote_tools =
            remote::descriptors(&self.db, self.connector.as_ref(), &self.config, tenant_id)
                .await
                .map_err(|e| {
                    ServiceError::ScanAggregateFailure(format!(
                        "failed to get all mcp tools, detail: {}",
                        e
                    ))
                })?;
        tools.extend(remote_tools);

        tools.extend(plugin::descriptors(self.plugins.as_ref()));
        Ok(tools)
    }

    /// Rescan one tenant and reconcile its catalog. Returns the number of
    /// distinct tools written.
    ///
    /// Scans of the same tenant run one at a time.
    pub async fn scan(&self, tenant_id: &str, user_id: &str) -> Result<usize, ServiceError> {
        let span = info_span!("catalog_scan", tenant_id, scan_id = %Uuid::new_v4());
        async {
            let lock = self.tenant_lock(tenant_id);
            let _guard = lock.lock().await;

            info!("Scanning tools");
            let tools = self.collect(tenant_id).await?;
            let written = queries::upsert_catalog(&self.db, tenant_id, user_id, &tools)?;
            info!(found = tools.len(), written, "Catalog updated");
            Ok::<_, ServiceError>(written)
        }
        .instrument(span)
        .await
    }

    /// Scan every registered tenant in turn, each under its own timeout.
    ///
    /// A tenant that times out or fails is recorded and the loop moves on.
    pub async fn scan_all_tenants(&self) -> Result<ScanSummary, ServiceError> {
        let tenants = queries::list_all_tenant_ids(&self.db)?;
        let mut summary = ScanSummary::default();
        if tenants.is_empty() {
            warn!("No tenants found, skipping tool scan");
            return Ok(summary);
        }

        info!(count = tenants.len(), "Scanning tools for all tenants");
        let user_id = self.config.default_user_id.as_str();
        for tenant_id in &tenants {
            let outcome =
                tokio::time::timeout(self.config.tenant_scan_timeout, self.scan(tenant_id, user_id))
                    .await;
            match outcome {
                Ok(Ok(_)) => {
                    let available = queries::count_available_tools(&self.db, tenant_id)?;
                    info!(tenant_id = %tenant_id, tools = available, "Tenant scan finished");
                    summary.total_tools += available;
                    summary.successful += 1;
                }
                Ok(Err(e)) => {
                    warn!(tenant_id = %tenant_id, "Tenant scan failed: {}", e);
                    summary.failed.push(format!("{} (error: {})", tenant_id, e));
                }
                Err(_) => {
                    warn!(
                        tenant_id = %tenant_id,
                        timeout_secs = self.config.tenant_scan_timeout.as_secs(),
                        "Tenant scan timed out"
                    );
                    summary.failed.push(format!("{} (timeout)", tenant_id));
                }
            }
        }
        Ok(summary)
    }

    fn tenant_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        self.tenant_locks
            .entry(tenant_id.to_string())
            .or_default()
            .clone()
    }
}
