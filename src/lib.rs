//! Tool discovery, catalog reconciliation and dispatch.
//!
//! # Architecture
//!
//! - `adapters`: turn native classes, plugins and remote MCP tools into `ToolDescriptor`s
//! - `catalog`: per-tenant scans that reconcile the persisted catalog
//! - `dispatch`: ad hoc invocation of a tool by name and source
//! - `service`: `ToolConfigService`, the facade over all of the above
//! - `db`: SQLite persistence
//! - `mcp`: MCP protocol client and transports
//! - `tools`: native tool classes
//! - `plugins`: function-style plugins
//! - `core`: shared types

pub mod adapters;
pub mod catalog;
pub mod config;
pub mod core;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod mcp;
pub mod plugins;
pub mod service;
pub mod tools;

pub use catalog::{CatalogReconciler, ScanSummary};
pub use config::Config;
pub use dispatch::{DispatchRouter, ToolValidateRequest};
pub use error::ServiceError;
pub use service::ToolConfigService;

/// Install the global `tracing` subscriber: `RUST_LOG` if set, otherwise
/// `toolhub=debug,info`. Later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("toolhub=debug,info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
