//! Shared fixtures for integration tests.
#![allow(dead_code)]

pub mod mock_connector;
pub mod mock_mcp_server;
pub mod mock_transport;

use std::sync::Arc;
use std::time::Duration;

use toolhub_lib::db::Database;
use toolhub_lib::plugins::BuiltinPlugins;
use toolhub_lib::tools::NativeRegistry;
use toolhub_lib::{Config, ToolConfigService};

pub use mock_connector::MockConnector;
pub use mock_mcp_server::{sample_tool, MockMcpServer};
pub use mock_transport::MockTransport;

/// Config pointing the default server at a URL the tests mount, with short timeouts.
pub fn test_config() -> Config {
    Config {
        local_mcp_server: "http://default.mcp".to_string(),
        tenant_scan_timeout: Duration::from_millis(500),
        mcp_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

/// A service over an in-memory database, the built-in tools and the mock connector.
pub fn test_service(config: Config, connector: Arc<MockConnector>) -> ToolConfigService {
    let natives = NativeRegistry::builtin(&config.workspace_root);
    ToolConfigService::with_parts(
        Arc::new(Database::open_in_memory().expect("in-memory database")),
        config,
        Arc::new(natives),
        Arc::new(BuiltinPlugins::default()),
        connector,
    )
}
