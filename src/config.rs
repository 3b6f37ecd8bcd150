use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

const DEFAULT_LOCAL_MCP_SERVER: &str = "http://localhost:5011";
const DEFAULT_MCP_NAME: &str = "nexent";
const DEFAULT_USER_ID: &str = "user_id";
const DEFAULT_WORKSPACE_ROOT: &str = "/mnt/nexent";
const DEFAULT_MCP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TENANT_SCAN_TIMEOUT_SECS: u64 = 60;

/// Process configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Base URL of the implicit default MCP server.
    pub local_mcp_server: String,
    /// `usage` token that routes a remote tool to the default server.
    pub default_mcp_name: String,
    pub default_user_id: String,
    pub mcp_timeout: Duration,
    pub tenant_scan_timeout: Duration,
    pub mcp_retry_count: u32,
    /// Default `init_path` offered by the file tools.
    pub workspace_root: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            local_mcp_server: DEFAULT_LOCAL_MCP_SERVER.to_string(),
            default_mcp_name: DEFAULT_MCP_NAME.to_string(),
            default_user_id: DEFAULT_USER_ID.to_string(),
            mcp_timeout: Duration::from_secs(DEFAULT_MCP_TIMEOUT_SECS),
            tenant_scan_timeout: Duration::from_secs(DEFAULT_TENANT_SCAN_TIMEOUT_SECS),
            mcp_retry_count: 0,
            workspace_root: DEFAULT_WORKSPACE_ROOT.to_string(),
        }
    }
}

impl Config {
    /// Read `TOOLHUB_*` variables; callers load `.env` first.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str, default: u64| match text(key) {
            None => default,
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                warn!("{key}={raw:?} is not a whole number, using {default}");
                default
            }),
        };

        let defaults = Self::default();
        Self {
            data_dir: text("TOOLHUB_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            local_mcp_server: text("TOOLHUB_LOCAL_MCP_SERVER")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.local_mcp_server),
            default_mcp_name: text("TOOLHUB_DEFAULT_MCP_NAME").unwrap_or(defaults.default_mcp_name),
            default_user_id: text("TOOLHUB_DEFAULT_USER_ID").unwrap_or(defaults.default_user_id),
            mcp_timeout: Duration::from_secs(number(
                "TOOLHUB_MCP_TIMEOUT_SECS",
                DEFAULT_MCP_TIMEOUT_SECS,
            )),
            tenant_scan_timeout: Duration::from_secs(number(
                "TOOLHUB_TENANT_SCAN_TIMEOUT_SECS",
                DEFAULT_TENANT_SCAN_TIMEOUT_SECS,
            )),
            mcp_retry_count: u32::try_from(number("TOOLHUB_MCP_RETRY_COUNT", 0)).unwrap_or(0),
            workspace_root: text("TOOLHUB_WORKSPACE_ROOT").unwrap_or(defaults.workspace_root),
        }
    }

    /// Endpoint of the implicit default server.
    pub fn default_mcp_endpoint(&self) -> String {
        format!("{}/sse", self.local_mcp_server)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("toolhub.db")
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".toolhub");
    }

    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".toolhub");
    }

    PathBuf::from(".toolhub")
}
