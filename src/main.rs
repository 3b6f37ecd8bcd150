use std::sync::Arc;

use tracing::{error, info, warn};

use toolhub_lib::db::Database;
use toolhub_lib::{init_tracing, Config, ToolConfigService};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env();
    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        error!("failed to create data directory {}: {}", config.data_dir.display(), e);
        std::process::exit(1);
    }

    let db_path = config.db_path();
    let db = match Database::open(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("failed to open database {}: {}", db_path.display(), e);
            std::process::exit(1);
        }
    };
    info!(path = %db_path.display(), "Database ready");

    let service = ToolConfigService::new(db, config);
    match service.scan_all_tenants().await {
        Ok(summary) => {
            info!(
                tenants = summary.tenants(),
                successful = summary.successful,
                total_tools = summary.total_tools,
                "Tool initialization finished"
            );
            if !summary.failed.is_empty() {
                warn!(failed = ?summary.failed, "Some tenants failed to initialize tools");
            }
        }
        Err(e) => {
            error!("Tool initialization failed: {}", e);
            std::process::exit(1);
        }
    }
}
