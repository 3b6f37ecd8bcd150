use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::db::DbError;

/// Errors surfaced by the catalog, dispatcher and service facade.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("MCP connection failed: {0}")]
    McpConnectionFailed(String),

    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("unsupported tool source: {0}")]
    UnsupportedSource(String),

    #[error("tool scan failed: {0}")]
    ScanAggregateFailure(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl ServiceError {
    /// HTTP-style status for an outer boundary to report.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::McpConnectionFailed(_) | ServiceError::ScanAggregateFailure(_) => 503,
            ServiceError::NotFound(_) => 404,
            ServiceError::UnsupportedSource(_) => 400,
            ServiceError::ExecutionFailed(_) | ServiceError::Db(_) => 500,
        }
    }
}

impl Serialize for ServiceError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
