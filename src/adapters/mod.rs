//! Source adapters: each turns one tool source into `ToolDescriptor`s.
//!
//! - `native`: compile-time tool classes (`source = local`)
//! - `plugin`: discovered function plugins (`source = langchain`)
//! - `remote`: tools listed by registered MCP servers (`source = mcp`)
//!
//! Malformed items are logged and skipped. Only the remote adapter can fail as a
//! whole, and only when the implicit default server cannot be used.

use thiserror::Error;

use crate::db::DbError;
use crate::mcp::client::ClientError;
use crate::mcp::schema::SchemaError;

pub mod native;
pub mod plugin;
pub mod remote;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("MCP server '{server}' unavailable: {source}")]
    ServerUnavailable {
        server: String,
        #[source]
        source: ClientError,
    },

    #[error("MCP server '{server}' sent an unusable schema for '{tool}': {source}")]
    InvalidSchema {
        server: String,
        tool: String,
        #[source]
        source: SchemaError,
    },

    #[error(transparent)]
    Db(#[from] DbError),
}
