use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::AdapterError;
use crate::config::Config;
use crate::core::tool::{ToolDescriptor, ToolSource};
use crate::db::{queries, Database};
use crate::mcp::schema::normalize_input_schema;
use crate::mcp::types::Tool;
use crate::mcp::{sanitize_function_name, McpConnector};

/// Tools from every connected server registered for the tenant, then the default server.
///
/// A registered server that fails is logged and skipped. A failure of the
/// default server is returned, since the caller cannot tell a partial list
/// from a complete one.
pub async fn descriptors(
    db: &Database,
    connector: &dyn McpConnector,
    config: &Config,
    tenant_id: &str,
) -> Result<Vec<ToolDescriptor>, AdapterError> {
    let mut tools = Vec::new();

    for record in queries::get_mcp_records_by_tenant(db, tenant_id)? {
        if !record.status {
            debug!(tenant_id, server = %record.mcp_name, "Skipping disconnected MCP server");
            continue;
        }
        match server_tools(connector, &record.mcp_name, &record.mcp_server).await {
            Ok(found) => tools.extend(found),
            Err(e) => error!(tenant_id, server = %record.mcp_name, "mcp connection error: {}", e),
        }
    }

    let default_url = config.default_mcp_endpoint();
    tools.extend(server_tools(connector, &config.default_mcp_name, &default_url).await?);
    Ok(tools)
}

/// List one server's tools and normalize them.
pub async fn server_tools(
    connector: &dyn McpConnector,
    server_name: &str,
    url: &str,
) -> Result<Vec<ToolDescriptor>, AdapterError> {
    let unavailable = |source| AdapterError::ServerUnavailable {
        server: server_name.to_string(),
        source,
    };

    let mut client = connector.connect(url).await.map_err(unavailable)?;
    let listed = client.list_all_tools().await;
    if let Err(e) = client.close().await {
        debug!(server = server_name, "Error closing MCP session: {}", e);
    }
    let listed = listed.map_err(unavailable)?;

    let mut out = Vec::with_capacity(listed.len());
    for tool in listed {
        match describe(server_name, tool) {
            Ok(descriptor) => out.push(descriptor),
            Err(e) => warn!(server = server_name, "Skipping remote tool: {}", e),
        }
    }
    info!(server = server_name, count = out.len(), "Listed MCP tools");
    Ok(out)
}

/// Normalize one listed remote tool.
pub fn describe(server_name: &str, tool: Tool) -> Result<ToolDescriptor, AdapterError> {
    let properties =
        normalize_input_schema(&tool.input_schema).map_err(|source| AdapterError::InvalidSchema {
            server: server_name.to_string(),
            tool: tool.name.clone(),
            source,
        })?;

    let name = sanitize_function_name(&tool.name);
    Ok(ToolDescriptor {
        name: name.clone(),
        origin_name: tool.name,
        description: tool.description.unwrap_or_default(),
        source: ToolSource::Mcp,
        params: Vec::new(),
        inputs: Value::Object(properties).to_string(),
        output_type: "string".to_string(),
        class_name: name,
        usage: Some(server_name.to_string()),
        category: None,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::mcp::schema::SchemaError;

    fn remote_tool(name: &str, schema: Value) -> Tool {
        Tool {
            name: name.to_string(),
            description: Some(format!("{name} tool")),
            input_schema: schema,
        }
    }

    #[test]
    fn test_describe_sanitizes_and_backfills() {
        let tool = remote_tool(
            "get-weather",
            json!({
                "type": "object",
                "properties": {
                    "param1": {},
                    "city": {"$ref": "#/$defs/City"}
                },
                "$defs": {"City": {"type": "string", "description": "City name"}}
            }),
        );

        let descriptor = describe("weather", tool).unwrap();
        assert_eq!(descriptor.name, "get_weather");
        assert_eq!(descriptor.class_name, "get_weather");
        assert_eq!(descriptor.origin_name, "get-weather");
        assert_eq!(descriptor.usage.as_deref(), Some("weather"));
        assert_eq!(descriptor.source, ToolSource::Mcp);
        assert_eq!(descriptor.output_type, "string");
        assert!(descriptor.params.is_empty());
        assert_eq!(
            descriptor.inputs_value(),
            json!({
                "param1": {"description": "see tool description", "type": "string"},
                "city": {"type": "string", "description": "City name"}
            })
        );
    }

    #[test]
    fn test_describe_without_properties_or_description() {
        let tool = Tool {
            name: "ping".to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
        };
        let descriptor = describe("srv", tool).unwrap();
        assert_eq!(descriptor.inputs, "{}");
        assert_eq!(descriptor.description, "");
    }

    #[test]
    fn test_describe_rejects_dangling_ref() {
        let tool = remote_tool(
            "broken",
            json!({"properties": {"x": {"$ref": "#/$defs/Missing"}}}),
        );
        assert!(matches!(
            describe("srv", tool),
            Err(AdapterError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_describe_rejects_schema_that_explodes_when_inlined() {
        let mut defs = serde_json::Map::new();
        for level in 0..24 {
            let next = format!("#/$defs/D{}", level + 1);
            defs.insert(
                format!("D{level}"),
                json!({"properties": {"a": {"$ref": next}, "b": {"$ref": next}}}),
            );
        }
        defs.insert("D24".to_string(), json!({"type": "string"}));
        let tool = remote_tool(
            "nested",
            json!({"properties": {"x": {"$ref": "#/$defs/D0"}}, "$defs": defs}),
        );

        assert!(matches!(
            describe("srv", tool),
            Err(AdapterError::InvalidSchema {
                source: SchemaError::TooLarge(_),
                ..
            })
        ));
    }
}
