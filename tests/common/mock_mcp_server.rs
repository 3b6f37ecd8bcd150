//! In-memory MCP server for integration testing.
//!
//! Answers `initialize`, `tools/list` and `tools/call` the way a real server
//! would, with knobs for latency, request failures and a dropped session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};

use toolhub_lib::mcp::types::*;

pub struct MockMcpServer {
    name: String,
    tools: Mutex<Vec<Tool>>,
    failing_tools: Mutex<Vec<String>>,
    request_log: Mutex<Vec<JsonRpcRequest>>,
    failure_message: Mutex<Option<String>>,
    response_delay_ms: AtomicU64,
    page_size: Mutex<Option<usize>>,
    reachable: AtomicBool,
    healthy: AtomicBool,
}

impl MockMcpServer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Mutex::new(Vec::new()),
            failing_tools: Mutex::new(Vec::new()),
            request_log: Mutex::new(Vec::new()),
            failure_message: Mutex::new(None),
            response_delay_ms: AtomicU64::new(0),
            page_size: Mutex::new(None),
            reachable: AtomicBool::new(true),
            healthy: AtomicBool::new(true),
        }
    }

    /// A server exposing the given tool names, each taking a `query` string.
    pub fn with_tools(name: impl Into<String>, tool_names: &[&str]) -> Self {
        let server = Self::new(name);
        for tool_name in tool_names {
            server.add_tool(sample_tool(tool_name));
        }
        server
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_tool(&self, tool: Tool) {
        self.tools.lock().unwrap().push(tool);
    }

    pub fn clear_tools(&self) {
        self.tools.lock().unwrap().clear();
    }

    /// Calls to this tool come back with `isError: true`.
    pub fn fail_tool(&self, name: &str) {
        self.failing_tools.lock().unwrap().push(name.to_string());
    }

    /// Answer every request with a JSON-RPC error.
    pub fn set_should_fail(&self, message: Option<&str>) {
        *self.failure_message.lock().unwrap() = message.map(str::to_string);
    }

    pub fn set_response_delay(&self, delay_ms: u64) {
        self.response_delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    /// Split `tools/list` into pages of this size.
    pub fn set_page_size(&self, size: usize) {
        *self.page_size.lock().unwrap() = Some(size);
    }

    /// An unreachable server refuses connections outright.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// A server that accepted the handshake but then dropped the session.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn request_log(&self) -> Vec<JsonRpcRequest> {
        self.request_log.lock().unwrap().clone()
    }

    pub fn methods_called(&self) -> Vec<String> {
        self.request_log()
            .into_iter()
            .map(|request| request.method)
            .collect()
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        self.request_log.lock().unwrap().push(request.clone());
        let id = request.id.clone().unwrap_or(RequestId::Number(0));

        let delay = self.response_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        if let Some(message) = self.failure_message.lock().unwrap().clone() {
            return JsonRpcResponse::reply(id, Err(JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, message)));
        }

        let result = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "notifications/initialized" => Ok(json!({})),
            "tools/list" => self.handle_tools_list(request.params),
            "tools/call" => self.handle_tools_call(request.params),
            other => Err(JsonRpcError::new(
                JsonRpcError::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        };

        JsonRpcResponse::reply(id, result)
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": ServerCapabilities::with_tools(),
            "serverInfo": PeerInfo::new(self.name.clone(), "1.0.0"),
        })
    }

    fn handle_tools_list(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let tools = self.tools.lock().unwrap().clone();
        let start = params
            .as_ref()
            .and_then(|p| p.get("cursor"))
            .and_then(|c| c.as_str())
            .map(|c| {
                c.parse::<usize>()
                    .map_err(|_| invalid_params(format!("bad cursor: {c}")))
            })
            .transpose()?
            .unwrap_or(0);

        let page_size = self.page_size.lock().unwrap().unwrap_or(tools.len().max(1));
        let end = (start + page_size).min(tools.len());
        let next_cursor = (end < tools.len()).then(|| end.to_string());

        Ok(json!(ListToolsResult {
            tools: tools[start.min(end)..end].to_vec(),
            next_cursor,
        }))
    }

    fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params = params.ok_or_else(|| invalid_params("Missing params"))?;
        let name = params
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| invalid_params("Missing tool name"))?;

        if !self.tools.lock().unwrap().iter().any(|t| t.name == name) {
            return Err(invalid_params(format!("Tool not found: {}", name)));
        }

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
        if self.failing_tools.lock().unwrap().iter().any(|t| t == name) {
            return Ok(json!(CallToolResult {
                content: vec![Content::text(format!("{} blew up", name))],
                is_error: Some(true),
            }));
        }

        Ok(json!(CallToolResult {
            content: vec![Content::text(format!("{} called with {}", name, arguments))],
            is_error: Some(false),
        }))
    }
}

fn invalid_params(message: impl Into<String>) -> JsonRpcError {
    JsonRpcError::new(JsonRpcError::INVALID_PARAMS, message)
}

pub fn sample_tool(name: &str) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(format!("The {} tool", name)),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "What to look up"}
            },
            "required": ["query"]
        }),
    }
}
