use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use super::{
    begin_handshake, ensure_ready, negotiate, reply_result, status_error, InitializationResult,
    McpTransport, TransportConfig, TransportError, TransportState,
};
use crate::mcp::types::{JsonRpcRequest, RequestId};

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event_type: String,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental SSE decoder; chunks may split events, lines and UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct SseEventParser {
    buffer: Vec<u8>,
    after_cr: bool,
}

impl SseEventParser {
    /// Feed raw bytes, returning every event completed by them.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // CRLF and lone CR both end a line; the LF of a CRLF may arrive in the next chunk.
        for &byte in chunk {
            match byte {
                b'\n' if self.after_cr => {}
                b'\r' => self.buffer.push(b'\n'),
                other => self.buffer.push(other),
            }
            self.after_cr = byte == b'\r';
        }

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|pair| pair == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            events.extend(parse_block(&String::from_utf8_lossy(&block)));
        }
        events
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent {
        event_type: "message".to_string(),
        data: String::new(),
        id: None,
    };
    let mut data_lines = 0;

    for line in block.lines().filter(|l| !l.is_empty() && !l.starts_with(':')) {
        let (field, value) = line
            .split_once(':')
            .map(|(f, v)| (f, v.strip_prefix(' ').unwrap_or(v)))
            .unwrap_or((line, ""));
        match field {
            "event" => event.event_type = value.to_string(),
            "id" => event.id = Some(value.to_string()),
            "data" => {
                if data_lines > 0 {
                    event.data.push('\n');
                }
                event.data.push_str(value);
                data_lines += 1;
            }
            other => trace!("Unknown SSE field: {}", other),
        }
    }

    (data_lines > 0).then_some(event)
}

type PendingReplies = Arc<DashMap<i64, oneshot::Sender<Value>>>;

/// Legacy SSE transport (`GET <url>` stream plus POSTs to the announced endpoint).
pub struct SseTransport {
    client: reqwest::Client,
    sse_url: String,
    next_id: AtomicI64,
    state: Mutex<TransportState>,
    endpoint: Mutex<Option<Url>>,
    pending: PendingReplies,
    reader: Mutex<Option<JoinHandle<()>>>,
    config: TransportConfig,
}

impl SseTransport {
    pub fn new(sse_url: &str, config: TransportConfig) -> Result<Self, TransportError> {
        info!("Creating SSE transport for URL: {}", sse_url);

        // No overall timeout: the event stream stays open for the whole session.
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Failed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            sse_url: sse_url.to_string(),
            next_id: AtomicI64::new(1),
            state: Mutex::new(TransportState::Uninitialized),
            endpoint: Mutex::new(None),
            pending: Arc::new(DashMap::new()),
            reader: Mutex::new(None),
            config,
        })
    }

    /// Open the event stream and wait for the server to announce its POST endpoint.
    async fn open_stream(&self) -> Result<Url, TransportError> {
        let base = Url::parse(&self.sse_url)
            .map_err(|e| TransportError::Connection(format!("invalid SSE url: {}", e)))?;
        let limit = self.config.timeout;

        let response = timeout(
            limit,
            self.client
                .get(base.clone())
                .header(ACCEPT, "text/event-stream")
                .send(),
        )
        .await
        .map_err(|_| TransportError::Timeout(limit))?
        .map_err(|e| TransportError::connection(format!("Failed to connect to SSE stream: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();
        let reader = tokio::spawn(read_stream(
            response.bytes_stream(),
            endpoint_tx,
            self.pending.clone(),
        ));
        *self.reader.lock().await = Some(reader);

        let endpoint = timeout(limit, endpoint_rx)
            .await
            .map_err(|_| TransportError::Timeout(limit))?
            .map_err(|_| {
                TransportError::Connection("SSE stream closed before endpoint event".to_string())
            })?;

        base.join(endpoint.trim())
            .map_err(|e| TransportError::InvalidResponse(format!("invalid endpoint: {}", e)))
    }

    async fn post(&self, message: &JsonRpcRequest) -> Result<(), TransportError> {
        let endpoint = self
            .endpoint
            .lock()
            .await
            .clone()
            .ok_or(TransportError::NotInitialized)?;

        let response = self
            .client
            .post(endpoint)
            .timeout(self.config.timeout)
            .json(message)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.config.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    /// POST a request and wait for the reply with the same id to arrive on the stream.
    async fn round_trip(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        trace!("Sending SSE request: method={}, id={}", method, id);

        let message = JsonRpcRequest::call(RequestId::Number(id), method, Some(params));
        if let Err(e) = self.post(&message).await {
            self.pending.remove(&id);
            return Err(e);
        }

        match timeout(self.config.timeout, rx).await {
            Ok(Ok(reply)) => reply_result(reply),
            Ok(Err(_)) => Err(TransportError::Connection(
                "SSE stream closed while awaiting reply".to_string(),
            )),
            Err(_) => {
                self.pending.remove(&id);
                Err(TransportError::Timeout(self.config.timeout))
            }
        }
    }
}

/// Drain the event stream: the first `endpoint` event resolves `endpoint_tx`,
/// `message` events are routed to whoever awaits their id.
async fn read_stream<S, B, E>(
    stream: S,
    endpoint_tx: oneshot::Sender<String>,
    pending: PendingReplies,
) where
    S: futures::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut parser = SseEventParser::default();
    let mut endpoint_tx = Some(endpoint_tx);

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("SSE stream error: {}", e);
                break;
            }
        };
        for event in parser.feed(chunk.as_ref()) {
            match event.event_type.as_str() {
                "endpoint" => {
                    if let Some(tx) = endpoint_tx.take() {
                        let _ = tx.send(event.data);
                    }
                }
                "message" => route_reply(&pending, &event.data),
                other => trace!("Ignoring SSE event type: {}", other),
            }
        }
    }

    debug!("SSE stream ended");
    // Dropping the senders fails every in-flight request.
    pending.clear();
}

fn route_reply(pending: &PendingReplies, data: &str) {
    let reply: Value = match serde_json::from_str(data) {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Discarding unparsable SSE message: {}", e);
            return;
        }
    };

    let Some(id) = reply.get("id").and_then(Value::as_i64) else {
        trace!("Ignoring server-initiated SSE message");
        return;
    };
    match pending.remove(&id) {
        Some((_, tx)) => {
            let _ = tx.send(reply);
        }
        None => trace!("No pending request for reply id {}", id),
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn initialize(&mut self) -> Result<InitializationResult, TransportError> {
        begin_handshake(&self.state).await?;
        info!("Initializing MCP SSE transport for: {}", self.sse_url);

        let endpoint = match self.open_stream().await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                *self.state.lock().await = TransportState::Failed;
                return Err(e);
            }
        };
        debug!("SSE endpoint announced: {}", endpoint);
        *self.endpoint.lock().await = Some(endpoint);

        let this = &*self;
        let init = match negotiate(&this.sse_url, |params| this.round_trip("initialize", params)).await {
            Ok(init) => init,
            Err(e) => {
                *self.state.lock().await = TransportState::Failed;
                return Err(e);
            }
        };

        let initialized = JsonRpcRequest::notify("notifications/initialized", Some(json!({})));
        if let Err(e) = self.post(&initialized).await {
            warn!("Failed to send initialized notification: {}", e);
        }

        *self.state.lock().await = TransportState::Initialized;
        info!(
            "MCP SSE transport initialized with protocol version: {}",
            init.protocol_version
        );
        Ok(init)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        ensure_ready(&self.state).await?;
        self.round_trip(method, params).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        debug!("Closing SSE transport for: {}", self.sse_url);
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        self.pending.clear();
        *self.endpoint.lock().await = None;
        *self.state.lock().await = TransportState::Uninitialized;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        if *self.state.lock().await != TransportState::Initialized {
            return false;
        }
        self.reader
            .lock()
            .await
            .as_ref()
            .is_some_and(|reader| !reader.is_finished())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_handles_split_chunks() {
        let mut parser = SseEventParser::default();
        assert!(parser.feed(b"event: endpoint\nda").is_empty());
        let events = parser.feed(b"ta: /messages/?session_id=abc\n\nevent: message\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event_type: "endpoint".into(),
                data: "/messages/?session_id=abc".into(),
                id: None,
            }]
        );

        let events = parser.feed(b"id: 7\ndata: {\"a\":1}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "message");
        assert_eq!(events[0].data, "{\"a\":1}");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_parser_keeps_multibyte_chars_split_across_chunks() {
        let frame = "data: 你好\n\n".as_bytes();
        let mut parser = SseEventParser::default();
        assert!(parser.feed(&frame[..8]).is_empty());
        let events = parser.feed(&frame[8..]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "你好");
    }

    #[test]
    fn test_parser_joins_crlf_split_across_chunks() {
        let mut parser = SseEventParser::default();
        assert!(parser.feed(b"data: one\r").is_empty());
        assert!(parser.feed(b"\ndata: two\r").is_empty());
        let events = parser.feed(b"\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn test_parser_joins_multiline_data_and_skips_comments() {
        let mut parser = SseEventParser::default();
        let events = parser.feed(b": ping\n\ndata: line one\ndata: line two\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[tokio::test]
    async fn test_route_reply_delivers_to_pending_request() {
        let pending: PendingReplies = Arc::new(DashMap::new());
        let (tx, rx) = oneshot::channel();
        pending.insert(3, tx);

        route_reply(&pending, r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#);
        route_reply(&pending, r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#);

        let reply = rx.await.unwrap();
        assert_eq!(reply["result"]["ok"], true);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_read_stream_announces_endpoint_and_routes_replies() {
        let pending: PendingReplies = Arc::new(DashMap::new());
        let (reply_tx, reply_rx) = oneshot::channel();
        pending.insert(1, reply_tx);

        let chunks: Vec<Result<&[u8], String>> = vec![
            Ok(&b"event: endpoint\ndata: /messages?s=1\n\n"[..]),
            Ok(&b"event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n"[..]),
        ];
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        read_stream(futures::stream::iter(chunks), endpoint_tx, pending.clone()).await;

        assert_eq!(endpoint_rx.await.unwrap(), "/messages?s=1");
        assert_eq!(reply_rx.await.unwrap()["id"], 1);
        assert!(pending.is_empty());
    }
}
