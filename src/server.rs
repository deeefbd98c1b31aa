use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::gateway::RequestGateway;
use crate::http::SlackClientFactory;
use crate::mcp::{mcp_error, mcp_wrap};
use crate::rate_limit::RateLimiter;
use crate::tools::*;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use uuid::Uuid;

// Minimal JSON-RPC 2.0 types
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Id {
    Str(String),
    Num(i64),
    Null,
}

#[derive(Debug, Serialize, Deserialize)]
struct Request {
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Option<Id>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Response {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    id: Option<Id>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

fn rpc_error(id: Option<Id>, code: i64, message: &str, data: Option<Value>) -> Response {
    Response { jsonrpc: "2.0".into(), result: None, error: Some(RpcError { code, message: message.into(), data }), id }
}

fn rpc_ok(id: Option<Id>, result: Value) -> Response {
    Response { jsonrpc: "2.0".into(), result: Some(result), error: None, id }
}

/// Shared state behind every request: one gateway for the whole process.
pub struct Server {
    gateway: RequestGateway,
    enable_ping: bool,
}

impl Server {
    pub fn new(gateway: RequestGateway, enable_ping: bool) -> Self {
        Self { gateway, enable_ping }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let factory = SlackClientFactory::new(cfg)?;
        let credentials = Arc::new(CredentialStore::new(Arc::new(factory)));
        let limiter = Arc::new(RateLimiter::new(cfg.min_interval));
        Ok(Self::new(RequestGateway::new(credentials, limiter), cfg.enable_ping))
    }

    /// Handle one raw JSON-RPC message. Notifications produce no reply.
    pub async fn handle_message(&self, raw: &str) -> Option<String> {
        let resp = match serde_json::from_str::<Request>(raw) {
            Ok(req) => self.dispatch(req).await?,
            Err(e) => rpc_error(None, -32700, &format!("Parse error: {}", e), None),
        };
        match serde_json::to_string(&resp) {
            Ok(s) => Some(s),
            Err(e) => {
                log::error!("failed to serialize response: {}", e);
                None
            }
        }
    }

    async fn dispatch(&self, req: Request) -> Option<Response> {
        debug!("Received method={}", req.method);
        if req.method.starts_with("notifications/") {
            return None;
        }
        let resp = match req.method.as_str() {
            "initialize" => handle_initialize(req.id),
            "tools/list" => rpc_ok(req.id, serde_json::json!({ "tools": tool_descriptors(self.enable_ping) })),
            "tools/call" => self.handle_tools_call(req.id, req.params).await,
            "ping" => rpc_ok(req.id, serde_json::json!({})),
            other => rpc_error(req.id, -32601, &format!("Method not found: {}", other), None),
        };
        Some(resp)
    }

    async fn handle_tools_call(&self, id: Option<Id>, params: Value) -> Response {
        let parsed: Result<ToolCallParams, _> = serde_json::from_value(params);
        let Ok(call) = parsed else {
            return rpc_error(id, -32602, "Invalid params", None);
        };
        let Some(tool) = find_tool(&call.name, self.enable_ping) else {
            return rpc_error(id, -32601, &format!("Tool not found: {}", call.name), None);
        };
        let args = match prepare_arguments(&tool, call.arguments) {
            Ok(a) => a,
            Err(e) => return rpc_error(id, -32602, &format!("Invalid params: {}", e), None),
        };

        let call_id = Uuid::new_v4();
        debug!("tools/call {} start call_id={}", tool.name, call_id);
        let result = match run_tool(&self.gateway, &tool, args).await {
            Ok(payload) => {
                let text = summarize(tool.name, &payload);
                mcp_wrap(payload, text, false)
            }
            Err(e) => {
                info!("tools/call {} failed call_id={}: {}", tool.name, call_id, e);
                mcp_error(&e)
            }
        };
        debug!("tools/call {} done call_id={}", tool.name, call_id);
        rpc_ok(id, result)
    }
}

fn handle_initialize(id: Option<Id>) -> Response {
    rpc_ok(
        id,
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": "slack-mcp",
                "version": env!("CARGO_PKG_VERSION"),
            }
        }),
    )
}

#[derive(Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Largest `Content-Length` body accepted; bigger frames are skipped unread.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// One unit pulled off the input stream.
#[derive(Debug, PartialEq, Eq)]
enum Incoming {
    Message(String),
    /// A frame that could not be turned into text; the stream stays usable.
    Malformed(String),
}

// Framing headers only; any other `name: value` line is treated as a message.
fn is_frame_header(line: &str) -> bool {
    line.split_once(':').is_some_and(|(name, _)| {
        let name = name.trim();
        name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("content-type")
    })
}

async fn next_line<R: AsyncBufRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<bool> {
    buf.clear();
    Ok(reader.read_until(b'\n', buf).await? > 0)
}

/// Read the next message, accepting either one JSON document per line or
/// `Content-Length:` framing. Returns `None` at end of input; `Err` only for
/// failures of the stream itself.
async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Option<Incoming>> {
    let mut buf = Vec::new();
    loop {
        if !next_line(reader, &mut buf).await? {
            return Ok(None);
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            return Ok(Some(Incoming::Malformed("line is not valid UTF-8".into())));
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !is_frame_header(trimmed) {
            return Ok(Some(Incoming::Message(trimmed.to_string())));
        }

        // Header block: collect Content-Length wherever it appears before the blank line.
        let mut length: Option<String> = None;
        let mut header = trimmed.to_string();
        loop {
            if let Some((name, value)) = header.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    length = Some(value.trim().to_string());
                }
            }
            if !next_line(reader, &mut buf).await? {
                return Ok(None);
            }
            header = String::from_utf8_lossy(&buf).trim().to_string();
            if header.is_empty() {
                break;
            }
        }

        let Some(raw_len) = length else {
            return Ok(Some(Incoming::Malformed("frame headers without Content-Length".into())));
        };
        let Ok(len) = raw_len.parse::<usize>() else {
            return Ok(Some(Incoming::Malformed(format!("invalid Content-Length {:?}", raw_len))));
        };
        if len > MAX_FRAME_BYTES {
            let skipped = tokio::io::copy(&mut (&mut *reader).take(len as u64), &mut tokio::io::sink()).await?;
            return Ok(Some(Incoming::Malformed(format!(
                "Content-Length {} exceeds limit of {} bytes ({} skipped)",
                len, MAX_FRAME_BYTES, skipped
            ))));
        }
        let mut body = vec![0u8; len];
        match reader.read_exact(&mut body).await {
            Ok(_) => {}
            // Truncated final frame: nothing more will arrive.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        return Ok(Some(match String::from_utf8(body) {
            Ok(text) => Incoming::Message(text),
            Err(_) => Incoming::Malformed("frame body is not valid UTF-8".into()),
        }));
    }
}

fn malformed_reply(reason: &str) -> Option<String> {
    serde_json::to_string(&rpc_error(None, -32700, &format!("Parse error: {}", reason), None)).ok()
}

pub async fn run_stdio_server(cfg: Config) -> anyhow::Result<()> {
    info!("Starting slack-mcp stdio server; protocol={}", PROTOCOL_VERSION);
    let server = Arc::new(Server::from_config(&cfg)?);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut out = tokio::io::stdout();
        while let Some(payload) = rx.recv().await {
            out.write_all(payload.as_bytes()).await?;
            out.write_all(b"\n").await?;
            out.flush().await?;
        }
        anyhow::Ok(())
    });

    // Each message runs on its own task so slow tool calls queue on the
    // shared rate limiter instead of blocking the read loop.
    let mut in_flight = JoinSet::new();
    let mut reader = BufReader::new(tokio::io::stdin());
    loop {
        let raw = match read_message(&mut reader).await {
            Ok(Some(Incoming::Message(raw))) => raw,
            Ok(Some(Incoming::Malformed(reason))) => {
                warn!("dropping malformed frame: {}", reason);
                if let Some(payload) = malformed_reply(&reason) {
                    let _ = tx.send(payload);
                }
                continue;
            }
            Ok(None) => break,
            Err(e) => {
                warn!("stdin read failed: {}", e);
                break;
            }
        };
        let server = Arc::clone(&server);
        let tx = tx.clone();
        in_flight.spawn(async move {
            if let Some(payload) = server.handle_message(&raw).await {
                let _ = tx.send(payload);
            }
        });
    }
    while in_flight.join_next().await.is_some() {}
    drop(tx);
    writer.await??;
    info!("stdin closed; slack-mcp exiting");
    Ok(())
}
