use crate::config::Config;
use crate::error::CallError;
use futures::future::BoxFuture;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// A client bound to one token that can invoke Slack Web API methods.
pub trait RemoteApi: Send + Sync {
    /// The token this client authenticates with.
    fn token(&self) -> &str;

    /// Invoke `method` (e.g. `chat.postMessage`) with the given arguments.
    fn call<'a>(
        &'a self,
        method: &'a str,
        args: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<Value, CallError>>;
}

/// Shared handle to a ready remote client.
pub type ClientHandle = Arc<dyn RemoteApi>;

/// Builds a client for a token. Must not perform network I/O.
pub trait ClientFactory: Send + Sync {
    fn build(&self, token: &str) -> Result<ClientHandle, String>;
}

pub struct SlackHttpClient {
    http: Client,
    api_url: String,
    token: String,
}

impl SlackHttpClient {
    pub fn new(http: Client, api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            token: token.into(),
        }
    }

    async fn post(&self, method: &str, args: &Map<String, Value>) -> Result<Value, CallError> {
        let url = format!("{}/{}", self.api_url, method);
        let res = self
            .http
            .post(&url)
            .header(AUTHORIZATION, auth_header(&self.token)?)
            .form(&form_pairs(args))
            .send()
            .await
            .map_err(|e| {
                warn!("Slack POST {} error sending request: {}", method, e);
                CallError::Transport(e.to_string())
            })?;

        let status = res.status();
        let headers = res.headers().clone();
        let text = res
            .text()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;
        debug!("Slack POST {} -> {}", method, status);
        classify_response(status, &headers, &text)
    }
}

impl RemoteApi for SlackHttpClient {
    fn token(&self) -> &str {
        &self.token
    }

    fn call<'a>(
        &'a self,
        method: &'a str,
        args: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<Value, CallError>> {
        Box::pin(self.post(method, args))
    }
}

/// Builds [`SlackHttpClient`]s sharing one connection pool.
pub struct SlackClientFactory {
    http: Client,
    api_url: String,
}

impl SlackClientFactory {
    pub fn new(cfg: &Config) -> reqwest::Result<Self> {
        Ok(Self {
            http: build_client(cfg)?,
            api_url: cfg.api_url.clone(),
        })
    }
}

impl ClientFactory for SlackClientFactory {
    fn build(&self, token: &str) -> Result<ClientHandle, String> {
        // Reject tokens that cannot travel in a header before they are stored.
        HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| "token contains characters not allowed in a header".to_string())?;
        Ok(Arc::new(SlackHttpClient::new(
            self.http.clone(),
            self.api_url.clone(),
            token,
        )))
    }
}

pub fn build_client(cfg: &Config) -> reqwest::Result<Client> {
    let mut default_headers = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(&cfg.user_agent) {
        default_headers.insert(USER_AGENT, ua);
    }
    // Authorization header is injected per request since the token is replaceable.
    Client::builder()
        .default_headers(default_headers)
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .use_rustls_tls()
        .build()
}

fn auth_header(token: &str) -> Result<HeaderValue, CallError> {
    HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| CallError::Transport(format!("invalid authorization header: {}", e)))
}

/// Flatten arguments into form fields. Nulls are dropped; strings go as-is;
/// everything else (blocks, arrays, numbers) is JSON-encoded the way Slack expects.
pub fn form_pairs(args: &Map<String, Value>) -> Vec<(String, String)> {
    args.iter()
        .filter_map(|(k, v)| {
            let s = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            Some((k.clone(), s))
        })
        .collect()
}

/// Map a raw Slack response into a payload or a [`CallError`].
pub fn classify_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> Result<Value, CallError> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("?");
        warn!("Slack rate limited the request; Retry-After={}", retry_after);
    }

    match parsed {
        Some(v) => match v.get("ok").and_then(Value::as_bool) {
            Some(true) if status.is_success() => Ok(v),
            Some(_) => {
                let code = v
                    .get("error")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| fallback_code(status));
                Err(CallError::Rejected(code))
            }
            None if status == StatusCode::TOO_MANY_REQUESTS => {
                Err(CallError::Rejected("ratelimited".into()))
            }
            None => Err(CallError::Transport(format!(
                "malformed response (HTTP {}): missing \"ok\" field",
                status.as_u16()
            ))),
        },
        None if status == StatusCode::TOO_MANY_REQUESTS => {
            Err(CallError::Rejected("ratelimited".into()))
        }
        None => Err(CallError::Transport(format!(
            "HTTP {}: {}",
            status.as_u16(),
            truncate(body, 200)
        ))),
    }
}

fn fallback_code(status: StatusCode) -> String {
    if status.is_success() {
        "unknown_error".into()
    } else {
        format!("http_{}", status.as_u16())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
