use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use slack_mcp::{
    CallError, ClientFactory, ClientHandle, CredentialStore, GatewayError, RateLimiter, RemoteApi,
    RequestGateway,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Calls are stamped just after admission, so allow for scheduler jitter.
const JITTER: Duration = Duration::from_millis(5);

/// Records every call it receives and answers from a fixed script.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(String, Map<String, Value>, Instant)>>,
}

struct StubClient {
    token: String,
    recorder: Arc<Recorder>,
}

impl RemoteApi for StubClient {
    fn token(&self) -> &str {
        &self.token
    }

    fn call<'a>(
        &'a self,
        method: &'a str,
        args: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<Value, CallError>> {
        self.recorder
            .calls
            .lock()
            .push((method.to_string(), args.clone(), Instant::now()));
        let reply = match method {
            "conversations.info" => Ok(json!({"ok": true, "channel": {"id": "C1", "name": "general"}})),
            "chat.delete" => Err(CallError::Rejected("message_not_found".into())),
            "files.info" => Err(CallError::Transport("operation timed out".into())),
            _ => Ok(json!({"ok": true})),
        };
        Box::pin(async move { reply })
    }
}

struct StubFactory(Arc<Recorder>);

impl ClientFactory for StubFactory {
    fn build(&self, token: &str) -> Result<ClientHandle, String> {
        Ok(Arc::new(StubClient {
            token: token.to_string(),
            recorder: self.0.clone(),
        }))
    }
}

fn setup(interval: Duration) -> (RequestGateway, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let store = CredentialStore::new(Arc::new(StubFactory(recorder.clone())))
        .with_prefixes(["token-", "xoxb-"])
        .with_env_var("SLACK_MCP_SCENARIO_TOKEN_UNSET");
    let gateway = RequestGateway::new(Arc::new(store), Arc::new(RateLimiter::new(interval)));
    (gateway, recorder)
}

fn args(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn happy_path_returns_payload_unchanged() {
    let (gw, recorder) = setup(Duration::ZERO);
    gw.credentials().set_credential("token-aaa").unwrap();

    let payload = gw
        .execute("conversations.info", args(json!({"channel": "C1"})))
        .await
        .unwrap();
    assert_eq!(
        payload,
        json!({"ok": true, "channel": {"id": "C1", "name": "general"}})
    );

    let calls = recorder.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "conversations.info");
    assert_eq!(calls[0].1["channel"], "C1");
}

#[tokio::test]
async fn every_failure_is_a_value() {
    let (gw, _) = setup(Duration::ZERO);
    gw.credentials().set_credential("xoxb-abc").unwrap();

    assert_eq!(
        gw.execute("chat.delete", Map::new()).await,
        Err(GatewayError::RemoteApi {
            code: "message_not_found".into()
        })
    );
    assert_eq!(
        gw.execute("files.info", Map::new()).await,
        Err(GatewayError::Unexpected {
            message: "operation timed out".into()
        })
    );
}

#[tokio::test]
async fn bad_token_never_reaches_the_client() {
    let (gw, recorder) = setup(Duration::ZERO);
    let err = gw.set_credential("not-a-token").await.unwrap_err();
    assert!(matches!(err, GatewayError::Configuration(_)));
    assert!(recorder.calls.lock().is_empty());
}

#[tokio::test]
async fn readiness_is_idempotent() {
    let (gw, _) = setup(Duration::ZERO);
    gw.credentials().set_credential("token-aaa").unwrap();
    let a = gw.credentials().ensure_ready().unwrap();
    let b = gw.credentials().ensure_ready().unwrap();
    assert_eq!(a.token(), b.token());
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn failed_readiness_does_not_delay_next_call() {
    let (gw, _) = setup(Duration::from_millis(500));
    assert!(gw.execute("users.list", Map::new()).await.is_err());

    gw.credentials().set_credential("token-aaa").unwrap();
    let start = Instant::now();
    gw.execute("users.list", Map::new()).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(250));
}

#[tokio::test]
async fn sequential_calls_respect_interval() {
    let (gw, recorder) = setup(Duration::from_millis(100));
    gw.credentials().set_credential("token-aaa").unwrap();
    for _ in 0..4 {
        gw.execute("auth.test", Map::new()).await.unwrap();
    }
    let calls = recorder.calls.lock();
    for pair in calls.windows(2) {
        assert!(pair[1].2.duration_since(pair[0].2) + JITTER >= Duration::from_millis(100));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_burst_is_spread_out() {
    let (gw, recorder) = setup(Duration::from_millis(200));
    gw.credentials().set_credential("token-aaa").unwrap();

    let start = Instant::now();
    let calls = (0..5).map(|i| {
        let gw = gw.clone();
        tokio::spawn(async move {
            gw.execute("chat.postMessage", args(json!({"channel": "C1", "text": i.to_string()})))
                .await
        })
    });
    for res in join_all(calls).await {
        assert!(res.unwrap().is_ok());
    }
    assert!(start.elapsed() >= Duration::from_millis(800));

    let calls = recorder.calls.lock();
    assert_eq!(calls.len(), 5);
    let mut texts: Vec<_> = calls
        .iter()
        .map(|(_, a, _)| a["text"].as_str().unwrap().to_string())
        .collect();
    texts.sort();
    assert_eq!(texts, ["0", "1", "2", "3", "4"]);

    let mut stamps: Vec<_> = calls.iter().map(|c| c.2).collect();
    stamps.sort();
    for pair in stamps.windows(2) {
        assert!(pair[1].duration_since(pair[0]) + JITTER >= Duration::from_millis(200));
    }
}
