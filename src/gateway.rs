//! The single funnel every Slack call goes through.

use crate::credentials::CredentialStore;
use crate::error::{GatewayError, RequestOutcome};
use crate::rate_limit::RateLimiter;
use log::{debug, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Who the active token belongs to, as reported by `auth.test`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub bot_id: Option<String>,
    pub team: Option<String>,
    pub team_id: Option<String>,
    pub url: Option<String>,
}

impl Identity {
    fn from_auth_test(v: &Value) -> Self {
        let field = |k: &str| v.get(k).and_then(Value::as_str).map(str::to_string);
        Self {
            user_id: field("user_id"),
            bot_id: field("bot_id"),
            team: field("team"),
            team_id: field("team_id"),
            url: field("url"),
        }
    }
}

#[derive(Clone)]
pub struct RequestGateway {
    credentials: Arc<CredentialStore>,
    limiter: Arc<RateLimiter>,
}

impl RequestGateway {
    pub fn new(credentials: Arc<CredentialStore>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            credentials,
            limiter,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Run one Slack method and classify what came back.
    ///
    /// A missing or malformed credential fails before the limiter is
    /// touched, so it never costs a rate-limit slot.
    pub async fn execute(&self, operation: &str, arguments: Map<String, Value>) -> RequestOutcome {
        let client = match self.credentials.ensure_ready() {
            Ok(c) => c,
            Err(e) => {
                warn!("{} not sent: {}", operation, e);
                return Err(e);
            }
        };

        self.limiter.admit().await;
        debug!("Calling Slack method {}", operation);
        let outcome = client
            .call(operation, &arguments)
            .await
            .map_err(GatewayError::from);
        log_outcome(operation, &outcome);
        outcome
    }

    /// Validate `token`, confirm it with `auth.test`, and only then make it active.
    ///
    /// Format problems are reported without any network traffic. A token the
    /// provider rejects leaves the previous credential in place.
    pub async fn set_credential(&self, token: &str) -> Result<Identity, GatewayError> {
        let candidate = self.credentials.prepare(token)?;
        let client = candidate.client();

        self.limiter.admit().await;
        let auth = client
            .call("auth.test", &Map::new())
            .await
            .map_err(GatewayError::from);
        log_outcome("auth.test", &auth);
        let auth = auth?;

        self.credentials.install(candidate);
        Ok(Identity::from_auth_test(&auth))
    }
}

fn log_outcome(operation: &str, outcome: &RequestOutcome) {
    match outcome {
        Ok(_) => debug!("{} ok", operation),
        Err(GatewayError::RemoteApi { code }) => warn!("Slack API error on {}: {}", operation, code),
        Err(e) => warn!("{} failed: {}", operation, e),
    }
}
