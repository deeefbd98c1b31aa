//! Holds the single active Slack credential and the client bound to it.
//!
//! The store itself never talks to the network: a token is checked for
//! shape, a client is built for it, and the pair is swapped in whole.
//! Liveness is confirmed by the first real call, or eagerly by
//! [`crate::gateway::RequestGateway::set_credential`].

use crate::config::TOKEN_ENV;
use crate::error::GatewayError;
use crate::http::{ClientFactory, ClientHandle};
use log::{debug, info};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Token prefixes Slack issues: bot, user, legacy workspace, app-level.
pub const SLACK_TOKEN_PREFIXES: &[&str] = &["xoxb-", "xoxp-", "xoxo-", "xapp-"];

/// A validated token and the client built from it.
#[derive(Clone)]
pub struct Credential {
    token: String,
    client: ClientHandle,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn client(&self) -> ClientHandle {
        Arc::clone(&self.client)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &redact(&self.token))
            .finish_non_exhaustive()
    }
}

pub struct CredentialStore {
    factory: Arc<dyn ClientFactory>,
    prefixes: Vec<String>,
    env_var: String,
    current: RwLock<Option<Arc<Credential>>>,
}

impl CredentialStore {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            prefixes: SLACK_TOKEN_PREFIXES.iter().map(|p| p.to_string()).collect(),
            env_var: TOKEN_ENV.to_string(),
            current: RwLock::new(None),
        }
    }

    /// Replace the accepted token prefixes.
    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Read the fallback token from a different environment variable.
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Validate `token` and build a client for it without installing it.
    pub fn prepare(&self, token: &str) -> Result<Credential, GatewayError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GatewayError::configuration("token is empty"));
        }
        if !self.prefixes.iter().any(|p| token.starts_with(p.as_str())) {
            return Err(GatewayError::configuration(format!(
                "invalid token format; token should start with one of: {}",
                self.prefixes.join(", ")
            )));
        }
        let client = self
            .factory
            .build(token)
            .map_err(GatewayError::configuration)?;
        Ok(Credential {
            token: token.to_string(),
            client,
        })
    }

    /// Swap `credential` in as the active one. The previous handle is dropped, not mutated.
    pub fn install(&self, credential: Credential) -> ClientHandle {
        let client = credential.client();
        info!("Slack credential set ({})", redact(credential.token()));
        *self.current.write() = Some(Arc::new(credential));
        client
    }

    pub fn set_credential(&self, token: &str) -> Result<(), GatewayError> {
        let credential = self.prepare(token)?;
        self.install(credential);
        Ok(())
    }

    /// Return the active client, loading the token from the environment on first use.
    pub fn ensure_ready(&self) -> Result<ClientHandle, GatewayError> {
        if let Some(current) = self.current.read().as_ref() {
            return Ok(current.client());
        }

        let mut slot = self.current.write();
        // Another caller may have filled the slot between the two locks.
        if let Some(current) = slot.as_ref() {
            return Ok(current.client());
        }
        let token = std::env::var(&self.env_var)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::configuration(format!(
                    "missing credential: set {} or call set_slack_token first",
                    self.env_var
                ))
            })?;
        let credential = self.prepare(&token)?;
        debug!("Slack credential loaded from {}", self.env_var);
        let client = credential.client();
        *slot = Some(Arc::new(credential));
        Ok(client)
    }

    pub fn current_handle(&self) -> Option<ClientHandle> {
        self.current.read().as_ref().map(|c| c.client())
    }
}

/// Show only the token family and the last four characters.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take_while(|c| *c != '-').collect();
    let tail: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if token.chars().count() <= 8 {
        format!("{}-…", prefix)
    } else {
        format!("{}-…{}", prefix, tail)
    }
}
