use serde_json::Value;
use thiserror::Error;

/// Normalized result of one gateway call.
pub type RequestOutcome = Result<Value, GatewayError>;

/// The three failure classes every remote call is folded into.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// No usable credential, or a supplied token failed format validation.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Slack accepted the request but answered `"ok": false`.
    #[error("Slack API error: {code}")]
    RemoteApi { code: String },
    /// Transport failure, malformed response, or anything else.
    #[error("unexpected error: {message}")]
    Unexpected { message: String },
}

impl GatewayError {
    pub fn configuration(detail: impl Into<String>) -> Self {
        Self::Configuration(detail.into())
    }

    /// Stable label used in tool envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::RemoteApi { .. } => "remote_api_error",
            Self::Unexpected { .. } => "unexpected_error",
        }
    }

    /// The provider code or diagnostic message, without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::Configuration(d) => d,
            Self::RemoteApi { code } => code,
            Self::Unexpected { message } => message,
        }
    }
}

/// Failure reported by a [`crate::http::RemoteApi`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("rejected by Slack: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<CallError> for GatewayError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Rejected(code) => GatewayError::RemoteApi { code },
            CallError::Transport(message) => GatewayError::Unexpected { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_errors_map_to_gateway_kinds() {
        let rejected: GatewayError = CallError::Rejected("channel_not_found".into()).into();
        assert_eq!(rejected.kind(), "remote_api_error");
        assert_eq!(rejected.detail(), "channel_not_found");

        let transport: GatewayError = CallError::Transport("connection reset".into()).into();
        assert_eq!(transport.kind(), "unexpected_error");
        assert_eq!(transport.detail(), "connection reset");
    }

    #[test]
    fn display_keeps_provider_code_verbatim() {
        let e = GatewayError::RemoteApi {
            code: "not_in_channel".into(),
        };
        assert_eq!(e.to_string(), "Slack API error: not_in_channel");
        assert_eq!(
            GatewayError::configuration("missing credential").to_string(),
            "configuration error: missing credential"
        );
    }
}
