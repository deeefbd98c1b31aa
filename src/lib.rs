//! Slack MCP server core: a rate-limited request gateway in front of the
//! Slack Web API, plus the tool layer and stdio JSON-RPC loop built on it.

pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod http;
pub mod mcp;
pub mod rate_limit;
pub mod server;
pub mod tools;

pub use credentials::{Credential, CredentialStore};
pub use error::{CallError, GatewayError, RequestOutcome};
pub use gateway::{Identity, RequestGateway};
pub use http::{ClientFactory, ClientHandle, RemoteApi};
pub use rate_limit::RateLimiter;
