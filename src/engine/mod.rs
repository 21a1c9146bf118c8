//! Messaging engine seam
//!
//! The bridge never talks to TDLib directly. It goes through
//! [`MessagingEngine`], which exposes the four primitives of the JSON client
//! interface:
//! - `create_client_id` once per bridge
//! - fire-and-forget `send`
//! - a bounded, polling `receive`
//! - synchronous `execute` for requests that need no session

pub mod mock;
#[cfg(feature = "tdjson")]
pub mod tdjson;

use std::time::Duration;

// =============================================================================
// Types
// =============================================================================

/// Identifier grouping all requests and responses of one client session
pub type ClientId = i32;

/// A payload received from the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResponse {
    pub client_id: ClientId,
    pub payload: String,
}

impl EngineResponse {
    pub fn new(client_id: ClientId, payload: impl Into<String>) -> Self {
        Self {
            client_id,
            payload: payload.into(),
        }
    }
}

/// Outcome of a single `receive` call
#[derive(Debug)]
pub enum PollResult {
    /// An update or response arrived within the timeout
    Update(EngineResponse),
    /// Nothing arrived within the timeout
    Idle,
    /// The poll itself failed; the next poll may well succeed
    Error(EngineError),
}

/// Failures reported by an engine during a poll
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("engine failure: {0}")]
    Failed(String),
}

// =============================================================================
// Engine
// =============================================================================

/// Client-session primitives of a poll-based messaging engine.
///
/// `receive` is only ever called from the bridge's receiver thread; the other
/// methods may be called from any thread.
pub trait MessagingEngine: Send + Sync {
    /// Create a new client session and return its id
    fn create_client_id(&self) -> ClientId;

    /// Queue a request for the given client. Responses arrive via `receive`.
    fn send(&self, client_id: ClientId, request: &str);

    /// Wait up to `timeout` for the next update or response
    fn receive(&self, timeout: Duration) -> PollResult;

    /// Run a request synchronously, without a client session
    fn execute(&self, request: &str) -> Option<String>;
}
