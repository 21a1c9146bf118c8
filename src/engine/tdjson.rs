//! FFI bindings to libtdjson
//!
//! These bindings cover the client-manager half of the TDLib JSON interface:
//! - Session creation (td_create_client_id)
//! - Requests (td_send, td_execute)
//! - Polling (td_receive)
//!
//! Strings returned by TDLib stay valid only until the next call of the same
//! function, so every response is copied out immediately.

use std::ffi::{c_char, c_double, c_int, CStr, CString};
use std::time::Duration;

use super::{ClientId, EngineError, EngineResponse, MessagingEngine, PollResult};

// =============================================================================
// FFI Declarations
// =============================================================================

extern "C" {
    /// Create a new client instance and return its identifier
    fn td_create_client_id() -> c_int;

    /// Send a JSON-serialized request to the client with the given id
    fn td_send(client_id: c_int, request: *const c_char);

    /// Receive the next update or response, waiting up to `timeout` seconds.
    /// Returns null on timeout. Must not be called from more than one thread.
    fn td_receive(timeout: c_double) -> *const c_char;

    /// Execute a request synchronously. Only a few requests support this.
    fn td_execute(request: *const c_char) -> *const c_char;
}

// =============================================================================
// Engine
// =============================================================================

/// [`MessagingEngine`] backed by the linked libtdjson
#[derive(Debug, Default)]
pub struct TdJsonEngine {
    _private: (),
}

impl TdJsonEngine {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl MessagingEngine for TdJsonEngine {
    fn create_client_id(&self) -> ClientId {
        unsafe { td_create_client_id() }
    }

    fn send(&self, client_id: ClientId, request: &str) {
        match CString::new(request) {
            Ok(c_request) => unsafe { td_send(client_id, c_request.as_ptr()) },
            Err(e) => log::warn!("Dropping request for client {}: {}", client_id, e),
        }
    }

    fn receive(&self, timeout: Duration) -> PollResult {
        let raw = unsafe { td_receive(timeout.as_secs_f64()) };
        if raw.is_null() {
            return PollResult::Idle;
        }

        let payload = match unsafe { CStr::from_ptr(raw) }.to_str() {
            Ok(s) => s.to_string(),
            Err(e) => return PollResult::Error(EngineError::MalformedResponse(e.to_string())),
        };

        match extract_client_id(&payload) {
            Ok(client_id) => PollResult::Update(EngineResponse { client_id, payload }),
            Err(e) => PollResult::Error(e),
        }
    }

    fn execute(&self, request: &str) -> Option<String> {
        let c_request = match CString::new(request) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Refusing to execute request: {}", e);
                return None;
            }
        };

        let raw = unsafe { td_execute(c_request.as_ptr()) };
        if raw.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned())
    }
}

/// Read the `@client_id` TDLib attaches to every received object.
/// Objects without one belong to no session and are reported as client 0.
fn extract_client_id(payload: &str) -> Result<ClientId, EngineError> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| EngineError::MalformedResponse(e.to_string()))?;

    match value.get("@client_id").and_then(|v| v.as_i64()) {
        Some(id) => ClientId::try_from(id)
            .map_err(|_| EngineError::MalformedResponse(format!("client id out of range: {}", id))),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_is_read_from_payload() {
        let id = extract_client_id(r#"{"@type":"updateOption","@client_id":4}"#).unwrap();
        assert_eq!(id, 4);
    }

    #[test]
    fn missing_client_id_defaults_to_zero() {
        assert_eq!(extract_client_id(r#"{"@type":"ok"}"#).unwrap(), 0);
    }

    #[test]
    fn non_json_payload_is_malformed() {
        assert!(matches!(
            extract_client_id("not json"),
            Err(EngineError::MalformedResponse(_))
        ));
    }
}
