//! Session authorization tracking
//!
//! The receiver thread feeds every update through [`AuthorizationTracker::observe`].
//! Updates are classified structurally rather than by substring, so a chat
//! message that happens to mention `authorizationStateReady` never flips the
//! session to authorized.

use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Common prefix of every authorization state type name
pub const AUTHORIZATION_STATE_MARKER: &str = "authorizationState";

/// Type name of the update TDLib emits when the authorization state changes
pub const UPDATE_AUTHORIZATION_STATE: &str = "updateAuthorizationState";

// =============================================================================
// Types
// =============================================================================

/// Known authorization states of a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthStateKind {
    WaitTdlibParameters,
    WaitPhoneNumber,
    WaitEmailAddress,
    WaitEmailCode,
    WaitCode,
    WaitOtherDeviceConfirmation,
    WaitRegistration,
    WaitPassword,
    Ready,
    LoggingOut,
    Closing,
    Closed,
}

const KINDS: &[(AuthStateKind, &str)] = &[
    (AuthStateKind::WaitTdlibParameters, "authorizationStateWaitTdlibParameters"),
    (AuthStateKind::WaitPhoneNumber, "authorizationStateWaitPhoneNumber"),
    (AuthStateKind::WaitEmailAddress, "authorizationStateWaitEmailAddress"),
    (AuthStateKind::WaitEmailCode, "authorizationStateWaitEmailCode"),
    (AuthStateKind::WaitCode, "authorizationStateWaitCode"),
    (AuthStateKind::WaitOtherDeviceConfirmation, "authorizationStateWaitOtherDeviceConfirmation"),
    (AuthStateKind::WaitRegistration, "authorizationStateWaitRegistration"),
    (AuthStateKind::WaitPassword, "authorizationStateWaitPassword"),
    (AuthStateKind::Ready, "authorizationStateReady"),
    (AuthStateKind::LoggingOut, "authorizationStateLoggingOut"),
    (AuthStateKind::Closing, "authorizationStateClosing"),
    (AuthStateKind::Closed, "authorizationStateClosed"),
];

impl AuthStateKind {
    /// Look up a state by its engine type name
    pub fn from_type_name(name: &str) -> Option<Self> {
        KINDS.iter().find(|(_, n)| *n == name).map(|(kind, _)| *kind)
    }

    /// The engine type name of this state
    pub fn type_name(self) -> &'static str {
        KINDS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, n)| *n)
            .unwrap_or(AUTHORIZATION_STATE_MARKER)
    }

    /// True for states that wait on input from the user
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            Self::WaitTdlibParameters
                | Self::WaitPhoneNumber
                | Self::WaitEmailAddress
                | Self::WaitEmailCode
                | Self::WaitCode
                | Self::WaitOtherDeviceConfirmation
                | Self::WaitRegistration
                | Self::WaitPassword
        )
    }
}

/// What an update turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// A recognized authorization state notification
    Authorization(AuthStateKind),
    /// Looks like an authorization notification but matches no known state
    Unparsed,
    /// Anything else
    Other,
}

/// Current authorization state of the session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthorizationState {
    #[default]
    Unknown,
    Intermediate { kind: AuthStateKind, raw: String },
    Ready { raw: String },
}

impl AuthorizationState {
    /// The payload that produced this state, or "" before any was seen
    pub fn raw(&self) -> &str {
        match self {
            Self::Unknown => "",
            Self::Intermediate { raw, .. } | Self::Ready { raw } => raw,
        }
    }

    pub fn kind(&self) -> Option<AuthStateKind> {
        match self {
            Self::Unknown => None,
            Self::Intermediate { kind, .. } => Some(*kind),
            Self::Ready { .. } => Some(AuthStateKind::Ready),
        }
    }
}

#[derive(Deserialize)]
struct TypedObject {
    #[serde(rename = "@type")]
    type_name: String,
    #[serde(default)]
    authorization_state: Option<Box<TypedObject>>,
}

// =============================================================================
// Classification
// =============================================================================

/// Classify a raw update payload.
///
/// Both TDLib JSON objects and bare type names are understood:
/// - `{"@type":"updateAuthorizationState","authorization_state":{"@type":"authorizationStateReady"}}`
/// - `{"@type":"authorizationStateReady"}` (the reply to `getAuthorizationState`)
/// - `authorizationStateReady`
pub fn classify(payload: &str) -> UpdateKind {
    let trimmed = payload.trim();

    if trimmed.starts_with('{') {
        return match serde_json::from_str::<TypedObject>(trimmed) {
            Ok(obj) => classify_object(&obj),
            Err(_) if trimmed.contains(AUTHORIZATION_STATE_MARKER) => UpdateKind::Unparsed,
            Err(_) => UpdateKind::Other,
        };
    }

    match AuthStateKind::from_type_name(trimmed) {
        Some(kind) => UpdateKind::Authorization(kind),
        None if trimmed.contains(AUTHORIZATION_STATE_MARKER) => UpdateKind::Unparsed,
        None => UpdateKind::Other,
    }
}

fn classify_object(obj: &TypedObject) -> UpdateKind {
    if obj.type_name == UPDATE_AUTHORIZATION_STATE {
        return obj
            .authorization_state
            .as_ref()
            .and_then(|state| AuthStateKind::from_type_name(&state.type_name))
            .map_or(UpdateKind::Unparsed, UpdateKind::Authorization);
    }

    match AuthStateKind::from_type_name(&obj.type_name) {
        Some(kind) => UpdateKind::Authorization(kind),
        None if obj.type_name.starts_with(AUTHORIZATION_STATE_MARKER) => UpdateKind::Unparsed,
        None => UpdateKind::Other,
    }
}

// =============================================================================
// Tracker
// =============================================================================

/// Authorization state derived from observed updates.
///
/// Written only by the receiver thread, readable from any thread. Once the
/// session has been seen as ready, `is_authorized` stays true.
#[derive(Debug, Default)]
pub struct AuthorizationTracker {
    authorized: AtomicBool,
    state: RwLock<AuthorizationState>,
}

impl AuthorizationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an update and apply any transition it implies
    pub fn observe(&self, payload: &str) -> UpdateKind {
        let kind = classify(payload);

        match kind {
            UpdateKind::Authorization(AuthStateKind::Ready) => {
                *self.state.write() = AuthorizationState::Ready {
                    raw: payload.to_string(),
                };
                self.authorized.store(true, Ordering::Release);
                log::info!("Authorization ready");
            }
            UpdateKind::Authorization(state) => {
                *self.state.write() = AuthorizationState::Intermediate {
                    kind: state,
                    raw: payload.to_string(),
                };
                log::debug!("Authorization state: {}", state.type_name());
            }
            UpdateKind::Unparsed => {
                log::debug!("Ignoring unrecognized authorization payload: {}", payload);
            }
            UpdateKind::Other => {}
        }

        kind
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::Acquire)
    }

    pub fn state(&self) -> AuthorizationState {
        self.state.read().clone()
    }

    /// Verbatim payload of the latest authorization update
    pub fn state_text(&self) -> String {
        self.state.read().raw().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_bare_type_names() {
        assert_eq!(
            classify("authorizationStateWaitCode"),
            UpdateKind::Authorization(AuthStateKind::WaitCode)
        );
        assert_eq!(classify("authorizationStateBogus"), UpdateKind::Unparsed);
        assert_eq!(classify("updateNewMessage"), UpdateKind::Other);
    }

    #[test]
    fn classifies_update_objects() {
        let update = r#"{"@type":"updateAuthorizationState","authorization_state":{"@type":"authorizationStateWaitPassword","password_hint":""}}"#;
        assert_eq!(
            classify(update),
            UpdateKind::Authorization(AuthStateKind::WaitPassword)
        );

        let reply = r#"{"@type":"authorizationStateReady","@extra":1}"#;
        assert_eq!(classify(reply), UpdateKind::Authorization(AuthStateKind::Ready));
    }

    #[test]
    fn message_mentioning_marker_is_not_a_transition() {
        let message = r#"{"@type":"updateNewMessage","message":{"content":{"text":"authorizationStateReady"}}}"#;
        assert_eq!(classify(message), UpdateKind::Other);
    }

    #[test]
    fn malformed_authorization_payloads_are_unparsed() {
        assert_eq!(classify(r#"{"@type":"updateAuthorizationState"}"#), UpdateKind::Unparsed);
        assert_eq!(classify(r#"{"authorizationStateReady": "#), UpdateKind::Unparsed);
        assert_eq!(classify(r#"{"@type":"authorizationStateUnheardOf"}"#), UpdateKind::Unparsed);
    }

    #[test]
    fn type_names_round_trip() {
        for (kind, name) in KINDS {
            assert_eq!(kind.type_name(), *name);
            assert_eq!(AuthStateKind::from_type_name(name), Some(*kind));
        }
    }

    #[test]
    fn tracker_starts_unknown() {
        let tracker = AuthorizationTracker::new();
        assert!(!tracker.is_authorized());
        assert_eq!(tracker.state(), AuthorizationState::Unknown);
        assert_eq!(tracker.state_text(), "");
    }

    #[test]
    fn intermediate_state_keeps_raw_payload() {
        let tracker = AuthorizationTracker::new();
        tracker.observe("authorizationStateWaitPhoneNumber");

        assert!(!tracker.is_authorized());
        assert_eq!(tracker.state().kind(), Some(AuthStateKind::WaitPhoneNumber));
        assert_eq!(tracker.state_text(), "authorizationStateWaitPhoneNumber");
    }

    #[test]
    fn authorized_is_sticky() {
        let tracker = AuthorizationTracker::new();
        tracker.observe("authorizationStateReady");
        tracker.observe("authorizationStateLoggingOut");

        assert!(tracker.is_authorized());
        assert_eq!(tracker.state().kind(), Some(AuthStateKind::LoggingOut));
    }

    #[test]
    fn unparsed_updates_leave_state_alone() {
        let tracker = AuthorizationTracker::new();
        tracker.observe("authorizationStateWaitCode");
        assert_eq!(tracker.observe("authorizationStateMystery"), UpdateKind::Unparsed);

        assert_eq!(tracker.state_text(), "authorizationStateWaitCode");
    }
}
