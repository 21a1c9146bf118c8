pub mod authorization;
mod bridge;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod queries;

pub use authorization::{AuthStateKind, AuthorizationState};
#[cfg(feature = "tdjson")]
pub use bridge::acquire;
pub use bridge::{acquire_with, global, Bridge, BridgeError, BridgeSlot, ReceiverStats};
pub use config::{BridgeConfig, TdlibParameters};
pub use engine::{ClientId, EngineError, EngineResponse, MessagingEngine, PollResult};
pub use queries::QueryError;
