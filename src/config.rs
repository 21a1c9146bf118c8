//! Bridge and TDLib configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default receive timeout of the receiver thread
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 1000;

pub const DEFAULT_THREAD_NAME: &str = "tdbridge-receiver";

const POLL_TIMEOUT_ENV: &str = "TDBRIDGE_POLL_TIMEOUT_MS";
const THREAD_NAME_ENV: &str = "TDBRIDGE_THREAD_NAME";

// =============================================================================
// Bridge
// =============================================================================

/// Runtime settings of a bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How long a single poll may block. Also bounds shutdown latency.
    pub poll_timeout_ms: u64,
    /// Name of the receiver thread
    pub thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `TDBRIDGE_POLL_TIMEOUT_MS` and `TDBRIDGE_THREAD_NAME`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = env::var(POLL_TIMEOUT_ENV) {
            match value.trim().parse::<u64>() {
                Ok(ms) => config.poll_timeout_ms = ms,
                Err(e) => log::warn!(
                    "Ignoring {}={:?}: {}; using {}ms",
                    POLL_TIMEOUT_ENV,
                    value,
                    e,
                    config.poll_timeout_ms
                ),
            }
        }

        if let Ok(name) = env::var(THREAD_NAME_ENV) {
            if !name.trim().is_empty() {
                config.thread_name = name;
            }
        }

        config
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Check the settings a bridge cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_timeout_ms == 0 {
            return Err("poll_timeout_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// TDLib parameters
// =============================================================================

/// Parameters of the `setTdlibParameters` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TdlibParameters {
    pub api_id: i32,
    pub api_hash: String,
    pub use_test_dc: bool,
    pub database_directory: PathBuf,
    pub files_directory: PathBuf,
    pub use_file_database: bool,
    pub use_chat_info_database: bool,
    pub use_message_database: bool,
    pub use_secret_chats: bool,
    pub system_language_code: String,
    pub device_model: String,
    pub system_version: String,
    pub application_version: String,
    pub enable_storage_optimizer: bool,
    pub use_minithumbnail: bool,
}

impl Default for TdlibParameters {
    fn default() -> Self {
        let base = data_root();
        Self {
            api_id: 0,
            api_hash: String::new(),
            use_test_dc: false,
            database_directory: base.join("database"),
            files_directory: base.join("files"),
            use_file_database: true,
            use_chat_info_database: true,
            use_message_database: true,
            use_secret_chats: true,
            system_language_code: "en".to_string(),
            device_model: "tdbridge".to_string(),
            system_version: env::consts::OS.to_string(),
            application_version: env!("CARGO_PKG_VERSION").to_string(),
            enable_storage_optimizer: true,
            use_minithumbnail: true,
        }
    }
}

impl TdlibParameters {
    pub fn new(api_id: i32, api_hash: impl Into<String>) -> Self {
        Self {
            api_id,
            api_hash: api_hash.into(),
            ..Self::default()
        }
    }

    /// Credentials must be present before TDLib will accept the parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.api_id == 0 {
            return Err("api_id is not configured".to_string());
        }
        if self.api_hash.trim().is_empty() {
            return Err("api_hash is not configured".to_string());
        }
        Ok(())
    }

    /// Render the `setTdlibParameters` request
    pub fn to_query(&self) -> String {
        crate::queries::set_tdlib_parameters(self)
    }
}

/// Application data directory, falling back to the working directory
fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tdbridge")
}
