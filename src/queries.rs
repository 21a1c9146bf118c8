//! Request builders
//!
//! JSON requests for the session lifecycle. They are plain strings, passed
//! to [`Bridge::send`](crate::Bridge::send) or, where noted,
//! [`Bridge::execute`](crate::Bridge::execute).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::config::TdlibParameters;

/// E.164: optional `+`, no leading zero, at most 15 digits
static PHONE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").unwrap());

/// Input rejected before a request is built
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid phone number format")]
    InvalidPhoneNumber,

    #[error("authentication code is empty")]
    InvalidCode,

    #[error("password is empty")]
    InvalidPassword,
}

/// Provide the parameters TDLib waits for in `authorizationStateWaitTdlibParameters`
pub fn set_tdlib_parameters(params: &TdlibParameters) -> String {
    json!({
        "@type": "setTdlibParameters",
        "parameters": {
            "@type": "tdlibParameters",
            "use_test_dc": params.use_test_dc,
            "database_directory": params.database_directory.to_string_lossy(),
            "files_directory": params.files_directory.to_string_lossy(),
            "use_file_database": params.use_file_database,
            "use_chat_info_database": params.use_chat_info_database,
            "use_message_database": params.use_message_database,
            "use_secret_chats": params.use_secret_chats,
            "api_id": params.api_id,
            "api_hash": params.api_hash,
            "system_language_code": params.system_language_code,
            "device_model": params.device_model,
            "system_version": params.system_version,
            "application_version": params.application_version,
            "enable_storage_optimizer": params.enable_storage_optimizer,
            "use_minithumbnail": params.use_minithumbnail,
        }
    })
    .to_string()
}

pub fn set_authentication_phone_number(phone_number: &str) -> Result<String, QueryError> {
    if !PHONE_NUMBER.is_match(phone_number) {
        return Err(QueryError::InvalidPhoneNumber);
    }
    Ok(json!({
        "@type": "setAuthenticationPhoneNumber",
        "phone_number": phone_number,
    })
    .to_string())
}

pub fn check_authentication_code(code: &str) -> Result<String, QueryError> {
    if code.is_empty() {
        return Err(QueryError::InvalidCode);
    }
    Ok(json!({
        "@type": "checkAuthenticationCode",
        "code": code,
    })
    .to_string())
}

/// Second factor for accounts with a cloud password
pub fn check_authentication_password(password: &str) -> Result<String, QueryError> {
    if password.is_empty() {
        return Err(QueryError::InvalidPassword);
    }
    Ok(json!({
        "@type": "checkAuthenticationPassword",
        "password": password,
    })
    .to_string())
}

pub fn get_authorization_state() -> String {
    json!({ "@type": "getAuthorizationState" }).to_string()
}

pub fn log_out() -> String {
    json!({ "@type": "logOut" }).to_string()
}

/// Ask TDLib to close the session; it answers with `authorizationStateClosed`
pub fn close() -> String {
    json!({ "@type": "close" }).to_string()
}

/// Adjust internal TDLib logging. Safe for `execute`.
pub fn set_log_verbosity_level(level: u8) -> String {
    json!({
        "@type": "setLogVerbosityLevel",
        "new_verbosity_level": level,
    })
    .to_string()
}
