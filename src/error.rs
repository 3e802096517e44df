use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Settings unavailable for index {index}: {reason}")]
    SettingsUnavailable { index: String, reason: String },

    #[error("Engine error ({status}) {code}: {message}")]
    Engine {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Json(e.to_string())
    }
}

impl BridgeError {
    /// True when the engine reported that the index does not exist, which is
    /// the trigger for creating it.
    pub fn is_not_found(&self) -> bool {
        match self {
            BridgeError::IndexNotFound(_) => true,
            BridgeError::Engine { status, code, .. } => {
                code == "index_not_found" || *status == StatusCode::NOT_FOUND
            }
            _ => false,
        }
    }

    /// Transport failures and timeouts, as opposed to the engine rejecting a request.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::Transport(_) => true,
            BridgeError::Engine { status, .. } => {
                *status == StatusCode::SERVICE_UNAVAILABLE
                    || *status == StatusCode::GATEWAY_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::IndexNotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::SettingsUnavailable { .. } => StatusCode::BAD_GATEWAY,
            BridgeError::Engine { status, .. } => *status,
            BridgeError::Transport(_) => StatusCode::BAD_GATEWAY,
            BridgeError::Json(_) => StatusCode::BAD_GATEWAY,
            BridgeError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            BridgeError::SearchUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BridgeError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
