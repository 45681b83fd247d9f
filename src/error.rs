use thiserror::Error;

use crate::events::PendingInput;

/// Generic text shown when the service reports `status: error` without an answer.
pub const GENERIC_SERVICE_ERROR: &str = "Sorry, an error occurred.";

/// Ways a single request to the chat service can fail.
///
/// None of these are fatal: every variant ends the turn with one visible bot message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Network or DNS failure before a response arrived.
    #[error("{0}")]
    Transport(String),

    /// Non-2xx HTTP status.
    #[error("{}", http_reason(.status, .detail))]
    Http { status: u16, detail: Option<String> },

    /// The payload itself reports `status: error`.
    #[error("{}", .answer.as_deref().unwrap_or(GENERIC_SERVICE_ERROR))]
    Service { answer: Option<String> },

    /// Body was not JSON or had an unexpected shape.
    #[error("{0}")]
    Malformed(String),
}

fn http_reason(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(detail) => detail.clone(),
        None => format!("Status {}", status),
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Malformed(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: PendingInput, to: PendingInput },
}

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error(
        "Speech recognition is not configured. Set speech.recognize_command in the config file."
    )]
    RecognitionUnsupported,

    #[error("Could not start speech command: {0}")]
    StartFailed(#[from] std::io::Error),
}
