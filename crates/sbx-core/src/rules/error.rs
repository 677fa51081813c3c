use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("invalid route server address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed routing rules body: {0}")]
    Malformed(String),

    #[error("fetch did not complete within {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for RulesError {
    fn from(e: reqwest::Error) -> Self {
        RulesError::Transport(e.to_string())
    }
}
