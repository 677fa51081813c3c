use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid workload identity: {0}")]
    InvalidWorkload(String),

    #[error("invalid sandbox identity: {0}")]
    InvalidSandbox(String),

    #[error("unknown delivery mode: {0}")]
    UnknownDeliveryMode(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
