use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("receive failed: {0}")]
    Receive(String),

    #[error("unknown or expired receipt '{0}'")]
    UnknownReceipt(String),

    #[error("message source backend error: {0}")]
    Backend(String),
}
