//! Message source abstraction consumed by the receive loop.
mod error;
pub use error::SourceError;

pub mod memory;
pub use memory::{MemoryQueue, MemoryQueueConfig};

use async_trait::async_trait;

use crate::carrier::{Carrier, Headers, MessageAttributes};

/// Transport metadata attached to a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    Attributes(MessageAttributes),
    Headers(Headers),
}

impl Metadata {
    /// Borrow the metadata as a carrier for context extraction.
    pub fn carrier(&self) -> Carrier<'_> {
        match self {
            Metadata::Attributes(attrs) => Carrier::Attributes(attrs),
            Metadata::Headers(headers) => Carrier::Headers(headers),
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata::Attributes(MessageAttributes::new())
    }
}

impl From<MessageAttributes> for Metadata {
    fn from(attrs: MessageAttributes) -> Self {
        Metadata::Attributes(attrs)
    }
}

impl From<Headers> for Metadata {
    fn from(headers: Headers) -> Self {
        Metadata::Headers(headers)
    }
}

/// One received message.
///
/// `receipt` identifies this particular delivery; it is what `release` and
/// `finalize` act on. A redelivered message gets a new receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub receipt: String,
    pub message_id: String,
    pub body: Vec<u8>,
    pub metadata: Metadata,
    /// How many times this message has been handed out, this delivery included.
    pub receive_count: u32,
}

impl Delivery {
    pub fn carrier(&self) -> Carrier<'_> {
        self.metadata.carrier()
    }
}

/// Queue or topic subscription the consumer reads from.
#[async_trait]
pub trait MessageSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Wait for the next message.
    ///
    /// `Ok(None)` means the wait elapsed without a message.
    async fn receive(&self) -> Result<Option<Delivery>, SourceError>;

    /// Give the message back so another consumer can take it.
    async fn release(&self, delivery: &Delivery) -> Result<(), SourceError>;

    /// Mark the message as done for this consumer.
    async fn finalize(&self, delivery: &Delivery) -> Result<(), SourceError>;
}
