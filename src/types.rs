//! Core types for the message bus.

use crate::error::{BusError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Separator placed between a namespace and the original topic when
/// forwarding messages between brokers.
pub const TOPIC_SEPARATOR: &str = ":";

/// Process-wide message id source, shared by every broker so forwarded
/// messages keep their identity.
static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide subscriber id source. Independent of message ids.
static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a message.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Allocate the next process-wide message id.
    pub(crate) fn next() -> Self {
        MessageId(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a subscriber.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub u64);

impl SubscriberId {
    /// Allocate the next process-wide subscriber id.
    pub(crate) fn next() -> Self {
        SubscriberId(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoding of a message payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadEncoding {
    Json,
    MessagePack,
    #[default]
    Raw,
}

/// Opaque message payload: encoded bytes plus the codec that produced them.
///
/// The bus never looks inside a payload; it only moves it around.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    data: Vec<u8>,
    encoding: PayloadEncoding,
}

impl Payload {
    /// An empty raw payload, for messages that are pure signals.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Encode a value as JSON.
    pub fn json(value: &impl Serialize) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_vec(value)?,
            encoding: PayloadEncoding::Json,
        })
    }

    /// Encode a value as MessagePack.
    pub fn msgpack(value: &impl Serialize) -> Result<Self> {
        Ok(Self {
            data: rmp_serde::to_vec_named(value)?,
            encoding: PayloadEncoding::MessagePack,
        })
    }

    /// Wrap raw bytes.
    pub fn raw(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            encoding: PayloadEncoding::Raw,
        }
    }

    /// Decode the payload with the codec it was encoded with.
    ///
    /// Raw payloads have no codec and are rejected; use [`Payload::as_bytes`].
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self.encoding {
            PayloadEncoding::Json => serde_json::from_slice(&self.data)
                .map_err(|e| BusError::Deserialization(e.to_string())),
            PayloadEncoding::MessagePack => Ok(rmp_serde::from_slice(&self.data)?),
            PayloadEncoding::Raw => Err(BusError::EncodingMismatch {
                expected: PayloadEncoding::Json,
                got: PayloadEncoding::Raw,
            }),
        }
    }

    /// Encoded payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// How the bytes are encoded
    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }

    /// Length of the encoded bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({:?}, {} bytes)", self.encoding, self.data.len())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::raw(data)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::raw(s.as_bytes())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::raw(s.into_bytes())
    }
}

/// A message travelling through the bus.
///
/// Immutable once created. Messages are shared between subscribers as
/// `Arc<Message>`; forwarding builds a new message that shares the payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    id: MessageId,
    topic: String,
    payload: Arc<Payload>,
}

impl Message {
    /// Create a message with a freshly allocated id.
    pub(crate) fn new(topic: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: MessageId::next(),
            topic: topic.into(),
            payload: Arc::new(payload),
        }
    }

    /// Copy of this message under another topic. Id and payload are kept.
    pub(crate) fn with_topic(&self, topic: impl Into<String>) -> Self {
        Self {
            id: self.id,
            topic: topic.into(),
            payload: Arc::clone(&self.payload),
        }
    }

    /// Process-wide unique message id
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Topic the message was published or forwarded on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The opaque payload
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Decode the payload. Shorthand for `self.payload().decode()`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        self.payload.decode()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.topic)
    }
}
