//! Error types for the message bus.
//!
//! Fan-out itself never fails: full queues, unknown subscriber ids and
//! malformed topic patterns are all expressed as "not delivered". The
//! errors below only cover setup and payload encoding.

use crate::types::PayloadEncoding;
use thiserror::Error;

/// Main error type for bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Failed to spawn background thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Payload encoding mismatch: expected {expected:?}, got {got:?}")]
    EncodingMismatch {
        expected: PayloadEncoding,
        got: PayloadEncoding,
    },
}

impl From<serde_json::Error> for BusError {
    fn from(e: serde_json::Error) -> Self {
        BusError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for BusError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        BusError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for BusError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        BusError::Deserialization(e.to_string())
    }
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
