//! Error types for trie operations

use thiserror::Error;

/// Error type for trie operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrieError {
    /// The requested key has no value in the trie
    #[error("key not found")]
    NotFound,

    /// Keys must contain at least one byte
    #[error("empty key")]
    EmptyKey,

    /// Key exceeds the configured maximum length
    #[error("key length {0} exceeds maximum {1}")]
    KeyTooLong(usize, usize),

    /// Value exceeds the configured maximum length
    #[error("value length {0} exceeds maximum {1}")]
    ValueTooLong(usize, usize),

    /// A node encoding could not be decoded
    #[error("malformed node encoding: {0}")]
    MalformedNode(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    DeserializationError(String),
}

/// Result type for trie operations
pub type TrieResult<T> = Result<T, TrieError>;
