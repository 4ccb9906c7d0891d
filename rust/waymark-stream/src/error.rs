//! Error types for the stream substrate

use thiserror::Error;

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors surfaced to topic subscribers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Bounded wait for a first message elapsed
    #[error("no message on '{topic}' after {waited_ms}ms; is the robot connected?")]
    Timeout { topic: String, waited_ms: u128 },

    /// The underlying producer failed; the topic is torn down
    #[error("producer on '{topic}' failed: {message}")]
    Producer { topic: String, message: String },

    /// The topic terminated and this subscriber already observed why
    #[error("topic '{topic}' closed")]
    Closed { topic: String },
}
