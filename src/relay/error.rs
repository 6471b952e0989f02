//! Relay error types

use thiserror::Error;

/// Failures raised by a transport or its factory
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to construct transport for {url}: {reason}")]
    Construction { url: String, reason: String },
    #[error("credentials rejected")]
    Unauthorized,
    #[error("transport error: {0}")]
    Other(String),
}

/// A server message that could not be turned into a typed event
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
    #[error("malformed {event} payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A timer the host refused to arm
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no timer host available")]
    Unavailable,
    #[error("timer rejected: {0}")]
    Rejected(String),
}

/// Error returned by a local listener. Logged by the relay, never propagated.
pub type ListenerError = Box<dyn std::error::Error>;

pub type ListenerResult = Result<(), ListenerError>;
