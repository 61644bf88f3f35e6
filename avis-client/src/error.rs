//! Error types for the Elvin client

use crate::types::{ListenerId, SubscriptionId};
use avis_filter::FilterError;
use avis_types::AttributeError;
use thiserror::Error;

/// A URI that does not follow `elvin:[version]/[protocol]/host[:port][;options]`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid Elvin URI \"{uri}\": {reason}")]
pub struct InvalidUriError {
    pub uri: String,
    pub reason: String,
}

impl InvalidUriError {
    pub fn new(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}

/// Failures encoding or decoding XDR frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Unknown value type code {0}")]
    UnknownType(i32),

    #[error("Negative length {0}")]
    NegativeLength(i32),

    #[error("String is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid boolean value {0}")]
    InvalidBool(i32),

    #[error("Frame length {0} is not a multiple of 4")]
    Unaligned(usize),

    #[error("Frame length {length} exceeds maximum of {max}")]
    FrameTooLarge { length: usize, max: usize },

    #[error("{0} bytes left over after frame body")]
    TrailingBytes(usize),

    #[error("Unknown frame type {0}")]
    UnknownFrame(i32),

    #[error("Security keys are not supported ({0} key schemes)")]
    UnsupportedKeys(usize),

    #[error("Invalid attribute: {0}")]
    Attribute(#[from] AttributeError),
}

/// Failures reported by a transport link
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,

    #[error("Connection refused by {0}")]
    Refused(String),

    #[error("Receive queue full ({0} frames)")]
    QueueFull(usize),

    #[error("Transport failure: {0}")]
    Failed(String),
}

/// Errors returned by connection and subscription operations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    InvalidUri(#[from] InvalidUriError),

    #[error("Failed to connect to {uri}: {error}")]
    Connect { uri: String, error: TransportError },

    #[error("Not connected")]
    NotConnected,

    #[error("Transmit failed: {0}")]
    Transmit(TransportError),

    #[error("Invalid subscription expression: {0}")]
    FilterSyntax(#[from] FilterError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Event loop is already running")]
    LoopAlreadyRunning,
}

/// A failure raised inside a listener callback
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Listener {listener} on {subscription} failed: {error:#}")]
    Failed {
        subscription: SubscriptionId,
        listener: ListenerId,
        error: anyhow::Error,
    },

    #[error("Listener {listener} on {subscription} panicked: {message}")]
    Panicked {
        subscription: SubscriptionId,
        listener: ListenerId,
        message: String,
    },
}

impl ListenerError {
    pub fn subscription(&self) -> SubscriptionId {
        match self {
            ListenerError::Failed { subscription, .. } => *subscription,
            ListenerError::Panicked { subscription, .. } => *subscription,
        }
    }

    pub fn listener(&self) -> ListenerId {
        match self {
            ListenerError::Failed { listener, .. } => *listener,
            ListenerError::Panicked { listener, .. } => *listener,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, ListenerError::Panicked { .. })
    }
}

/// Errors loading [`ClientOptions`](crate::ClientOptions)
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse options: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid option {name}: {message}")]
    Invalid { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;
