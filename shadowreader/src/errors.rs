//! Error types for the reading engine.
//!
//! Every fallible operation in the crate returns [`ReaderError`]. End of
//! content is not an error: it is signalled by an empty [`Page`].
//!
//! [`Page`]: crate::source::Page

use std::collections::HashMap;
use thiserror::Error;

/// The main error type for reader operations.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// A persisted record carries a kind no content source understands.
    #[error("Unsupported book kind: {kind}")]
    UnsupportedBookKind {
        /// The unrecognised kind tag.
        kind: String,
    },

    /// A remote locator matches no registered site adapter.
    #[error("Unsupported origin: {locator}")]
    UnsupportedOrigin {
        /// The locator that could not be matched.
        locator: String,
    },

    /// A section fetch failed. Nothing was mutated; the call may be retried.
    #[error("{0}")]
    Network(#[from] NetworkError),

    /// A persisted record could not be decoded.
    #[error("Invalid persisted state for '{identity}': {reason}")]
    InvalidPersistedState {
        /// The book identity whose record is corrupt.
        identity: String,
        /// Why decoding failed.
        reason: String,
    },

    /// A page turn is already in flight.
    #[error("A page turn is already in progress")]
    Busy,

    /// The operation was aborted because its source was released.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// The content source was released and may not be used again.
    #[error("Content source has been released")]
    Released,

    /// A search was requested for an empty keyword.
    #[error("Search keyword must not be empty")]
    EmptyKeyword,

    /// No book is open in the session.
    #[error("No book is open")]
    NoActiveBook,

    /// The configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReaderError {
    /// Creates an unsupported book kind error.
    #[must_use]
    pub fn unsupported_kind(kind: impl Into<String>) -> Self {
        Self::UnsupportedBookKind { kind: kind.into() }
    }

    /// Creates an unsupported origin error.
    #[must_use]
    pub fn unsupported_origin(locator: impl Into<String>) -> Self {
        Self::UnsupportedOrigin {
            locator: locator.into(),
        }
    }

    /// Creates an invalid persisted state error.
    #[must_use]
    pub fn invalid_state(identity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPersistedState {
            identity: identity.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the identical call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(err) => err.retryable,
            Self::Busy | Self::Io(_) => true,
            _ => false,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        let kind = match self {
            Self::UnsupportedBookKind { kind } => {
                map.insert("kind".to_string(), serde_json::json!(kind));
                "UnsupportedBookKind"
            }
            Self::UnsupportedOrigin { locator } => {
                map.insert("locator".to_string(), serde_json::json!(locator));
                "UnsupportedOrigin"
            }
            Self::Network(err) => {
                map.insert("url".to_string(), serde_json::json!(err.url));
                if let Some(status) = err.status {
                    map.insert("status".to_string(), serde_json::json!(status));
                }
                "NetworkError"
            }
            Self::InvalidPersistedState { identity, .. } => {
                map.insert("identity".to_string(), serde_json::json!(identity));
                "InvalidPersistedState"
            }
            Self::Busy => "Busy",
            Self::Cancelled(_) => "Cancelled",
            Self::Released => "Released",
            Self::EmptyKeyword => "EmptyKeyword",
            Self::NoActiveBook => "NoActiveBook",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::Serialization(_) => "Serialization",
            Self::Io(_) => "Io",
        };

        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("retryable".to_string(), serde_json::json!(self.is_retryable()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

impl From<serde_json::Error> for ReaderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A failed section fetch.
#[derive(Debug, Clone, Error)]
#[error("Network error fetching {url}: {message}")]
pub struct NetworkError {
    /// The URL that was being fetched.
    pub url: String,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Description of the failure.
    pub message: String,
    /// Whether the failure is transient.
    pub retryable: bool,
}

impl NetworkError {
    /// Creates a transient network error.
    #[must_use]
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: None,
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates an error for a non-success HTTP status.
    #[must_use]
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status: Some(status),
            message: format!("unexpected status {status}"),
            retryable: status == 429 || status >= 500,
        }
    }
}
