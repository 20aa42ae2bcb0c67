//! Book identity and the persisted resume record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::ReaderError;

/// Stable key identifying one book across sessions.
///
/// A file path for local books, the canonical root URL for remote ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookIdentity(String);

impl BookIdentity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identity looks like a web address.
    #[must_use]
    pub fn is_url(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

impl fmt::Display for BookIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BookIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The persisted resume point of a book.
///
/// Always written in the tagged object form. [`PositionRecord::decode`]
/// additionally accepts the legacy bare-integer encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionRecord {
    /// A local text file.
    Local {
        /// Characters already delivered.
        #[serde(alias = "readedCount")]
        consumed_offset: usize,
    },
    /// A remote chaptered book.
    #[serde(alias = "online")]
    Remote {
        /// Characters already delivered from the current section.
        #[serde(alias = "readedCount")]
        consumed_offset: usize,
        /// URL of the current section.
        #[serde(alias = "sectionPath")]
        section_locator: String,
    },
}

const KNOWN_KINDS: &[&str] = &["local", "remote", "online"];

impl Default for PositionRecord {
    fn default() -> Self {
        Self::Local { consumed_offset: 0 }
    }
}

impl PositionRecord {
    /// Creates a local record.
    #[must_use]
    pub fn local(consumed_offset: usize) -> Self {
        Self::Local { consumed_offset }
    }

    /// Creates a remote record.
    #[must_use]
    pub fn remote(section_locator: impl Into<String>, consumed_offset: usize) -> Self {
        Self::Remote {
            consumed_offset,
            section_locator: section_locator.into(),
        }
    }

    /// The offset stored in the record.
    #[must_use]
    pub fn consumed_offset(&self) -> usize {
        match self {
            Self::Local { consumed_offset } | Self::Remote { consumed_offset, .. } => {
                *consumed_offset
            }
        }
    }

    /// The kind tag as persisted.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Remote { .. } => "remote",
        }
    }

    /// Decodes a stored value.
    ///
    /// A bare non-negative integer is the legacy local encoding. An object
    /// with an unknown `kind` is [`ReaderError::UnsupportedBookKind`]; any
    /// other shape is [`ReaderError::InvalidPersistedState`].
    pub fn decode(identity: &BookIdentity, value: &Value) -> Result<Self, ReaderError> {
        match value {
            Value::Number(n) => n.as_u64().and_then(|v| usize::try_from(v).ok()).map_or_else(
                || {
                    Err(ReaderError::invalid_state(
                        identity.as_str(),
                        format!("legacy offset {n} is not a non-negative integer"),
                    ))
                },
                |offset| Ok(Self::local(offset)),
            ),
            Value::Object(map) => {
                let kind = map.get("kind").and_then(Value::as_str).ok_or_else(|| {
                    ReaderError::invalid_state(identity.as_str(), "record has no kind tag")
                })?;
                if !KNOWN_KINDS.contains(&kind) {
                    return Err(ReaderError::unsupported_kind(kind));
                }
                serde_json::from_value(value.clone())
                    .map_err(|e| ReaderError::invalid_state(identity.as_str(), e.to_string()))
            }
            other => Err(ReaderError::invalid_state(
                identity.as_str(),
                format!("unexpected record shape: {other}"),
            )),
        }
    }

    /// Encodes the record in its structured form.
    pub fn encode(&self) -> Result<Value, ReaderError> {
        Ok(serde_json::to_value(self)?)
    }
}
