//! The process-wide wire format selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which decode strategy the relay applies to every inbound message.
///
/// Chosen once at startup and injected into the dispatcher; it never
/// changes per connection or per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Text-structured: each message is a JSON document.
    #[default]
    Json,
    /// Binary-structured: each message is a protobuf `LiveAPIEvent`
    /// envelope wrapping a type-tagged payload.
    Protobuf,
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Protobuf => f.write_str("protobuf"),
        }
    }
}

/// Returned when a string names no known [`WireFormat`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown wire format {0:?} (expected \"json\" or \"protobuf\")")]
pub struct ParseFormatError(String);

impl FromStr for WireFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "text" => Ok(Self::Json),
            "protobuf" | "proto" | "binary" => Ok(Self::Protobuf),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}
