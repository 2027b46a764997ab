//! Decoder trait and the two decode strategies.
//!
//! A decoder turns one raw inbound message into a [`DecodedEvent`]. The
//! dispatcher doesn't care HOW a message is decoded — it just needs
//! something that implements [`Decoder`]. This is the "strategy pattern":
//! one interface, one implementation per [`WireFormat`], picked once at
//! startup.
//!
//! - [`JsonDecoder`] — text-structured messages, parsed into a generic
//!   `serde_json::Value`.
//! - [`ProtobufDecoder`] — binary LiveAPI envelopes, unpacked into a
//!   concrete [`GameMessage`] through a [`PayloadRegistry`].
//! - [`WireDecoder`] — either of the above, chosen from a [`WireFormat`].

use std::fmt;

use prost::Message;

use crate::{GameMessage, LiveApiEvent, PayloadRegistry, ProtocolError, WireFormat};

/// The result of successfully decoding one inbound message.
///
/// Handed to the application hook exactly once and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    /// A concrete payload unpacked from a binary envelope.
    Game(GameMessage),
    /// A generic parsed text document.
    Json(serde_json::Value),
}

impl DecodedEvent {
    /// The wire format this event was decoded from.
    pub fn format(&self) -> WireFormat {
        match self {
            Self::Game(_) => WireFormat::Protobuf,
            Self::Json(_) => WireFormat::Json,
        }
    }
}

impl fmt::Display for DecodedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Game(msg) => fmt::Display::fmt(msg, f),
            Self::Json(value) => fmt::Display::fmt(value, f),
        }
    }
}

/// A decode strategy for one wire format.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → one decoder is shared by every connection task, and
///   Tokio may run those tasks on any thread of its pool.
/// - `'static` → the decoder owns everything it needs (e.g. its payload
///   registry), so it can live inside long-running tasks.
pub trait Decoder: Send + Sync + 'static {
    /// The wire format this decoder understands.
    fn format(&self) -> WireFormat;

    /// Decodes one raw message.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] describing why the message is unusable.
    /// A failed decode never leaves a partially-built value behind.
    fn decode(&self, data: &[u8]) -> Result<DecodedEvent, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonDecoder
// ---------------------------------------------------------------------------

/// A [`Decoder`] for text-structured (JSON) messages.
///
/// ## Example
///
/// ```rust
/// use livewire_protocol::{DecodedEvent, Decoder, JsonDecoder};
///
/// let event = JsonDecoder.decode(br#"{"category":"init"}"#).unwrap();
/// match event {
///     DecodedEvent::Json(value) => assert_eq!(value["category"], "init"),
///     other => panic!("unexpected {other:?}"),
/// }
///
/// assert!(JsonDecoder.decode(b"{not json").is_err());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn format(&self) -> WireFormat {
        WireFormat::Json
    }

    fn decode(&self, data: &[u8]) -> Result<DecodedEvent, ProtocolError> {
        serde_json::from_slice(data)
            .map(DecodedEvent::Json)
            .map_err(ProtocolError::Json)
    }
}

// ---------------------------------------------------------------------------
// ProtobufDecoder
// ---------------------------------------------------------------------------

/// A [`Decoder`] for binary LiveAPI envelopes.
///
/// Decoding happens in three steps, and each one can fail on its own:
///
/// 1. parse the bytes as a [`LiveApiEvent`] envelope,
/// 2. resolve the embedded payload's type tag in the registry,
/// 3. decode the embedded bytes as that concrete type.
///
/// Nothing from a step that failed is looked at by a later step.
#[derive(Debug, Clone)]
pub struct ProtobufDecoder {
    registry: PayloadRegistry,
}

impl ProtobufDecoder {
    /// Creates a decoder over the given payload table.
    pub fn new(registry: PayloadRegistry) -> Self {
        Self { registry }
    }

    /// The payload table this decoder resolves type tags against.
    pub fn registry(&self) -> &PayloadRegistry {
        &self.registry
    }
}

impl Default for ProtobufDecoder {
    fn default() -> Self {
        Self::new(PayloadRegistry::with_defaults())
    }
}

impl Decoder for ProtobufDecoder {
    fn format(&self) -> WireFormat {
        WireFormat::Protobuf
    }

    fn decode(&self, data: &[u8]) -> Result<DecodedEvent, ProtocolError> {
        let envelope = LiveApiEvent::decode(data).map_err(ProtocolError::Envelope)?;
        let payload = envelope
            .game_message
            .ok_or(ProtocolError::MissingPayload)?;
        self.registry.unpack(&payload).map(DecodedEvent::Game)
    }
}

// ---------------------------------------------------------------------------
// WireDecoder
// ---------------------------------------------------------------------------

/// The decoder selected by a [`WireFormat`] at startup.
#[derive(Debug, Clone)]
pub enum WireDecoder {
    Json(JsonDecoder),
    Protobuf(ProtobufDecoder),
}

impl From<WireFormat> for WireDecoder {
    fn from(format: WireFormat) -> Self {
        match format {
            WireFormat::Json => Self::Json(JsonDecoder),
            WireFormat::Protobuf => Self::Protobuf(ProtobufDecoder::default()),
        }
    }
}

impl Decoder for WireDecoder {
    fn format(&self) -> WireFormat {
        match self {
            Self::Json(d) => d.format(),
            Self::Protobuf(d) => d.format(),
        }
    }

    fn decode(&self, data: &[u8]) -> Result<DecodedEvent, ProtocolError> {
        match self {
            Self::Json(d) => d.decode(data),
            Self::Protobuf(d) => d.decode(data),
        }
    }
}
