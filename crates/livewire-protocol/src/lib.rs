//! Wire formats for Livewire.
//!
//! This crate knows how to turn the raw bytes a client sends into
//! something the application can look at:
//!
//! - **Formats** ([`WireFormat`]) — the process-wide choice between the
//!   text format (JSON) and the binary format (protobuf LiveAPI envelopes).
//! - **Decoders** ([`Decoder`] trait, [`JsonDecoder`], [`ProtobufDecoder`],
//!   [`WireDecoder`]) — one strategy per format.
//! - **Payloads** ([`LiveApiEvent`], [`GameMessage`], [`PayloadRegistry`]) —
//!   the envelope, the known concrete payload types, and the static table
//!   that maps a payload type tag to its decode function.
//! - **Errors** ([`ProtocolError`]) — every way a message can fail to decode.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the dispatcher
//! (application hook). It doesn't know about connections or membership —
//! it only knows how to decode one message at a time.
//!
//! ```text
//! Transport (bytes) → Protocol (DecodedEvent) → Dispatcher → EventSink
//! ```

mod codec;
mod error;
mod events;
mod format;
mod raw;
mod registry;

pub use codec::{DecodedEvent, Decoder, JsonDecoder, ProtobufDecoder, WireDecoder};
pub use error::ProtocolError;
pub use events::{
    GameMessage, Init, LiveApiEvent, LiveApiPayload, MatchStateEnd, Player,
    PlayerConnected, PlayerDisconnected, PlayerKilled, PACKAGE,
};
pub use format::{ParseFormatError, WireFormat};
pub use raw::RawMessage;
pub use registry::{type_name_of, DecodeFn, PayloadRegistry};

/// Re-exported so callers can build envelopes without naming `prost_types`.
pub use prost_types::Any;
