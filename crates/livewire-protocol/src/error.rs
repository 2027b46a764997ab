//! Error types for the protocol layer.
//!
//! Every variant here is a decode failure for exactly one inbound message.
//! None of them is fatal to the connection that sent it: the dispatcher
//! logs the error and moves on to the next message.

/// Errors that can occur while decoding an inbound message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The text payload is not valid JSON.
    #[error("malformed text message: {0}")]
    Json(#[source] serde_json::Error),

    /// The bytes are not a valid LiveAPI envelope.
    #[error("malformed envelope: {0}")]
    Envelope(#[source] prost::DecodeError),

    /// The envelope parsed but carries no embedded game message.
    #[error("envelope carries no game message")]
    MissingPayload,

    /// The payload type tag does not resolve to any registered type.
    ///
    /// Holds the full type URL as it appeared on the wire.
    #[error("unknown payload type: {0:?}")]
    UnknownPayloadType(String),

    /// The type resolved, but the embedded bytes are not a valid instance.
    #[error("malformed {type_name} payload: {source}")]
    Payload {
        type_name: String,
        #[source]
        source: prost::DecodeError,
    },
}
