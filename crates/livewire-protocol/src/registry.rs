//! Static mapping from payload type tags to decode functions.
//!
//! A LiveAPI envelope names its payload with a `google.protobuf.Any` type
//! URL such as `type.googleapis.com/rtech.liveapi.PlayerKilled`. The
//! registry is built once at startup and maps the type name (everything
//! after the last `/`) to a plain function pointer that decodes the
//! embedded bytes. A tag with no entry is an ordinary decode failure,
//! never a panic.

use std::collections::HashMap;

use prost_types::Any;

use crate::events::{register_builtins, GameMessage, LiveApiPayload};
use crate::ProtocolError;

/// Decodes the embedded bytes of one payload type.
pub type DecodeFn = fn(&[u8]) -> Result<GameMessage, prost::DecodeError>;

fn decode_as<M: LiveApiPayload>(bytes: &[u8]) -> Result<GameMessage, prost::DecodeError> {
    M::decode(bytes).map(Into::into)
}

/// Extracts the fully qualified type name from an `Any` type URL.
///
/// `"type.googleapis.com/rtech.liveapi.Init"` → `"rtech.liveapi.Init"`.
/// A URL without a `/` is returned unchanged.
pub fn type_name_of(type_url: &str) -> &str {
    match type_url.rfind('/') {
        Some(idx) => &type_url[idx + 1..],
        None => type_url,
    }
}

/// The table of payload types the protobuf decoder can unpack.
#[derive(Clone, Default)]
pub struct PayloadRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl PayloadRegistry {
    /// Creates an empty registry. Every payload is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in LiveAPI payload.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }

    /// Registers payload type `M` under its [`LiveApiPayload::TYPE_NAME`].
    pub fn register<M: LiveApiPayload>(&mut self) -> &mut Self {
        self.decoders.insert(M::TYPE_NAME, decode_as::<M>);
        self
    }

    /// Returns `true` if `type_name` (not a URL) has a decoder.
    pub fn contains(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    /// Number of registered payload types.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Returns `true` if no payload type is registered.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Looks up the decoder for a type URL.
    pub fn resolve(&self, type_url: &str) -> Option<DecodeFn> {
        self.decoders.get(type_name_of(type_url)).copied()
    }

    /// Resolves `any`'s type and decodes its value into that type.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownPayloadType`] if the tag is not registered,
    /// [`ProtocolError::Payload`] if the bytes don't decode as that type.
    pub fn unpack(&self, any: &Any) -> Result<GameMessage, ProtocolError> {
        let decode = self
            .resolve(&any.type_url)
            .ok_or_else(|| ProtocolError::UnknownPayloadType(any.type_url.clone()))?;
        decode(&any.value).map_err(|source| ProtocolError::Payload {
            type_name: type_name_of(&any.type_url).to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for PayloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("PayloadRegistry").field("types", &names).finish()
    }
}
