//! LiveAPI protobuf messages.
//!
//! The binary format is the game's LiveAPI stream: every message on the
//! wire is a [`LiveApiEvent`] envelope whose `game_message` is a
//! `google.protobuf.Any` holding one concrete payload. The field layouts
//! below mirror the `rtech.liveapi` package for the payloads the relay
//! understands out of the box; any other type tag is a decode failure.
//!
//! The structs use `prost`'s derive directly rather than `prost-build`,
//! so there is no build script and no `protoc` requirement.

use std::fmt;

/// Protobuf package every built-in payload lives in.
pub const PACKAGE: &str = "rtech.liveapi";

/// The outer envelope of every binary message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LiveApiEvent {
    #[prost(fixed32, tag = "1")]
    pub event_size: u32,
    #[prost(message, optional, tag = "3")]
    pub game_message: Option<::prost_types::Any>,
}

/// A player as it appears inside other payloads.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Player {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint32, tag = "2")]
    pub team_id: u32,
    #[prost(string, tag = "3")]
    pub team_name: String,
    #[prost(string, tag = "4")]
    pub character: String,
    #[prost(uint32, tag = "5")]
    pub current_health: u32,
    #[prost(uint32, tag = "6")]
    pub shield_health: u32,
}

/// First message of every stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Init {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(string, tag = "2")]
    pub category: String,
    #[prost(string, tag = "3")]
    pub game_version: String,
    #[prost(string, tag = "4")]
    pub platform: String,
    #[prost(string, tag = "5")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlayerConnected {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(string, tag = "2")]
    pub category: String,
    #[prost(message, optional, tag = "3")]
    pub player: Option<Player>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlayerDisconnected {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(string, tag = "2")]
    pub category: String,
    #[prost(message, optional, tag = "3")]
    pub player: Option<Player>,
    #[prost(bool, tag = "4")]
    pub can_reconnect: bool,
    #[prost(bool, tag = "5")]
    pub is_alive: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlayerKilled {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(string, tag = "2")]
    pub category: String,
    #[prost(message, optional, tag = "3")]
    pub attacker: Option<Player>,
    #[prost(message, optional, tag = "4")]
    pub victim: Option<Player>,
    #[prost(message, optional, tag = "5")]
    pub awarded_to: Option<Player>,
    #[prost(string, tag = "6")]
    pub weapon: String,
}

/// Last message of a match.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MatchStateEnd {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(string, tag = "2")]
    pub category: String,
    #[prost(string, tag = "3")]
    pub state: String,
    #[prost(message, repeated, tag = "4")]
    pub winners: Vec<Player>,
}

/// A concrete payload type that can travel inside a [`LiveApiEvent`].
///
/// `TYPE_NAME` is the fully qualified protobuf name, which is what the
/// `Any` type URL ends with.
pub trait LiveApiPayload: ::prost::Message + Default + Into<GameMessage> + Sized {
    const TYPE_NAME: &'static str;

    /// Wraps `self` into an envelope-ready `Any`.
    fn to_any(&self) -> ::prost_types::Any {
        ::prost_types::Any {
            type_url: format!("type.googleapis.com/{}", Self::TYPE_NAME),
            value: self.encode_to_vec(),
        }
    }
}

macro_rules! game_messages {
    ($($name:ident),* $(,)?) => {
        /// One unpacked LiveAPI payload: the tagged union of every built-in
        /// payload type.
        #[derive(Debug, Clone, PartialEq)]
        pub enum GameMessage {
            $($name($name),)*
        }

        impl GameMessage {
            /// Fully qualified protobuf name of the payload.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $(Self::$name(_) => <$name as LiveApiPayload>::TYPE_NAME,)*
                }
            }
        }

        $(
            impl LiveApiPayload for $name {
                const TYPE_NAME: &'static str =
                    concat!("rtech.liveapi.", stringify!($name));
            }

            impl From<$name> for GameMessage {
                fn from(msg: $name) -> Self {
                    Self::$name(msg)
                }
            }
        )*

        pub(crate) fn register_builtins(registry: &mut crate::PayloadRegistry) {
            $(registry.register::<$name>();)*
        }
    };
}

game_messages!(
    Init,
    PlayerConnected,
    PlayerDisconnected,
    PlayerKilled,
    MatchStateEnd,
);

impl fmt::Display for GameMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.type_name().rsplit('.').next().unwrap_or_default();
        match self {
            Self::Init(m) => write!(f, "{name} {m:?}"),
            Self::PlayerConnected(m) => write!(f, "{name} {m:?}"),
            Self::PlayerDisconnected(m) => write!(f, "{name} {m:?}"),
            Self::PlayerKilled(m) => write!(f, "{name} {m:?}"),
            Self::MatchStateEnd(m) => write!(f, "{name} {m:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_type_names_live_in_the_liveapi_package() {
        assert_eq!(Init::TYPE_NAME, "rtech.liveapi.Init");
        assert!(PlayerKilled::TYPE_NAME.starts_with(PACKAGE));
    }

    #[test]
    fn test_to_any_uses_google_type_url() {
        let any = Init::default().to_any();
        assert_eq!(any.type_url, "type.googleapis.com/rtech.liveapi.Init");
    }

    #[test]
    fn test_game_message_reports_its_type() {
        let msg: GameMessage = MatchStateEnd {
            state: "Postmatch".into(),
            ..Default::default()
        }
        .into();
        assert_eq!(msg.type_name(), "rtech.liveapi.MatchStateEnd");
        assert!(msg.to_string().starts_with("MatchStateEnd "));
    }

    #[test]
    fn test_envelope_wire_layout() {
        let event = LiveApiEvent {
            event_size: 7,
            game_message: Some(Init::default().to_any()),
        };
        let bytes = event.encode_to_vec();
        // fixed32 field 1 → key 0x0d, four little-endian bytes.
        assert_eq!(&bytes[..5], &[0x0d, 7, 0, 0, 0]);
        // message field 3 → key 0x1a.
        assert_eq!(bytes[5], 0x1a);
    }
}
