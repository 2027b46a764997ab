use std::fmt;

/// A lifecycle announcement sent to every member.
///
/// Rendered as plain text: `"<peer> connected"` or `"<peer> disconnected"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice<'a> {
    Connected(&'a str),
    Disconnected(&'a str),
}

impl fmt::Display for Notice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(peer) => write!(f, "{peer} connected"),
            Self::Disconnected(peer) => write!(f, "{peer} disconnected"),
        }
    }
}
