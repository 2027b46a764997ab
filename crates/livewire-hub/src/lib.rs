//! Connection membership for Livewire.
//!
//! This crate tracks which connections are currently live and fans
//! messages out to all of them:
//!
//! 1. **Membership** — the [`Registry`] admits and evicts connections
//! 2. **Broadcast** — [`Registry::broadcast`] sends one text message to a
//!    snapshot of the current members
//! 3. **Lifecycle notices** — [`Registry::join`] / [`Registry::leave`]
//!    pair each membership change with a [`Notice`], and [`MemberGuard`]
//!    makes sure every join is eventually matched by a leave
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher (above)  ← joins on connect, leaves on stream end
//!     ↕
//! Hub (this crate)    ← owns the membership set, performs broadcasts
//!     ↕
//! Transport (below)   ← provides Connection, ConnectionId
//! ```

mod guard;
mod notice;
mod registry;

pub use guard::MemberGuard;
pub use notice::Notice;
pub use registry::{BroadcastReport, Registry};
