//! Application hooks that receive decoded events.

use livewire_protocol::DecodedEvent;

/// Receives every successfully decoded message.
///
/// Called synchronously from the connection's dispatch loop, once per
/// decoded message, before the next message is read. Messages that fail
/// to decode never reach the sink.
///
/// Any `Fn(&str, DecodedEvent)` closure is a sink, which keeps tests and
/// small embedders free of boilerplate:
///
/// ```rust
/// use livewire::EventSink;
///
/// let sink = |peer: &str, event: livewire_protocol::DecodedEvent| {
///     println!("{peer}: {event}");
/// };
/// # fn assert_sink<S: EventSink>(_: &S) {}
/// # assert_sink(&sink);
/// ```
pub trait EventSink: Send + Sync + 'static {
    /// Handles one decoded event from the connection labelled `peer`.
    fn deliver(&self, peer: &str, event: DecodedEvent);
}

impl<F> EventSink for F
where
    F: Fn(&str, DecodedEvent) + Send + Sync + 'static,
{
    fn deliver(&self, peer: &str, event: DecodedEvent) {
        self(peer, event)
    }
}

/// Prints each event on its own line to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn deliver(&self, peer: &str, event: DecodedEvent) {
        tracing::trace!(peer, format = %event.format(), "event delivered");
        println!("{event}");
    }
}
