//! Unified error type for the Livewire relay.

use livewire_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `livewire` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
///
/// Per-message decode failures never surface here: the dispatcher logs
/// and drops them. This type only carries errors that stop the server
/// itself, such as failing to bind.
#[derive(Debug, thiserror::Error)]
pub enum LivewireError {
    /// A transport-level error (bind, accept, shutdown).
    #[error(transparent)]
    Transport(#[from] TransportError),
}
