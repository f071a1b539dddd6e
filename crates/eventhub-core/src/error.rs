//! Error types for channel and registry operations.

use thiserror::Error;

use crate::listener::ListenerId;

/// Error produced by a failing listener callback.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// A listener failed while the channel was emitting.
    ///
    /// Only returned under [`EmitPolicy::Propagate`](crate::EmitPolicy::Propagate).
    #[error("listener {listener} failed on channel '{channel}': {source}")]
    ListenerFailed {
        channel: String,
        listener: ListenerId,
        #[source]
        source: ListenerError,
    },

    /// The event name is already bound to a channel with another payload type.
    #[error("channel '{name}' carries {found}, not {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Lock poisoned (thread panicked while holding lock).
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result type alias for event operations.
pub type Result<T> = std::result::Result<T, EventError>;
