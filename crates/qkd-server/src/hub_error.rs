//! Session hub error types.
//!
//! Provides strongly-typed errors for hub operations:
//! - Observer delivery (send to a single connection)
//! - Event routing (events for unknown observers)
//! - Configuration validation

use thiserror::Error;

use crate::registry::ObserverId;

/// A send to one observer failed.
///
/// Never surfaced past the hub: the failing observer is removed from the
/// registry and the broadcast continues with the rest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection behind the observer is gone.
    #[error("observer connection closed")]
    Closed,

    /// The connection refused the message.
    #[error("send rejected: {0}")]
    Rejected(String),
}

/// Errors that can occur while processing hub events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Event for an observer that is not registered.
    ///
    /// Occurs when text arrives after the observer was dropped (disconnect or
    /// failed send). Transient - the client can reconnect.
    #[error("observer not found: {0}")]
    ObserverNotFound(ObserverId),
}

/// Invalid hub configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Runs execute inline on the runtime, so their size is capped.
    #[error("bit count {bit_count} exceeds maximum {max}")]
    BitCountTooLarge {
        /// Requested qubits per run
        bit_count: usize,
        /// Configured cap
        max: usize,
    },
}
