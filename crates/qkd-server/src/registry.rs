//! Observer registry for broadcast fan-out.
//!
//! The registry maps observer IDs to the handles used to reach them. It is
//! plain data: the hub owns one behind a lock and never holds that lock
//! across a send. Broadcasts iterate a [`snapshot`](ObserverRegistry::snapshot)
//! so removing a failed observer mid-broadcast cannot skip or duplicate
//! delivery to the others.

use std::{collections::HashMap, fmt, future::Future};

use qkd_proto::StageMessage;

use crate::hub_error::TransportError;

/// Identity of one connected observer.
///
/// Assigned by the runtime when the connection is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Wrap a raw ID.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw ID.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A connected client that receives stage messages.
///
/// Clones are cheap and reach the same connection; the hub clones handles
/// out of the registry so no lock is held while a send is in flight.
pub trait Observer: Clone + Send + Sync + 'static {
    /// Deliver one message.
    ///
    /// An error means this observer is unreachable. The hub drops it.
    fn send(
        &self,
        message: &StageMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Registry of live observers.
#[derive(Debug)]
pub struct ObserverRegistry<O> {
    observers: HashMap<ObserverId, O>,
}

impl<O> Default for ObserverRegistry<O> {
    fn default() -> Self {
        Self { observers: HashMap::new() }
    }
}

impl<O: Clone> ObserverRegistry<O> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    ///
    /// Returns `false` and leaves the existing entry untouched if the ID is
    /// already registered.
    pub fn register(&mut self, observer_id: ObserverId, observer: O) -> bool {
        if self.observers.contains_key(&observer_id) {
            return false;
        }

        self.observers.insert(observer_id, observer);
        true
    }

    /// Remove an observer. `None` if it was not registered.
    pub fn unregister(&mut self, observer_id: ObserverId) -> Option<O> {
        self.observers.remove(&observer_id)
    }

    /// Check if an observer is registered.
    pub fn contains(&self, observer_id: ObserverId) -> bool {
        self.observers.contains_key(&observer_id)
    }

    /// Copy of every registration, in no particular order.
    pub fn snapshot(&self) -> Vec<(ObserverId, O)> {
        self.observers.iter().map(|(id, observer)| (*id, observer.clone())).collect()
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
