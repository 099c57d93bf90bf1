//! Deterministic simulation harness for QKD relay testing.
//!
//! Seeded implementations of the `Environment` and `Observer` traits so hub
//! behavior can be replayed exactly: the same seed produces the same observer
//! IDs, the same qubits and the same keys, and virtual time means a one
//! second stage delay costs nothing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod sim_env;
pub mod sim_observer;

use std::sync::Arc;

use qkd_server::{HubConfig, SessionHub};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_observer::SimObserver;

/// Hub driven entirely by simulation types.
pub type SimHub = SessionHub<SimEnv, SimObserver>;

/// Build a shared hub over a seeded environment.
pub fn create_sim_hub(seed: u64, config: HubConfig) -> Arc<SimHub> {
    Arc::new(SessionHub::new(SimEnv::with_seed(seed), config))
}
