//! Core logic for the QKD relay.
//!
//! Pure, I/O-free building blocks shared by the server and the simulation
//! harness:
//!
//! - [`bb84`]: the BB84 engine. A pure function from parameters and a random
//!   source to a [`ProtocolRun`].
//! - [`env`]: the [`Environment`] abstraction that decouples time and
//!   randomness from the system, so runs can be replayed from a seed.
//!
//! Nothing in this crate knows about observers, sockets or storage.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bb84;
pub mod env;

pub use bb84::{Basis, Bb84Config, DEFAULT_BIT_COUNT, ProtocolRun, simulate};
pub use env::{EnvRng, Environment};
