//! Wire protocol for the QKD relay.
//!
//! Every message on an observer connection is a JSON text frame:
//!
//! - inbound, [`ClientCommand`], tagged by `action`
//! - outbound, [`StageMessage`], tagged by `status`
//!
//! The [`http`] module holds the JSON bodies of the plain HTTP endpoints.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod error;
pub mod http;
mod stage;

pub use command::ClientCommand;
pub use error::ProtocolError;
pub use stage::{StageMessage, StageStatus};
