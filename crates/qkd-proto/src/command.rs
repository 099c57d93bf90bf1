//! Inbound commands from observer connections.

use serde::{Deserialize, Deserializer, Serialize};

use crate::ProtocolError;

/// A request sent by an observer.
///
/// JSON object tagged by `action`. Actions this relay does not know decode
/// to [`ClientCommand::Unknown`] rather than failing, so newer clients can
/// talk to older servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientCommand {
    /// Run one BB84 exchange and broadcast its stages to every observer.
    #[serde(rename = "START_KEY_GEN")]
    StartKeyGen {
        /// Whether Eve intercepts the run. Missing or `null` means no.
        #[serde(default, deserialize_with = "null_as_false")]
        hacker: bool,
    },

    /// Any other action.
    #[serde(other)]
    Unknown,
}

impl ClientCommand {
    /// Decode a command from a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}
