//! Outbound stage messages broadcast to every observer.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Text announcing a run under interception.
const ATTACK_MODE_TEXT: &str = "⚠️ INTERCEPTING PHOTONS...";

/// Text announcing a run on a clean channel.
const NORMAL_MODE_TEXT: &str = "Aligning Polarizers...";

/// Stage of a protocol run as seen by observers.
///
/// JSON object tagged by `status`:
///
/// ```json
/// {"status":"initializing","message":"Aligning Polarizers..."}
/// {"status":"complete","key":"0110","qber":0.0,"message":"Key Generated. QBER: 0.0%"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageMessage {
    /// A run has started.
    Initializing {
        /// Human-readable stage text. Differs between attack and normal mode.
        message: String,
    },

    /// A run has finished.
    Complete {
        /// Sifted key as a string of `0` and `1`.
        key: String,
        /// Quantum bit error rate in percent, two decimals.
        qber: f64,
        /// Human-readable summary including the QBER.
        message: String,
    },
}

/// Discriminant of a [`StageMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// See [`StageMessage::Initializing`].
    Initializing,
    /// See [`StageMessage::Complete`].
    Complete,
}

impl StageMessage {
    /// First stage of a run. The text tells observers whether Eve is on the
    /// channel.
    pub fn initializing(eavesdropper: bool) -> Self {
        let text = if eavesdropper { ATTACK_MODE_TEXT } else { NORMAL_MODE_TEXT };
        Self::Initializing { message: text.to_string() }
    }

    /// Final stage of a run carrying the sifted key and its error rate.
    pub fn complete(key: String, qber: f64) -> Self {
        let message = format!("Key Generated. QBER: {}%", qber_text(qber, !key.is_empty()));
        Self::Complete { key, qber, message }
    }

    /// Which stage this message announces.
    pub fn status(&self) -> StageStatus {
        match self {
            Self::Initializing { .. } => StageStatus::Initializing,
            Self::Complete { .. } => StageStatus::Complete,
        }
    }

    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decode from a text frame.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// Rate as shown to observers.
///
/// A measured rate always carries a fractional part (`25.0`, `12.5`). A run
/// with nothing sifted has no measured rate and shows a bare `0`.
fn qber_text(qber: f64, sifted: bool) -> String {
    if sifted && qber.is_finite() && qber.fract() == 0.0 {
        format!("{qber:.1}")
    } else {
        format!("{qber}")
    }
}
