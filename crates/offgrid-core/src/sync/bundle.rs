//! Bundles: the unit carried between devices
//!
//! A [`Bundle`] is a snapshot of one device's forwardable messages plus its
//! whole ack set. It travels as a single line of text so it survives copy and
//! paste, QR codes, chat apps and plain files.
//!
//! ## Wire Format
//!
//! ```text
//! base64( utf8( json ) )
//!
//! { "from": "1a2b3c4d", "ts": 1700000000,
//!   "msgs": [ { "id": "1234...", "from": "...", "to": "0", "ts": 1700000000,
//!               "ttl": 6, "prio": 2, "type": 1, "body": "...", "inbox": false } ],
//!   "acks": [ "5678..." ] }
//! ```
//!
//! `msgs` and `acks` may be omitted and decode as empty. `inbox` is carried
//! but ignored by the receiver.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::config::ZeroTtlPolicy;
use crate::error::{RelayError, RelayResult};
use crate::types::{now_secs, DeviceId, Message, MessageId, MAX_BODY_CHARS};

/// A batch of messages and acks exported by one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Exporting device
    pub from: DeviceId,
    /// Unix timestamp (seconds) of the export
    pub ts: i64,
    #[serde(default)]
    pub msgs: Vec<Message>,
    #[serde(default)]
    pub acks: Vec<MessageId>,
}

impl Bundle {
    /// Create a bundle stamped with the current time.
    pub fn new(from: DeviceId, msgs: Vec<Message>, acks: Vec<MessageId>) -> Self {
        Self {
            from,
            ts: now_secs(),
            msgs,
            acks,
        }
    }

    /// Encode to a transport string.
    pub fn encode(&self) -> RelayResult<String> {
        let json = serde_json::to_string(self).map_err(|e| RelayError::Encode(e.to_string()))?;
        Ok(STANDARD.encode(json.as_bytes()))
    }

    /// Decode a transport string.
    ///
    /// Whitespace anywhere in the input is ignored, so wrapped or indented
    /// pastes still decode.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Decode` if the input is not base64, not UTF-8,
    /// not a bundle, or carries a message that breaks the wire rules.
    pub fn decode(input: &str) -> RelayResult<Self> {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(RelayError::Decode("empty input".to_string()));
        }

        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| RelayError::Decode(format!("not base64: {}", e)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| RelayError::Decode(format!("not UTF-8: {}", e)))?;
        let bundle: Bundle = serde_json::from_str(&json)
            .map_err(|e| RelayError::Decode(format!("not a bundle: {}", e)))?;

        bundle.validate()?;
        Ok(bundle)
    }

    fn validate(&self) -> RelayResult<()> {
        if self.from.as_str().is_empty() {
            return Err(RelayError::Decode("bundle has an empty sender".to_string()));
        }
        for msg in &self.msgs {
            if msg.from.as_str().is_empty() || msg.to.as_str().is_empty() {
                return Err(RelayError::Decode(format!(
                    "message {} has an empty address",
                    msg.id
                )));
            }
            if msg.body_chars() > MAX_BODY_CHARS {
                return Err(RelayError::Decode(format!(
                    "message {} body is {} characters, the limit is {}",
                    msg.id,
                    msg.body_chars(),
                    MAX_BODY_CHARS
                )));
            }
        }
        Ok(())
    }
}

/// Whether a stored message goes into the next export.
///
/// Anything not delivered here is forwarded, and SOS messages are forwarded
/// even after delivery. The zero-ttl policy has the last word.
pub fn is_export_eligible(message: &Message, policy: ZeroTtlPolicy) -> bool {
    (!message.inbox || message.is_sos()) && policy.allows_export(message.ttl)
}

/// Pick the messages that go into an export.
pub fn select_for_export(messages: Vec<Message>, policy: ZeroTtlPolicy) -> Vec<Message> {
    messages
        .into_iter()
        .filter(|m| is_export_eligible(m, policy))
        .collect()
}
