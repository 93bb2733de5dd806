//! Core types for OffGrid Relay

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Recipient value meaning "addressed to any receiver".
pub const BROADCAST: &str = "0";

/// Maximum message body length, in characters.
pub const MAX_BODY_CHARS: usize = 280;

/// Hop budget given to locally created messages.
pub const DEFAULT_TTL: u32 = 6;

/// Priority used for SOS messages.
pub const SOS_PRIORITY: i32 = 2;

/// Current unix time in seconds.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Unique identifier for a message
///
/// 64 random bits. On the wire and in the CLI it is always the decimal
/// rendering of the integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MessageId(pub u64);

impl MessageId {
    /// Draw a new random MessageId
    pub fn random() -> Self {
        Self(rand::rng().next_u64())
    }

    /// Get the raw integer value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for MessageId {
    type Error = std::num::ParseIntError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Identifier of a device taking part in the relay.
///
/// Locally generated ids are 32 random bits rendered as exactly eight
/// lowercase hex digits. Ids received from other devices are opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap an existing id string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Draw a fresh device id from the random source
    pub fn generate() -> Self {
        Self(format!("{:08x}", rand::rng().next_u32()))
    }

    /// The broadcast sentinel
    pub fn broadcast() -> Self {
        Self(BROADCAST.to_string())
    }

    /// Parse a user-supplied recipient. Blank input means broadcast.
    pub fn recipient_or_broadcast(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            Self::broadcast()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == BROADCAST
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a message. Encoded on the wire as 0, 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MessageKind {
    Text,
    Sos,
    Ack,
}

impl MessageKind {
    /// Short tag shown in front of a rendered message
    pub fn tag(&self) -> &'static str {
        match self {
            MessageKind::Text => "",
            MessageKind::Sos => "[SOS]",
            MessageKind::Ack => "[ACK]",
        }
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Text => 0,
            MessageKind::Sos => 1,
            MessageKind::Ack => 2,
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageKind::Text),
            1 => Ok(MessageKind::Sos),
            2 => Ok(MessageKind::Ack),
            other => Err(format!("unknown message type {}", other)),
        }
    }
}

/// A relayed message.
///
/// The same struct is stored locally and carried in bundles. `inbox` is
/// local classification only; whatever a sender put there is overwritten
/// on merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: DeviceId,
    pub to: DeviceId,
    /// Unix timestamp (seconds) of creation on the sending device
    pub ts: i64,
    /// Remaining hop budget
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub prio: i32,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub inbox: bool,
}

impl Message {
    /// Create a new outgoing message with a random id, stamped now.
    ///
    /// The message starts in the outbox (`inbox == false`).
    pub fn new_outgoing(
        from: DeviceId,
        to: DeviceId,
        kind: MessageKind,
        body: String,
        prio: i32,
        ttl: u32,
    ) -> Self {
        Self {
            id: MessageId::random(),
            from,
            to,
            ts: now_secs(),
            ttl,
            prio,
            kind,
            body,
            inbox: false,
        }
    }

    /// Whether this message belongs in the inbox of `device`
    /// (addressed to it directly or broadcast).
    pub fn is_for(&self, device: &DeviceId) -> bool {
        self.to == *device || self.to.is_broadcast()
    }

    /// Whether this message is addressed to `device` personally.
    pub fn is_direct_to(&self, device: &DeviceId) -> bool {
        !self.to.is_broadcast() && self.to == *device
    }

    pub fn is_sos(&self) -> bool {
        self.kind == MessageKind::Sos
    }

    /// Body length in characters
    pub fn body_chars(&self) -> usize {
        self.body.chars().count()
    }
}
