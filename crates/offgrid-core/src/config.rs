//! Relay configuration
//!
//! Policies that decide the open edges of the protocol: what happens to
//! bodies over the length cap, and whether a message whose hop budget is
//! spent keeps circulating.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};
use crate::types::{DEFAULT_TTL, MAX_BODY_CHARS};

/// What to do with a message whose `ttl` has reached zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroTtlPolicy {
    /// Still merged, stored and delivered locally, but never exported again.
    StopForwarding,
    /// Exported like any other message. Zero-ttl messages circulate forever.
    KeepForwarding,
}

/// Zero-ttl messages stop circulating once their hop budget is spent.
pub const DEFAULT_ZERO_TTL_POLICY: ZeroTtlPolicy = ZeroTtlPolicy::StopForwarding;

impl ZeroTtlPolicy {
    /// Whether a message with the given ttl may be put into an export.
    pub fn allows_export(&self, ttl: u32) -> bool {
        match self {
            ZeroTtlPolicy::StopForwarding => ttl > 0,
            ZeroTtlPolicy::KeepForwarding => true,
        }
    }
}

/// What to do with a locally composed body longer than the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPolicy {
    /// Refuse the message with a validation error
    Reject,
    /// Cut the body down to the cap
    Truncate,
}

/// Configuration for a [`RelayEngine`](crate::RelayEngine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Hop budget for locally created messages
    pub default_ttl: u32,
    /// Maximum body length in characters
    pub max_body_chars: usize,
    pub body_policy: BodyPolicy,
    pub zero_ttl_policy: ZeroTtlPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            max_body_chars: MAX_BODY_CHARS,
            body_policy: BodyPolicy::Reject,
            zero_ttl_policy: DEFAULT_ZERO_TTL_POLICY,
        }
    }
}

impl RelayConfig {
    /// Apply the body policy to a composed body.
    pub fn prepare_body(&self, body: &str) -> RelayResult<String> {
        let len = body.chars().count();
        if len <= self.max_body_chars {
            return Ok(body.to_string());
        }
        match self.body_policy {
            BodyPolicy::Reject => Err(RelayError::Validation(format!(
                "message body is {} characters, the limit is {}",
                len, self.max_body_chars
            ))),
            BodyPolicy::Truncate => Ok(body.chars().take(self.max_body_chars).collect()),
        }
    }
}
