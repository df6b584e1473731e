//! Session limits shared by both ends of a Tandem channel.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default upper bound on a single ciphertext on the wire (16 MiB).
pub const DEFAULT_MAX_MESSAGE_LEN: u32 = 16 * 1024 * 1024;

/// Limits applied to an established session.
///
/// Both fields have serde defaults, so an empty JSON object is a valid
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Largest ciphertext accepted by `receive` or emitted by `send`.
    ///
    /// The length prefix is read from an untrusted peer; anything above this
    /// is rejected before a buffer is allocated.
    pub max_message_len: u32,

    /// Number of messages a session may send under one set of keys.
    pub max_messages_per_key: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_messages_per_key: u32::MAX,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a configuration from JSON.
    pub fn from_json(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the limits leave room for at least one message.
    pub fn validate(&self) -> Result<()> {
        if self.max_message_len == 0 {
            return Err(Error::config("max_message_len must be non-zero"));
        }
        if self.max_messages_per_key == 0 {
            return Err(Error::config("max_messages_per_key must be non-zero"));
        }
        Ok(())
    }
}
