//! Protocol error type.

use thiserror::Error;

/// Result type alias using the protocol error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while establishing or using a session.
///
/// `Decrypt` deliberately covers both authentication failures and replayed
/// or stale counters. Callers cannot tell which one occurred.
#[derive(Debug, Error)]
pub enum Error {
    #[error("key generation failed: randomness source unavailable")]
    KeyGeneration,

    #[error("key exchange failed")]
    KeyExchange,

    #[error("could not authenticate peer")]
    Verification,

    #[error("malformed or truncated handshake")]
    Handshake,

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed")]
    Decrypt,

    #[error("session not established")]
    NotEstablished,

    #[error("session closed")]
    SessionClosed,

    #[error("invalid identity")]
    InvalidIdentity,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("message counter exhausted; rekey or start a new session")]
    CounterExhausted,

    #[error("message of {len} bytes exceeds limit of {max}")]
    MessageTooLarge { len: usize, max: u32 },

    #[error("invalid configuration: {0}")]
    Config(#[from] tandem_common::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
