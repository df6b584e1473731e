//! Authenticated point-to-point encrypted sessions.
//!
//! This crate provides:
//! - Long-term Ed25519 identities with an explicit set of trusted peers
//! - Signed ephemeral key offers and a two-message dial/listen handshake
//! - Sessions with one key per direction and replay protection
//! - Zeroization of every key once a session closes or drops
//!
//! # Design
//!
//! Each side generates two ephemeral X25519 keypairs per session, one for
//! each direction, and signs the public halves with its identity key. After
//! the exchange, the dialer sends under the initiator-to-responder key and the
//! listener under the responder-to-initiator key. Compromising one direction
//! reveals nothing about the other.
//!
//! Messages carry a 32-bit number inside the ciphertext. The receiver only
//! accepts numbers strictly above the last one it accepted: lost messages are
//! tolerated, replayed or reordered ones are not.
//!
//! ```no_run
//! use std::net::TcpStream;
//! use tandem::{dial, Identity};
//!
//! # fn main() -> tandem::Result<()> {
//! let mut alice: Identity = Identity::generate()?;
//! alice.add_peer(tandem::PublicKey::parse("bob-public-key-base64url")?)?;
//!
//! let stream = TcpStream::connect("127.0.0.1:4000")?;
//! let mut channel = dial(&alice, stream)?;
//! channel.send(b"hello")?;
//! let reply = channel.receive()?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod crypto;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod message;
pub mod offer;
pub mod sequence;
pub mod session;

pub use crypto::{CipherSuite, Standard};
pub use error::{Error, Result};
pub use handshake::{dial, dial_with_config, listen, listen_with_config, SecureChannel};
pub use identity::{Identity, PeerLookup, PublicKey};
pub use offer::{EphemeralPublic, SignedSessionOffer};
pub use session::{Role, Session, SessionState};
pub use tandem_common::SessionConfig;
