//! Encrypted session management.
//!
//! A [`Session`] holds two independent symmetric keys, one per direction,
//! and numbers every message so the receiver can reject replays.
//!
//! # Lifecycle
//!
//! ```text
//! Identity::new_session()        rekey()             close() / drop
//!   ------------------> Uninitialized ---> Keyed ---------------> Closed
//!                                          |   ^
//!                          prepare_rekey() |   | rekey()
//!                                          +---+
//! ```
//!
//! Only a `Keyed` session can encrypt or decrypt. A keyed session with fresh
//! ephemeral keys pending keeps its current keys until `rekey` swaps them.
//! `Closed` is terminal and every key byte has been overwritten with zeros
//! by the time it is reached.

use std::fmt;
use std::io::{Read, Write};

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use tandem_common::helpers::constant_time_eq;
use tandem_common::SessionConfig;

use crate::crypto::{AuthenticatedCipher, CipherSuite, KeyAgreement, Standard};
use crate::error::{Error, Result};
use crate::message::{self, COUNTER_LEN};
use crate::offer::{EphemeralKeyMaterial, EphemeralPublic};
use crate::sequence::{ReplayWatermark, SendCounter};

/// Key derivation labels, one per traffic direction.
const INITIATOR_TO_RESPONDER_INFO: &[u8] = b"tandem-i2r-key-v1";
const RESPONDER_TO_INITIATOR_INFO: &[u8] = b"tandem-r2i-key-v1";

/// Which side of the handshake a session is on.
///
/// The dialer is the initiator. Roles decide which ephemeral half feeds the
/// send key and which feeds the receive key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Holding ephemeral private keys, waiting for the peer's offer.
    Uninitialized,
    /// Directional keys derived; messages can flow.
    Keyed,
    /// Keys erased. Terminal.
    Closed,
}

/// Send and receive keys. Zeroed in place by `close`, and again on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
struct DirectionalKeys {
    send: Box<[u8]>,
    recv: Box<[u8]>,
}

/// An authenticated, replay-protected message session with one peer.
///
/// A session is not meant to be shared between threads without external
/// synchronization; every mutating call takes `&mut self`.
pub struct Session<S: CipherSuite = Standard> {
    state: SessionState,

    /// Ephemeral keypairs waiting for the next `rekey`
    ephemeral: Option<EphemeralKeyMaterial<S::KeyAgreement>>,

    /// Directional keys, present once keyed
    keys: Option<DirectionalKeys>,

    /// Numbers outgoing messages
    tx: SendCounter,

    /// Watermark for incoming messages
    rx: ReplayWatermark,

    config: SessionConfig,
}

impl<S: CipherSuite> Session<S> {
    pub(crate) fn new(ephemeral: EphemeralKeyMaterial<S::KeyAgreement>) -> Self {
        let config = SessionConfig::default();
        Self {
            state: SessionState::Uninitialized,
            ephemeral: Some(ephemeral),
            keys: None,
            tx: SendCounter::with_limit(config.max_messages_per_key),
            rx: ReplayWatermark::new(),
            config,
        }
    }

    /// Apply message limits. Takes effect for the next message.
    pub fn set_config(&mut self, config: SessionConfig) {
        self.tx.set_limit(config.max_messages_per_key);
        self.config = config;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Number of the last message encrypted by this session.
    pub fn last_sent(&self) -> u32 {
        self.tx.last()
    }

    /// Number of the last message accepted by this session.
    pub fn last_recv(&self) -> u32 {
        self.rx.highest()
    }

    /// Generate fresh ephemeral keys on a keyed session, ready for `rekey`.
    ///
    /// Returns the public halves for the peer. Traffic keeps flowing under
    /// the current keys until `rekey` runs. Calling this again replaces any
    /// pending ephemeral keys. Most callers want
    /// [`Identity::new_rekey_offer`](crate::Identity::new_rekey_offer), which
    /// signs the result.
    pub fn prepare_rekey(&mut self) -> Result<EphemeralPublic> {
        self.prepare_rekey_with_rng(&mut OsRng)
    }

    pub fn prepare_rekey_with_rng<R: RngCore + CryptoRng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<EphemeralPublic> {
        match self.state {
            SessionState::Keyed => {}
            SessionState::Uninitialized => return Err(Error::NotEstablished),
            SessionState::Closed => return Err(Error::SessionClosed),
        }

        let material = EphemeralKeyMaterial::<S::KeyAgreement>::generate(rng)?;
        let public = material.public();
        self.ephemeral = Some(material);
        Ok(public)
    }

    /// Derive directional keys from our ephemeral keys and the peer's.
    ///
    /// The initiator's send key and the responder's receive key come from
    /// the initiator-to-responder pair; the reverse direction uses the
    /// other pair. Each private key is consumed, and so erased, before the
    /// next derivation. Any previous keys are erased and both message
    /// counters restart at zero.
    ///
    /// On any failure the session erases all key material and closes.
    pub fn rekey(&mut self, peer: &EphemeralPublic, role: Role) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(Error::SessionClosed);
        }

        let Some(material) = self.ephemeral.take() else {
            self.close();
            return Err(Error::KeyExchange);
        };

        match derive_keys::<S>(material, peer, role) {
            Ok(keys) => {
                if let Some(mut old) = self.keys.replace(keys) {
                    old.zeroize();
                }
                self.tx.reset();
                self.rx.reset();
                self.state = SessionState::Keyed;
                debug!(?role, "session keyed");
                Ok(())
            }
            Err(e) => {
                debug!(?role, error = %e, "rekey failed, closing session");
                self.close();
                Err(e)
            }
        }
    }

    fn keys(&self) -> Result<&DirectionalKeys> {
        match self.state {
            SessionState::Keyed => self.keys.as_ref().ok_or(Error::NotEstablished),
            SessionState::Uninitialized => Err(Error::NotEstablished),
            SessionState::Closed => Err(Error::SessionClosed),
        }
    }

    /// Number, frame and encrypt a message.
    ///
    /// Advances `last_sent` even though nothing has reached the channel yet;
    /// a message number is never reused, even if the caller retries after a
    /// transport failure.
    pub fn encrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        self.keys()?;
        if payload.is_empty() {
            return Err(Error::EmptyMessage);
        }

        let number = self.tx.advance().ok_or(Error::CounterExhausted)?;
        let framed = message::encode(number, payload);

        let keys = self.keys()?;
        S::Cipher::encrypt(&keys.send, &framed)
    }

    /// Decrypt and validate a message from the peer.
    ///
    /// Authentication failures, malformed frames and replayed or stale
    /// message numbers all return `Decrypt`. The watermark only moves when
    /// a message is accepted.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let keys = self.keys()?;
        let plaintext = S::Cipher::decrypt(&keys.recv, ciphertext)?;

        let (number, contents) = message::decode(&plaintext).ok_or(Error::Decrypt)?;

        // A replayed ciphertext authenticates fine; only the number gives it away.
        if !self.rx.check_and_update(number) {
            return Err(Error::Decrypt);
        }

        Ok(contents.to_vec())
    }

    /// Encrypt `payload` and write it to `channel` with a length prefix.
    ///
    /// I/O errors are returned as-is; nothing is retried.
    pub fn send<W: Write + ?Sized>(&mut self, channel: &mut W, payload: &[u8]) -> Result<()> {
        self.keys()?;

        let wire_len = payload.len() + COUNTER_LEN + <S::Cipher as AuthenticatedCipher>::OVERHEAD;
        message::checked_len(wire_len, self.config.max_message_len)?;

        let ciphertext = self.encrypt(payload)?;
        message::write_frame(channel, &ciphertext, self.config.max_message_len)
    }

    /// Read one length-prefixed message from `channel` and decrypt it.
    pub fn receive<R: Read + ?Sized>(&mut self, channel: &mut R) -> Result<Vec<u8>> {
        self.keys()?;
        let ciphertext = message::read_frame(channel, self.config.max_message_len)?;
        self.decrypt(&ciphertext)
    }

    /// Erase all key material and close the session.
    ///
    /// Safe to call more than once. Every later `send`, `receive`,
    /// `encrypt` or `decrypt` fails with `SessionClosed`.
    pub fn close(&mut self) {
        if let Some(keys) = self.keys.as_mut() {
            keys.zeroize();
        }
        self.ephemeral = None;

        if self.state != SessionState::Closed {
            debug!(
                last_sent = self.tx.last(),
                last_recv = self.rx.highest(),
                "session closed"
            );
        }
        self.state = SessionState::Closed;
    }

    #[cfg(test)]
    pub(crate) fn key_material(&self) -> Option<(&[u8], &[u8])> {
        self.keys.as_ref().map(|k| (&k.send[..], &k.recv[..]))
    }

    #[cfg(test)]
    pub(crate) fn has_ephemeral(&self) -> bool {
        self.ephemeral.is_some()
    }
}

/// Run both key agreements and assign the results to directions.
fn derive_keys<S: CipherSuite>(
    material: EphemeralKeyMaterial<S::KeyAgreement>,
    peer: &EphemeralPublic,
    role: Role,
) -> Result<DirectionalKeys> {
    let key_len = <S::Cipher as AuthenticatedCipher>::KEY_LEN;
    let EphemeralKeyMaterial {
        initiator_to_responder,
        responder_to_initiator,
    } = material;

    // The i->r private key is gone once this returns; r->i is still live.
    let i2r = S::KeyAgreement::shared_secret(
        initiator_to_responder.into_private(),
        peer.initiator_to_responder(),
        INITIATOR_TO_RESPONDER_INFO,
        key_len,
    )?;
    let r2i = S::KeyAgreement::shared_secret(
        responder_to_initiator.into_private(),
        peer.responder_to_initiator(),
        RESPONDER_TO_INITIATOR_INFO,
        key_len,
    )?;

    if constant_time_eq(&i2r, &r2i) {
        return Err(Error::KeyExchange);
    }

    let (send, recv) = match role {
        Role::Initiator => (i2r, r2i),
        Role::Responder => (r2i, i2r),
    };

    Ok(DirectionalKeys {
        send: Box::from(&send[..]),
        recv: Box::from(&recv[..]),
    })
}

impl<S: CipherSuite> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("last_sent", &self.tx.last())
            .field("last_recv", &self.rx.highest())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
