//! Session establishment over a byte stream.
//!
//! Both sides exchange one [`SignedSessionOffer`] each:
//!
//! ```text
//! Dialer                                   Listener
//!   |                                         |
//!   |------------ offer (dialer) ------------>|  verify, create own offer
//!   |<----------- offer (listener) -----------|
//!   |  verify                                 |
//!   |  rekey(Initiator)                       |  rekey(Responder)
//! ```
//!
//! Offers have a fixed size, so no framing is needed until the session is
//! keyed. Afterwards every message is length-prefixed (see
//! [`message`](crate::message)).

use std::io::{ErrorKind, Read, Write};

use tracing::{debug, warn};

use tandem_common::SessionConfig;

use crate::crypto::{CipherSuite, Standard};
use crate::error::{Error, Result};
use crate::identity::{Identity, PublicKey};
use crate::offer::{EphemeralPublic, SignedSessionOffer};
use crate::session::{Role, Session};

/// A keyed session bound to the channel it was negotiated over.
pub struct SecureChannel<C, S: CipherSuite = Standard> {
    session: Session<S>,
    channel: C,
    peer: PublicKey,
}

impl<C: Read + Write, S: CipherSuite> SecureChannel<C, S> {
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.session.send(&mut self.channel, payload)
    }

    pub fn receive(&mut self) -> Result<Vec<u8>> {
        self.session.receive(&mut self.channel)
    }
}

impl<C, S: CipherSuite> SecureChannel<C, S> {
    /// Authenticated long-term key of the other side.
    pub fn peer(&self) -> &PublicKey {
        &self.peer
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<S> {
        &mut self.session
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Erase the session keys. The channel is left open.
    pub fn close(&mut self) {
        self.session.close();
    }

    pub fn into_parts(self) -> (Session<S>, C) {
        (self.session, self.channel)
    }
}

/// Establish a session as the initiator, using default limits.
pub fn dial<C, S>(identity: &Identity<S>, channel: C) -> Result<SecureChannel<C, S>>
where
    C: Read + Write,
    S: CipherSuite,
{
    dial_with_config(identity, channel, SessionConfig::default())
}

/// Establish a session as the initiator.
///
/// Sends our offer first, then reads and verifies the listener's.
pub fn dial_with_config<C, S>(
    identity: &Identity<S>,
    mut channel: C,
    config: SessionConfig,
) -> Result<SecureChannel<C, S>>
where
    C: Read + Write,
    S: CipherSuite,
{
    config.validate()?;

    let (offer, mut session) = identity.new_session()?;
    session.set_config(config);
    write_offer(&mut channel, &offer)?;

    let peer_offer = read_offer::<_, S>(&mut channel)?;
    let peer_keys = verify(identity, &peer_offer)?;

    session.rekey(&peer_keys, Role::Initiator)?;
    debug!(peer = %peer_offer.signer(), "dial complete");

    Ok(SecureChannel {
        session,
        channel,
        peer: peer_offer.signer().clone(),
    })
}

/// Accept a session as the responder, using default limits.
pub fn listen<C, S>(identity: &Identity<S>, channel: C) -> Result<SecureChannel<C, S>>
where
    C: Read + Write,
    S: CipherSuite,
{
    listen_with_config(identity, channel, SessionConfig::default())
}

/// Accept a session as the responder.
///
/// The dialer's offer is verified before we generate or send anything, so an
/// untrusted dialer learns nothing about us.
pub fn listen_with_config<C, S>(
    identity: &Identity<S>,
    mut channel: C,
    config: SessionConfig,
) -> Result<SecureChannel<C, S>>
where
    C: Read + Write,
    S: CipherSuite,
{
    config.validate()?;

    let peer_offer = read_offer::<_, S>(&mut channel)?;
    let peer_keys = verify(identity, &peer_offer)?;

    let (offer, mut session) = identity.new_session()?;
    session.set_config(config);
    write_offer(&mut channel, &offer)?;

    session.rekey(&peer_keys, Role::Responder)?;
    debug!(peer = %peer_offer.signer(), "listen complete");

    Ok(SecureChannel {
        session,
        channel,
        peer: peer_offer.signer().clone(),
    })
}

fn verify<S: CipherSuite>(
    identity: &Identity<S>,
    offer: &SignedSessionOffer<S>,
) -> Result<EphemeralPublic> {
    identity.verify_session_key(offer).ok_or_else(|| {
        warn!(peer = %offer.signer(), "rejected session offer");
        Error::Verification
    })
}

fn write_offer<W: Write + ?Sized, S: CipherSuite>(
    channel: &mut W,
    offer: &SignedSessionOffer<S>,
) -> Result<()> {
    channel.write_all(&offer.to_bytes())?;
    channel.flush()?;
    Ok(())
}

fn read_offer<R: Read + ?Sized, S: CipherSuite>(channel: &mut R) -> Result<SignedSessionOffer<S>> {
    let mut buf = vec![0u8; SignedSessionOffer::<S>::wire_len()];
    channel.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::Handshake,
        _ => Error::Io(e),
    })?;
    SignedSessionOffer::from_bytes(&buf)
}
