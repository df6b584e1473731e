//! Ephemeral key material and signed session offers.
//!
//! Every session uses two independent ephemeral keypairs, one per traffic
//! direction. The public halves travel to the peer inside a
//! [`SignedSessionOffer`], signed by the sender's long-term identity key.
//!
//! # Wire Format
//!
//! ```text
//! [signer public key] [ephemeral i->r public] [ephemeral r->i public] [signature]
//! ```
//!
//! Every component has a suite-fixed size, so there are no length prefixes.
//! With the [`Standard`](crate::crypto::Standard) suite an offer is 160 bytes.
//! The signature covers everything before it.

use std::fmt;
use std::marker::PhantomData;

use rand::{CryptoRng, RngCore};

use crate::crypto::{CipherSuite, KeyAgreement, SignatureScheme, Standard};
use crate::error::{Error, Result};
use crate::identity::PublicKey;

/// One ephemeral keypair, dedicated to a single direction.
pub(crate) struct EphemeralKeyPair<K: KeyAgreement> {
    public: Vec<u8>,
    private: K::PrivateKey,
}

impl<K: KeyAgreement> EphemeralKeyPair<K> {
    fn generate<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Result<Self> {
        let (public, private) = K::generate_keypair(rng)?;
        Ok(Self { public, private })
    }

    /// Give up the private half. The public half is discarded with `self`.
    pub(crate) fn into_private(self) -> K::PrivateKey {
        self.private
    }
}

/// The two ephemeral keypairs generated for one session.
///
/// Held by an unkeyed [`Session`](crate::Session) until `rekey` consumes it.
/// Private halves are erased when dropped.
pub(crate) struct EphemeralKeyMaterial<K: KeyAgreement> {
    pub(crate) initiator_to_responder: EphemeralKeyPair<K>,
    pub(crate) responder_to_initiator: EphemeralKeyPair<K>,
}

impl<K: KeyAgreement> EphemeralKeyMaterial<K> {
    pub(crate) fn generate<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Result<Self> {
        Ok(Self {
            initiator_to_responder: EphemeralKeyPair::generate(rng)?,
            responder_to_initiator: EphemeralKeyPair::generate(rng)?,
        })
    }

    pub(crate) fn public(&self) -> EphemeralPublic {
        EphemeralPublic {
            initiator_to_responder: self.initiator_to_responder.public.clone(),
            responder_to_initiator: self.responder_to_initiator.public.clone(),
        }
    }
}

/// Public halves of a peer's ephemeral key material.
#[derive(Clone, PartialEq, Eq)]
pub struct EphemeralPublic {
    initiator_to_responder: Vec<u8>,
    responder_to_initiator: Vec<u8>,
}

impl EphemeralPublic {
    /// Key for traffic flowing from the dialer to the listener.
    pub fn initiator_to_responder(&self) -> &[u8] {
        &self.initiator_to_responder
    }

    /// Key for traffic flowing from the listener to the dialer.
    pub fn responder_to_initiator(&self) -> &[u8] {
        &self.responder_to_initiator
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(self.initiator_to_responder.len() + self.responder_to_initiator.len());
        out.extend_from_slice(&self.initiator_to_responder);
        out.extend_from_slice(&self.responder_to_initiator);
        out
    }

    /// Parse two concatenated public values of `K`'s size.
    pub fn from_bytes<K: KeyAgreement>(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 2 * K::PUBLIC_KEY_LEN {
            return Err(Error::Handshake);
        }
        let (i2r, r2i) = bytes.split_at(K::PUBLIC_KEY_LEN);
        Ok(Self {
            initiator_to_responder: i2r.to_vec(),
            responder_to_initiator: r2i.to_vec(),
        })
    }
}

impl fmt::Debug for EphemeralPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralPublic")
            .field("initiator_to_responder_len", &self.initiator_to_responder.len())
            .field("responder_to_initiator_len", &self.responder_to_initiator.len())
            .finish()
    }
}

/// An identity's signed announcement of fresh ephemeral key material.
pub struct SignedSessionOffer<S: CipherSuite = Standard> {
    signer: PublicKey,
    ephemeral: EphemeralPublic,
    signature: Vec<u8>,
    _suite: PhantomData<S>,
}

impl<S: CipherSuite> SignedSessionOffer<S> {
    /// Length of an encoded offer.
    pub const fn wire_len() -> usize {
        <S::Signature as SignatureScheme>::PUBLIC_KEY_LEN
            + 2 * <S::KeyAgreement as KeyAgreement>::PUBLIC_KEY_LEN
            + <S::Signature as SignatureScheme>::SIGNATURE_LEN
    }

    pub(crate) fn new(signer: PublicKey, ephemeral: EphemeralPublic, signature: Vec<u8>) -> Self {
        Self {
            signer,
            ephemeral,
            signature,
            _suite: PhantomData,
        }
    }

    /// Bytes covered by the signature: signer key followed by ephemeral keys.
    pub(crate) fn signed_bytes(signer: &PublicKey, ephemeral: &EphemeralPublic) -> Vec<u8> {
        let mut out = signer.as_bytes().to_vec();
        out.extend_from_slice(&ephemeral.to_bytes());
        out
    }

    /// Long-term key the offer claims to be signed by.
    ///
    /// Not authenticated until the offer has been verified.
    pub fn signer(&self) -> &PublicKey {
        &self.signer
    }

    pub fn ephemeral(&self) -> &EphemeralPublic {
        &self.ephemeral
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Self::signed_bytes(&self.signer, &self.ephemeral);
        out.extend_from_slice(&self.signature);
        out
    }

    /// Split an encoded offer into its components.
    ///
    /// Only the length is checked here; trust and signature checks happen in
    /// [`Identity::verify_session_key`](crate::Identity::verify_session_key).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::wire_len() {
            return Err(Error::Handshake);
        }

        let signer_len = <S::Signature as SignatureScheme>::PUBLIC_KEY_LEN;
        let ephemeral_len = 2 * <S::KeyAgreement as KeyAgreement>::PUBLIC_KEY_LEN;

        let (signer, rest) = bytes.split_at(signer_len);
        let (ephemeral, signature) = rest.split_at(ephemeral_len);

        Ok(Self::new(
            PublicKey::from_bytes(signer),
            EphemeralPublic::from_bytes::<S::KeyAgreement>(ephemeral)?,
            signature.to_vec(),
        ))
    }
}

impl<S: CipherSuite> Clone for SignedSessionOffer<S> {
    fn clone(&self) -> Self {
        Self::new(
            self.signer.clone(),
            self.ephemeral.clone(),
            self.signature.clone(),
        )
    }
}

impl<S: CipherSuite> fmt::Debug for SignedSessionOffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedSessionOffer")
            .field("signer", &self.signer)
            .field("ephemeral", &self.ephemeral)
            .finish_non_exhaustive()
    }
}
