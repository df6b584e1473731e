//! Long-term identities and peer trust.
//!
//! An [`Identity`] owns a signing keypair and decides which peers it is
//! willing to talk to. Trust comes from two places:
//!
//! - an explicit set of peer public keys, managed with `add_peer`
//! - an optional lookup predicate, for applications that keep their own
//!   directory
//!
//! A peer is accepted if either says yes. With neither, nobody is trusted.
//!
//! # Example
//!
//! ```
//! use tandem::Identity;
//!
//! let mut alice: Identity = Identity::generate().unwrap();
//! let bob: Identity = Identity::generate().unwrap();
//!
//! alice.add_peer(bob.public()).unwrap();
//! assert!(alice.is_trusted(&bob.public()));
//!
//! // Public keys have a base64url text form for config files and logs.
//! let text = bob.public().to_string();
//! assert_eq!(tandem::PublicKey::parse(&text).unwrap(), bob.public());
//! ```

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use tandem_common::helpers::{constant_time_contains, constant_time_eq};

use crate::crypto::{CipherSuite, SignatureScheme, Standard};
use crate::error::{Error, Result};
use crate::offer::{EphemeralKeyMaterial, EphemeralPublic, SignedSessionOffer};
use crate::session::Session;

/// A long-term public key.
///
/// Displayed and serialized as unpadded base64url, so a 32-byte Ed25519 key
/// is 43 characters.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Wrap raw public key bytes.
    ///
    /// No validation happens here; [`Identity::add_peer`] checks the length
    /// against the suite, and signature verification rejects bad points.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Parse the base64url text form.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|_| Error::InvalidPublicKey)?;
        if bytes.is_empty() {
            return Err(Error::InvalidPublicKey);
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.to_string()
    }
}

/// Predicate consulted for peers that are not in the trusted set.
pub type PeerLookup = Box<dyn Fn(&PublicKey) -> bool + Send + Sync>;

/// A principal: long-term signing keypair plus the peers it trusts.
///
/// The signing key is erased on drop. `Identity` is `Sync`, so it can be
/// shared behind an `Arc` by many concurrent handshakes; changing the peer
/// set needs `&mut` and therefore external locking.
pub struct Identity<S: CipherSuite = Standard> {
    signing_key: <S::Signature as SignatureScheme>::SigningKey,
    public: PublicKey,
    peers: Vec<PublicKey>,
    peer_lookup: Option<PeerLookup>,
}

impl<S: CipherSuite> Identity<S> {
    /// Generate a new identity using the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generate a new identity from the given RNG.
    ///
    /// Fails with `KeyGeneration` if the RNG cannot produce bytes.
    pub fn generate_with_rng<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Result<Self> {
        let signing_key = S::Signature::generate(rng)?;
        let public = PublicKey(S::Signature::public_key(&signing_key));
        debug!(identity = %public, "generated identity");
        Ok(Self {
            signing_key,
            public,
            peers: Vec::new(),
            peer_lookup: None,
        })
    }

    /// Returns a copy of the public key.
    pub fn public(&self) -> PublicKey {
        self.public.clone()
    }

    /// Add a trusted peer. Adding a peer twice is a no-op.
    ///
    /// Keys of the wrong length for the suite are rejected with
    /// `InvalidPublicKey`.
    pub fn add_peer(&mut self, peer: PublicKey) -> Result<()> {
        if peer.len() != <S::Signature as SignatureScheme>::PUBLIC_KEY_LEN {
            return Err(Error::InvalidPublicKey);
        }
        if !self.peers.contains(&peer) {
            debug!(peer = %peer, "trusting peer");
            self.peers.push(peer);
        }
        Ok(())
    }

    /// Remove a trusted peer. Returns false if it was not present.
    pub fn remove_peer(&mut self, peer: &PublicKey) -> bool {
        let before = self.peers.len();
        self.peers.retain(|p| p != peer);
        before != self.peers.len()
    }

    /// The explicitly trusted peers, in insertion order.
    pub fn peers(&self) -> &[PublicKey] {
        &self.peers
    }

    /// Install a lookup consulted for peers not in the trusted set.
    pub fn set_peer_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&PublicKey) -> bool + Send + Sync + 'static,
    {
        self.peer_lookup = Some(Box::new(lookup));
    }

    pub fn clear_peer_lookup(&mut self) {
        self.peer_lookup = None;
    }

    /// Whether `peer` is in the trusted set or accepted by the lookup.
    ///
    /// The set is scanned in full with constant-time comparisons.
    pub fn is_trusted(&self, peer: &PublicKey) -> bool {
        if constant_time_contains(&self.peers, peer.as_bytes()) {
            return true;
        }
        match &self.peer_lookup {
            Some(lookup) => lookup(peer),
            None => false,
        }
    }

    /// Start a new session.
    ///
    /// Returns the signed offer to send to the peer and an unkeyed session
    /// holding the ephemeral private keys until [`Session::rekey`].
    pub fn new_session(&self) -> Result<(SignedSessionOffer<S>, Session<S>)> {
        self.new_session_with_rng(&mut OsRng)
    }

    /// Like [`new_session`](Self::new_session), drawing ephemeral keys from
    /// `rng`.
    pub fn new_session_with_rng<R: RngCore + CryptoRng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<(SignedSessionOffer<S>, Session<S>)> {
        let material = EphemeralKeyMaterial::<S::KeyAgreement>::generate(rng)?;
        let offer = self.sign_offer(material.public());
        Ok((offer, Session::new(material)))
    }

    /// Prepare a keyed session for rekeying and sign its fresh ephemeral
    /// keys.
    ///
    /// The peer verifies the offer with
    /// [`verify_session_key`](Self::verify_session_key) like any other;
    /// both sides then call [`Session::rekey`] with their original roles.
    pub fn new_rekey_offer(&self, session: &mut Session<S>) -> Result<SignedSessionOffer<S>> {
        let ephemeral = session.prepare_rekey()?;
        Ok(self.sign_offer(ephemeral))
    }

    fn sign_offer(&self, ephemeral: EphemeralPublic) -> SignedSessionOffer<S> {
        let signed = SignedSessionOffer::<S>::signed_bytes(&self.public, &ephemeral);
        let signature = S::Signature::sign(&self.signing_key, &signed);
        SignedSessionOffer::new(self.public.clone(), ephemeral, signature)
    }

    /// Authenticate a peer's offer.
    ///
    /// Returns the peer's ephemeral public keys if the signer is trusted and
    /// the signature is valid, `None` otherwise. Both checks always run and
    /// the result does not say which one failed.
    pub fn verify_session_key(&self, offer: &SignedSessionOffer<S>) -> Option<EphemeralPublic> {
        let trusted = self.is_trusted(offer.signer());

        let signed = SignedSessionOffer::<S>::signed_bytes(offer.signer(), offer.ephemeral());
        let valid = S::Signature::verify(offer.signer().as_bytes(), &signed, offer.signature());

        if trusted & valid {
            Some(offer.ephemeral().clone())
        } else {
            None
        }
    }

    /// Serialize for persistence: secret key, public key, then each peer key.
    ///
    /// The output contains the private key. Protecting it at rest is up to
    /// the caller.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let secret = S::Signature::secret_bytes(&self.signing_key);
        let mut out = Zeroizing::new(Vec::with_capacity(
            secret.len() + self.public.len() * (1 + self.peers.len()),
        ));
        out.extend_from_slice(&secret);
        out.extend_from_slice(self.public.as_bytes());
        for peer in &self.peers {
            out.extend_from_slice(peer.as_bytes());
        }
        out
    }

    /// Parse an identity produced by [`to_bytes`](Self::to_bytes).
    ///
    /// Fails with `InvalidIdentity` if the length is not
    /// `secret + public + k * public`, or if the stored public key does not
    /// belong to the stored secret key. The peer lookup is not persisted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let secret_len = <S::Signature as SignatureScheme>::SECRET_KEY_LEN;
        let public_len = <S::Signature as SignatureScheme>::PUBLIC_KEY_LEN;

        let Some(peer_bytes_len) = bytes.len().checked_sub(secret_len + public_len) else {
            return Err(Error::InvalidIdentity);
        };
        if peer_bytes_len % public_len != 0 {
            return Err(Error::InvalidIdentity);
        }

        let (secret, rest) = bytes.split_at(secret_len);
        let (public, peer_bytes) = rest.split_at(public_len);

        let signing_key = S::Signature::from_secret_bytes(secret)?;
        if !constant_time_eq(&S::Signature::public_key(&signing_key), public) {
            return Err(Error::InvalidIdentity);
        }

        let mut identity = Self {
            signing_key,
            public: PublicKey::from_bytes(public),
            peers: Vec::with_capacity(peer_bytes_len / public_len),
            peer_lookup: None,
        };
        for chunk in peer_bytes.chunks_exact(public_len) {
            identity.add_peer(PublicKey::from_bytes(chunk))?;
        }
        Ok(identity)
    }
}

impl<S: CipherSuite> fmt::Debug for Identity<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("public", &self.public)
            .field("peers", &self.peers.len())
            .field("peer_lookup", &self.peer_lookup.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_rng::ExhaustedRng;
    use crate::session::Role;

    fn identity() -> Identity {
        Identity::generate().unwrap()
    }

    #[test]
    fn test_generate() {
        let id = identity();
        assert_eq!(id.public().len(), 32);
        assert!(id.peers().is_empty());
    }

    #[test]
    fn test_generate_exhausted_rng() {
        let result = Identity::<Standard>::generate_with_rng(&mut ExhaustedRng);
        assert!(matches!(result, Err(Error::KeyGeneration)));
    }

    #[test]
    fn test_new_session_exhausted_rng() {
        let id = identity();
        let result = id.new_session_with_rng(&mut ExhaustedRng);
        assert!(matches!(result, Err(Error::KeyGeneration)));
    }

    #[test]
    fn test_public_is_a_copy() {
        let id = identity();
        let mut public = id.public();
        public.0[0] ^= 0xff;
        assert_ne!(public, id.public());
    }

    #[test]
    fn test_add_peer_deduplicates() {
        let mut alice = identity();
        let bob = identity();

        alice.add_peer(bob.public()).unwrap();
        alice.add_peer(bob.public()).unwrap();
        assert_eq!(alice.peers().len(), 1);
    }

    #[test]
    fn test_add_peer_wrong_length() {
        let mut alice = identity();
        let result = alice.add_peer(PublicKey::from_bytes(&[1u8; 31]));
        assert!(matches!(result, Err(Error::InvalidPublicKey)));
        assert!(alice.peers().is_empty());
    }

    #[test]
    fn test_remove_peer() {
        let mut alice = identity();
        let bob = identity();

        alice.add_peer(bob.public()).unwrap();
        assert!(alice.is_trusted(&bob.public()));
        assert!(alice.remove_peer(&bob.public()));
        assert!(!alice.is_trusted(&bob.public()));
        assert!(!alice.remove_peer(&bob.public()));
    }

    #[test]
    fn test_no_trust_by_default() {
        let alice = identity();
        let bob = identity();
        assert!(!alice.is_trusted(&bob.public()));
        assert!(!alice.is_trusted(&alice.public()));
    }

    #[test]
    fn test_verify_trusted_offer() {
        let mut alice = identity();
        let bob = identity();
        alice.add_peer(bob.public()).unwrap();

        let (offer, _session) = bob.new_session().unwrap();
        let ephemeral = alice.verify_session_key(&offer).unwrap();
        assert_eq!(&ephemeral, offer.ephemeral());
    }

    #[test]
    fn test_verify_untrusted_offer() {
        let alice = identity();
        let carol = identity();

        let (offer, _session) = carol.new_session().unwrap();
        assert!(alice.verify_session_key(&offer).is_none());
    }

    #[test]
    fn test_verify_bad_signature() {
        let mut alice = identity();
        let bob = identity();
        alice.add_peer(bob.public()).unwrap();

        let (offer, _session) = bob.new_session().unwrap();
        let mut bytes = offer.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = SignedSessionOffer::<Standard>::from_bytes(&bytes).unwrap();
        assert!(alice.verify_session_key(&tampered).is_none());
    }

    #[test]
    fn test_verify_swapped_ephemeral() {
        let mut alice = identity();
        let bob = identity();
        alice.add_peer(bob.public()).unwrap();

        // Bob's signature over one set of ephemeral keys must not vouch for another.
        let (offer1, _s1) = bob.new_session().unwrap();
        let (offer2, _s2) = bob.new_session().unwrap();
        let spliced = SignedSessionOffer::<Standard>::new(
            bob.public(),
            offer2.ephemeral().clone(),
            offer1.signature().to_vec(),
        );
        assert!(alice.verify_session_key(&spliced).is_none());
    }

    #[test]
    fn test_verify_impersonated_signer() {
        let mut alice = identity();
        let bob = identity();
        let carol = identity();
        alice.add_peer(bob.public()).unwrap();

        // Carol signs with her own key but claims to be Bob.
        let (offer, _session) = carol.new_session().unwrap();
        let forged = SignedSessionOffer::<Standard>::new(
            bob.public(),
            offer.ephemeral().clone(),
            offer.signature().to_vec(),
        );
        assert!(alice.verify_session_key(&forged).is_none());
    }

    #[test]
    fn test_peer_lookup() {
        let mut bob = identity();
        let carol = identity();
        let (offer, _session) = carol.new_session().unwrap();

        bob.set_peer_lookup(|_| false);
        assert!(bob.verify_session_key(&offer).is_none());

        bob.set_peer_lookup(|_| true);
        assert!(bob.verify_session_key(&offer).is_some());

        let carol_key = carol.public();
        bob.set_peer_lookup(move |k| *k == carol_key);
        assert!(bob.verify_session_key(&offer).is_some());

        bob.clear_peer_lookup();
        assert!(bob.verify_session_key(&offer).is_none());
    }

    #[test]
    fn test_peer_lookup_does_not_override_set() {
        let mut bob = identity();
        let alice = identity();
        bob.add_peer(alice.public()).unwrap();
        bob.set_peer_lookup(|_| false);

        let (offer, _session) = alice.new_session().unwrap();
        assert!(bob.verify_session_key(&offer).is_some());
    }

    #[test]
    fn test_marshal_roundtrip() {
        let mut alice = identity();
        let bob = identity();
        let carol = identity();
        alice.add_peer(bob.public()).unwrap();
        alice.add_peer(carol.public()).unwrap();

        let bytes = alice.to_bytes();
        assert_eq!(bytes.len(), 32 + 32 + 2 * 32);

        let restored = Identity::<Standard>::from_bytes(&bytes).unwrap();
        assert_eq!(restored.public(), alice.public());
        assert_eq!(restored.peers(), alice.peers());

        // The restored identity signs offers the original's peers accept.
        let mut dave = identity();
        dave.add_peer(alice.public()).unwrap();
        let (offer, _session) = restored.new_session().unwrap();
        assert!(dave.verify_session_key(&offer).is_some());
    }

    #[test]
    fn test_marshal_without_peers() {
        let alice = identity();
        let bytes = alice.to_bytes();
        assert_eq!(bytes.len(), 64);
        let restored = Identity::<Standard>::from_bytes(&bytes).unwrap();
        assert!(restored.peers().is_empty());
    }

    #[test]
    fn test_unmarshal_invalid_lengths() {
        for len in 0..200 {
            let bytes = vec![0u8; len];
            assert!(
                matches!(
                    Identity::<Standard>::from_bytes(&bytes),
                    Err(Error::InvalidIdentity)
                ),
                "length {} should be rejected",
                len
            );
        }

        let mut bytes = identity().to_bytes().to_vec();
        bytes.push(0);
        assert!(matches!(
            Identity::<Standard>::from_bytes(&bytes),
            Err(Error::InvalidIdentity)
        ));
    }

    #[test]
    fn test_unmarshal_mismatched_public_key() {
        let alice = identity();
        let bob = identity();

        let mut bytes = alice.to_bytes().to_vec();
        bytes[32..64].copy_from_slice(bob.public().as_bytes());
        assert!(matches!(
            Identity::<Standard>::from_bytes(&bytes),
            Err(Error::InvalidIdentity)
        ));
    }

    #[test]
    fn test_rekey_offer_round_trip() {
        let mut alice = identity();
        let mut bob = identity();
        alice.add_peer(bob.public()).unwrap();
        bob.add_peer(alice.public()).unwrap();

        let (alice_offer, mut alice_session) = alice.new_session().unwrap();
        let (bob_offer, mut bob_session) = bob.new_session().unwrap();
        alice_session
            .rekey(&alice.verify_session_key(&bob_offer).unwrap(), Role::Initiator)
            .unwrap();
        bob_session
            .rekey(&bob.verify_session_key(&alice_offer).unwrap(), Role::Responder)
            .unwrap();
        alice_session.encrypt(b"first key").unwrap();

        let alice_rekey = alice.new_rekey_offer(&mut alice_session).unwrap();
        let bob_rekey = bob.new_rekey_offer(&mut bob_session).unwrap();
        assert_eq!(alice_rekey.signer(), &alice.public());

        let from_bob = alice.verify_session_key(&bob_rekey).unwrap();
        let from_alice = bob.verify_session_key(&alice_rekey).unwrap();
        alice_session.rekey(&from_bob, Role::Initiator).unwrap();
        bob_session.rekey(&from_alice, Role::Responder).unwrap();
        assert_eq!(alice_session.last_sent(), 0);

        let ct = alice_session.encrypt(b"second key").unwrap();
        assert_eq!(bob_session.decrypt(&ct).unwrap(), b"second key");
    }

    #[test]
    fn test_rekey_offer_needs_keyed_session() {
        let id = identity();
        let (_, mut session) = id.new_session().unwrap();
        assert!(matches!(id.new_rekey_offer(&mut session), Err(Error::NotEstablished)));
    }

    #[test]
    fn test_public_key_text_form() {
        let id = identity();
        let text = id.public().to_string();
        assert_eq!(text.len(), 43);
        assert_eq!(PublicKey::parse(&text).unwrap(), id.public());

        assert!(matches!(PublicKey::parse("not base64!"), Err(Error::InvalidPublicKey)));
        assert!(matches!(PublicKey::parse(""), Err(Error::InvalidPublicKey)));
    }

    #[test]
    fn test_public_key_serde() {
        let id = identity();
        let json = serde_json::to_string(&id.public()).unwrap();
        assert_eq!(json, format!("\"{}\"", id.public()));

        let parsed: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id.public());
    }
}
