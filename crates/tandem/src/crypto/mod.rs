//! Cryptographic collaborators.
//!
//! The protocol core never names an algorithm directly. It is written against
//! three capability traits, bundled by a [`CipherSuite`]:
//!
//! - [`KeyAgreement`]: ephemeral keypairs and shared secrets
//! - [`AuthenticatedCipher`]: encrypt/decrypt under a fixed-length key
//! - [`SignatureScheme`]: long-term signing keys
//!
//! [`Standard`] binds them to X25519, XChaCha20-Poly1305 and Ed25519.

pub mod aead;
pub mod ed25519;
pub mod x25519;

use rand::{CryptoRng, RngCore};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::Result;

pub use aead::XChaCha20Poly1305Cipher;
pub use ed25519::Ed25519;
pub use x25519::{X25519Private, X25519};

/// Key agreement used for the per-session ephemeral exchange.
pub trait KeyAgreement {
    /// Length of an encoded public value.
    const PUBLIC_KEY_LEN: usize;

    /// Private half of a keypair. Erased when dropped.
    type PrivateKey: ZeroizeOnDrop;

    /// Generate a fresh keypair, returning the encoded public value.
    ///
    /// Fails with `KeyGeneration` if `rng` cannot produce bytes.
    fn generate_keypair<R: RngCore + CryptoRng + ?Sized>(
        rng: &mut R,
    ) -> Result<(Vec<u8>, Self::PrivateKey)>;

    /// Derive `len` bytes of shared secret from our private value and the
    /// peer's public value, bound to the context label `info`.
    ///
    /// Takes the private key by value; it is erased before this returns.
    /// Degenerate peer values fail with `KeyExchange`.
    fn shared_secret(
        private: Self::PrivateKey,
        peer_public: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Zeroizing<Vec<u8>>>;
}

/// Symmetric authenticated encryption under a fixed-length key.
pub trait AuthenticatedCipher {
    /// Required key length in bytes.
    const KEY_LEN: usize;

    /// Bytes added to every plaintext (nonce, tag).
    const OVERHEAD: usize;

    /// Encrypt `plaintext`. Fails with `Encrypt`.
    fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt and authenticate `ciphertext`.
    ///
    /// Any failure, whatever its cause, is reported as `Decrypt`.
    fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>>;
}

/// Long-term signatures binding ephemeral keys to an identity.
pub trait SignatureScheme {
    const PUBLIC_KEY_LEN: usize;
    const SECRET_KEY_LEN: usize;
    const SIGNATURE_LEN: usize;

    /// Private signing key. Erased when dropped.
    type SigningKey: ZeroizeOnDrop;

    fn generate<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Result<Self::SigningKey>;

    /// Restore a signing key from its secret encoding.
    fn from_secret_bytes(bytes: &[u8]) -> Result<Self::SigningKey>;

    fn secret_bytes(key: &Self::SigningKey) -> Zeroizing<Vec<u8>>;

    fn public_key(key: &Self::SigningKey) -> Vec<u8>;

    fn sign(key: &Self::SigningKey, message: &[u8]) -> Vec<u8>;

    /// Returns false for malformed keys or signatures as well as bad ones.
    fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;
}

/// A complete set of algorithm bindings.
pub trait CipherSuite: 'static {
    type KeyAgreement: KeyAgreement;
    type Cipher: AuthenticatedCipher;
    type Signature: SignatureScheme;
}

/// X25519 + XChaCha20-Poly1305 + Ed25519.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Standard;

impl CipherSuite for Standard {
    type KeyAgreement = X25519;
    type Cipher = XChaCha20Poly1305Cipher;
    type Signature = Ed25519;
}
