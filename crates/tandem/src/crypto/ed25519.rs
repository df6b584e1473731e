//! Ed25519 long-term signatures.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, Zeroizing};

use super::SignatureScheme;
use crate::error::{Error, Result};

pub const ED25519_PUBLIC_KEY_LEN: usize = 32;
pub const ED25519_SECRET_KEY_LEN: usize = 32;
pub const ED25519_SIGNATURE_LEN: usize = 64;

/// Ed25519 with strict verification (no malleable or small-order inputs).
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519;

impl SignatureScheme for Ed25519 {
    const PUBLIC_KEY_LEN: usize = ED25519_PUBLIC_KEY_LEN;
    const SECRET_KEY_LEN: usize = ED25519_SECRET_KEY_LEN;
    const SIGNATURE_LEN: usize = ED25519_SIGNATURE_LEN;

    type SigningKey = SigningKey;

    fn generate<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> Result<SigningKey> {
        let mut seed = Zeroizing::new([0u8; ED25519_SECRET_KEY_LEN]);
        rng.try_fill_bytes(&mut seed[..])
            .map_err(|_| Error::KeyGeneration)?;
        Ok(SigningKey::from_bytes(&seed))
    }

    fn from_secret_bytes(bytes: &[u8]) -> Result<SigningKey> {
        let mut seed: [u8; ED25519_SECRET_KEY_LEN] =
            bytes.try_into().map_err(|_| Error::InvalidIdentity)?;
        let key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(key)
    }

    fn secret_bytes(key: &SigningKey) -> Zeroizing<Vec<u8>> {
        let mut seed = key.to_bytes();
        let out = Zeroizing::new(seed.to_vec());
        seed.zeroize();
        out
    }

    fn public_key(key: &SigningKey) -> Vec<u8> {
        key.verifying_key().to_bytes().to_vec()
    }

    fn sign(key: &SigningKey, message: &[u8]) -> Vec<u8> {
        key.sign(message).to_bytes().to_vec()
    }

    fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        let Ok(public_key) = <[u8; ED25519_PUBLIC_KEY_LEN]>::try_from(public_key) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key) else {
            return false;
        };
        let sig = match Signature::from_slice(signature) {
            Ok(s) => s,
            Err(_) => return false,
        };
        verifying_key.verify_strict(message, &sig).is_ok()
    }
}
