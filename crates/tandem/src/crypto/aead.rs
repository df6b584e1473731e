//! XChaCha20-Poly1305 with a random nonce carried in front of each
//! ciphertext.
//!
//! # Wire Format
//!
//! ```text
//! [24 bytes: nonce] [ciphertext] [16 bytes: auth tag]
//! ```

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::AuthenticatedCipher;
use crate::error::{Error, Result};

pub const AEAD_KEY_LEN: usize = 32;
pub const AEAD_NONCE_LEN: usize = 24;
pub const AEAD_TAG_LEN: usize = 16;

/// XChaCha20-Poly1305. The 192-bit nonce is large enough to pick at random.
#[derive(Debug, Clone, Copy, Default)]
pub struct XChaCha20Poly1305Cipher;

impl AuthenticatedCipher for XChaCha20Poly1305Cipher {
    const KEY_LEN: usize = AEAD_KEY_LEN;
    const OVERHEAD: usize = AEAD_NONCE_LEN + AEAD_TAG_LEN;

    fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| Error::Encrypt)?;

        let mut nonce = [0u8; AEAD_NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|_| Error::Encrypt)?;

        let sealed = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| Error::Encrypt)?;

        let mut out = Vec::with_capacity(AEAD_NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if ciphertext.len() < AEAD_NONCE_LEN + AEAD_TAG_LEN {
            return Err(Error::Decrypt);
        }
        let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| Error::Decrypt)?;

        let (nonce, sealed) = ciphertext.split_at(AEAD_NONCE_LEN);
        cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map(Zeroizing::new)
            .map_err(|_| Error::Decrypt)
    }
}
