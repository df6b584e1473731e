//! X25519 key agreement with HKDF-SHA256 expansion.

use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use super::KeyAgreement;
use crate::error::{Error, Result};

/// X25519 public value length.
pub const X25519_KEY_LEN: usize = 32;

/// X25519 Diffie-Hellman.
///
/// The raw DH output is never used as a key. It is expanded with
/// HKDF-SHA256 to the length the caller asks for.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519;

/// An X25519 private scalar.
///
/// `StaticSecret` wipes itself in its own `Drop`; this wrapper exposes that
/// through the `ZeroizeOnDrop` marker.
pub struct X25519Private(StaticSecret);

impl ZeroizeOnDrop for X25519Private {}

impl KeyAgreement for X25519 {
    const PUBLIC_KEY_LEN: usize = X25519_KEY_LEN;

    type PrivateKey = X25519Private;

    fn generate_keypair<R: RngCore + CryptoRng + ?Sized>(
        rng: &mut R,
    ) -> Result<(Vec<u8>, X25519Private)> {
        let mut seed = Zeroizing::new([0u8; X25519_KEY_LEN]);
        rng.try_fill_bytes(&mut seed[..])
            .map_err(|_| Error::KeyGeneration)?;

        let secret = StaticSecret::from(*seed);
        let public = PublicKey::from(&secret);
        Ok((public.as_bytes().to_vec(), X25519Private(secret)))
    }

    fn shared_secret(
        private: X25519Private,
        peer_public: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let peer: [u8; X25519_KEY_LEN] = peer_public.try_into().map_err(|_| Error::KeyExchange)?;

        let shared = private.0.diffie_hellman(&PublicKey::from(peer));
        drop(private);

        // Low-order points give an all-zero output regardless of our key.
        if !shared.was_contributory() {
            return Err(Error::KeyExchange);
        }

        let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
        let mut okm = Zeroizing::new(vec![0u8; len]);
        hk.expand(info, &mut okm[..])
            .map_err(|_| Error::KeyExchange)?;
        Ok(okm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_rng::ExhaustedRng;
    use rand::rngs::{OsRng, StdRng};
    use rand::SeedableRng;

    const INFO: &[u8] = b"test-direction";

    #[test]
    fn test_shared_secret_agrees() {
        let (a_pub, a_priv) = X25519::generate_keypair(&mut OsRng).unwrap();
        let (b_pub, b_priv) = X25519::generate_keypair(&mut OsRng).unwrap();

        let ab = X25519::shared_secret(a_priv, &b_pub, INFO, 32).unwrap();
        let ba = X25519::shared_secret(b_priv, &a_pub, INFO, 32).unwrap();
        assert_eq!(&ab[..], &ba[..]);
        assert_eq!(ab.len(), 32);
    }

    #[test]
    fn test_requested_length() {
        let (_, a_priv) = X25519::generate_keypair(&mut OsRng).unwrap();
        let (b_pub, _) = X25519::generate_keypair(&mut OsRng).unwrap();

        let okm = X25519::shared_secret(a_priv, &b_pub, INFO, 48).unwrap();
        assert_eq!(okm.len(), 48);
    }

    #[test]
    fn test_private_key_erased_on_drop() {
        fn assert_zeroize_on_drop<T: ZeroizeOnDrop>() {}
        assert_zeroize_on_drop::<<X25519 as KeyAgreement>::PrivateKey>();
    }

    #[test]
    fn test_info_separates_outputs() {
        // Same private scalar twice, against the same peer.
        let (_, a_priv) = X25519::generate_keypair(&mut StdRng::seed_from_u64(7)).unwrap();
        let (_, a_again) = X25519::generate_keypair(&mut StdRng::seed_from_u64(7)).unwrap();
        let (b_pub, _) = X25519::generate_keypair(&mut OsRng).unwrap();

        let one = X25519::shared_secret(a_priv, &b_pub, b"direction-one", 32).unwrap();
        let two = X25519::shared_secret(a_again, &b_pub, b"direction-two", 32).unwrap();
        assert_ne!(&one[..], &two[..]);
    }

    #[test]
    fn test_low_order_point_rejected() {
        let (_, a_priv) = X25519::generate_keypair(&mut OsRng).unwrap();
        let result = X25519::shared_secret(a_priv, &[0u8; X25519_KEY_LEN], INFO, 32);
        assert!(matches!(result, Err(Error::KeyExchange)));
    }

    #[test]
    fn test_wrong_length_peer_rejected() {
        let (_, a_priv) = X25519::generate_keypair(&mut OsRng).unwrap();
        let result = X25519::shared_secret(a_priv, &[9u8; 31], INFO, 32);
        assert!(matches!(result, Err(Error::KeyExchange)));
    }

    #[test]
    fn test_exhausted_rng() {
        let result = X25519::generate_keypair(&mut ExhaustedRng);
        assert!(matches!(result, Err(Error::KeyGeneration)));
    }
}
