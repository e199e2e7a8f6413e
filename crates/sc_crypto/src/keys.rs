//! Box key pairs.
//!
//! Each registered identity has one long-term X25519 key pair. The same
//! pair is used for both directions of the box transform: any holder of a
//! key pair can encrypt to, and decrypt from, any other holder's public
//! key using their own secret plus the peer's public key.
//!
//! The secret half never leaves the device unencrypted — it is persisted
//! only wrapped under a password-derived key (see `kdf`), and zeroized
//! from memory on drop.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

// ── Public key newtype ────────────────────────────────────────────────────────

/// 32-byte X25519 public key, base64url-encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyBytes(pub [u8; 32]);

impl PublicKeyBytes {
    pub fn to_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD.decode(s)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            CryptoError::InvalidKey(format!("Public key must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }

    /// Human-readable fingerprint for manual verification: BLAKE3 of the
    /// public key, truncated to 160 bits, shown as ten 4-hex-digit groups.
    ///
    /// Example: "a1b2 c3d4 e5f6 7890 abcd ef01 2345 6789 0abc def0"
    pub fn fingerprint(&self) -> String {
        let digest = blake3::hash(&self.0);
        digest.as_bytes()[..20]
            .chunks(2)
            .map(hex::encode)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_x25519(&self) -> X25519Public {
        X25519Public::from(self.0)
    }
}

impl Serialize for PublicKeyBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_b64())
    }
}

impl<'de> Deserialize<'de> for PublicKeyBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_b64(&s).map_err(de::Error::custom)
    }
}

// ── Box keypair ───────────────────────────────────────────────────────────────

/// Long-term X25519 box key pair.  Drop clears the secret via ZeroizeOnDrop.
#[derive(ZeroizeOnDrop)]
pub struct BoxKeyPair {
    #[zeroize(skip)]
    pub public: PublicKeyBytes,
    secret_bytes: [u8; 32],
}

impl BoxKeyPair {
    /// Generate a fresh key pair from the OS CSPRNG (256-bit key space).
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKeyBytes(X25519Public::from(&secret).to_bytes());
        Self { public, secret_bytes: secret.to_bytes() }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("Secret key must be 32 bytes, got {}", bytes.len()))
        })?;
        let secret = StaticSecret::from(arr);
        let public = PublicKeyBytes(X25519Public::from(&secret).to_bytes());
        Ok(Self { public, secret_bytes: arr })
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_pairs_are_distinct() {
        let a = BoxKeyPair::generate();
        let b = BoxKeyPair::generate();
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn public_key_b64_roundtrip() {
        let pair = BoxKeyPair::generate();
        let b64 = pair.public.to_b64();
        assert_eq!(PublicKeyBytes::from_b64(&b64).unwrap(), pair.public);
    }

    #[test]
    fn rejects_wrong_length_key() {
        let b64 = URL_SAFE_NO_PAD.encode([0u8; 16]);
        assert!(PublicKeyBytes::from_b64(&b64).is_err());
    }

    #[test]
    fn secret_roundtrip_preserves_public() {
        let pair = BoxKeyPair::generate();
        let restored = BoxKeyPair::from_secret_bytes(pair.secret_bytes()).unwrap();
        assert_eq!(restored.public, pair.public);
    }

    #[test]
    fn fingerprint_is_stable_and_grouped() {
        let pair = BoxKeyPair::generate();
        let fp = pair.public.fingerprint();
        assert_eq!(fp, pair.public.fingerprint());
        assert_eq!(fp.split(' ').count(), 10);
    }
}
