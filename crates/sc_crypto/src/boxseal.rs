//! The asymmetric box transform.
//!
//! References:
//!   - RFC 7748 (X25519): <https://datatracker.ietf.org/doc/html/rfc7748>
//!   - RFC 5869 (HKDF):  <https://datatracker.ietf.org/doc/html/rfc5869>
//!
//! Protocol:
//!   pairwise_key = HKDF-SHA256(DH(sender_secret, recipient_public),
//!                              salt = "sc-box-v1", info = "pairwise-key")
//!   envelope     = base64url( nonce (24) || XChaCha20-Poly1305(pairwise_key, plaintext) )
//!
//! DH commutativity means the recipient derives the same pairwise key from
//! (recipient_secret, sender_public), so one envelope format serves both
//! directions.
//!
//! Non-negotiable:
//!   - A fresh random nonce is drawn inside `seal` on every call. Callers
//!     cannot supply nonces; reuse under one pairwise key breaks
//!     confidentiality.
//!   - `open` fails closed on tag mismatch — no partial plaintext.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use crate::{aead, error::CryptoError, keys::PublicKeyBytes};

const BOX_SALT: &[u8] = b"sc-box-v1";
const BOX_INFO: &[u8] = b"pairwise-key";

/// Derive the 32-byte pairwise key shared by the two endpoints.
fn pairwise_key(
    my_secret: &[u8; 32],
    their_public: &PublicKeyBytes,
) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let secret = StaticSecret::from(*my_secret);
    let shared = secret.diffie_hellman(&their_public.to_x25519());

    let hk = Hkdf::<Sha256>::new(Some(BOX_SALT), shared.as_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    hk.expand(BOX_INFO, key.as_mut_slice())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

/// Encrypt `plaintext` to `recipient_public` from `sender_secret`.
/// Returns the transport-ready envelope: base64url(nonce || ciphertext+tag).
pub fn seal(
    plaintext: &str,
    recipient_public: &PublicKeyBytes,
    sender_secret: &[u8; 32],
) -> Result<String, CryptoError> {
    let key = pairwise_key(sender_secret, recipient_public)?;
    let wire = aead::encrypt(&key, plaintext.as_bytes(), &[])?;
    Ok(URL_SAFE_NO_PAD.encode(wire))
}

/// Decrypt an envelope produced by `seal`, using the sender's public key and
/// the recipient's secret. Fails closed with `OpenFailed` when the envelope
/// is malformed or authentication fails.
pub fn open(
    envelope: &str,
    sender_public: &PublicKeyBytes,
    recipient_secret: &[u8; 32],
) -> Result<String, CryptoError> {
    let wire = URL_SAFE_NO_PAD
        .decode(envelope)
        .map_err(|_| CryptoError::OpenFailed)?;
    let key = pairwise_key(recipient_secret, sender_public)?;
    let plaintext = aead::decrypt(&key, &wire, &[]).map_err(|_| CryptoError::OpenFailed)?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::OpenFailed)
}
