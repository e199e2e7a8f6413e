//! XChaCha20-Poly1305 helpers shared by the box transform, the fallback
//! scheme, and secret-key wrapping at rest.
//!
//! Every ciphertext leads with its own random 24-byte nonce:
//!   [ nonce (24 bytes) | ciphertext + tag (16 bytes) ]
//! The nonce is drawn here, on every call. Callers never supply one.

use chacha20poly1305::{
    aead::{Aead, Payload},
    Key, KeyInit, XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Nonce length fixed by XChaCha20-Poly1305.
pub const NONCE_LEN: usize = 24;

/// Poly1305 authentication tag length.
const TAG_LEN: usize = 16;

fn cipher(key: &[u8; 32]) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(Key::from_slice(key))
}

/// Seal `plaintext` under `key` with a fresh random nonce.
/// `aad` is authenticated but not encrypted.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let sealed = cipher(key)
        .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::AeadEncrypt)?;

    let mut wire = Vec::with_capacity(NONCE_LEN + sealed.len());
    wire.extend_from_slice(&nonce);
    wire.extend_from_slice(&sealed);
    Ok(wire)
}

/// Open wire-format bytes (nonce || ciphertext+tag). Fails closed on a tag
/// mismatch; the plaintext buffer zeroizes itself when the caller drops it.
pub fn decrypt(key: &[u8; 32], wire: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if wire.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::AeadDecrypt);
    }
    let (nonce, sealed) = wire.split_at(NONCE_LEN);

    let opened = cipher(key)
        .decrypt(XNonce::from_slice(nonce), Payload { msg: sealed, aad })
        .map_err(|_| CryptoError::AeadDecrypt)?;

    Ok(Zeroizing::new(opened))
}
