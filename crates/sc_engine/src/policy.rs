//! Cipher path selection.
//!
//! The ONE place that decides between the sealed box transform and the
//! fixed-key fallback, shared by the send and receive paths. Every result
//! carries a `CipherPath` tag so the degradation is visible to callers,
//! tests, and any future UI warning.
//!
//! Policy:
//!   - Sealed whenever both the local secret and the peer's public key are
//!     known.
//!   - Fallback otherwise.
//!   - A sealed-path failure degrades to the fallback rather than losing
//!     the message, and is logged as a security-relevant event.

use sc_crypto::{boxseal, fallback, keys::PublicKeyBytes};
use sc_proto::CipherPath;

use crate::{error::EngineError, keystore::ActiveSession};

/// Encrypt `plaintext` for a peer, choosing the strongest available path.
pub fn encrypt_for(
    plaintext: &str,
    peer_key: Option<&PublicKeyBytes>,
    session: Option<&ActiveSession>,
) -> Result<(String, CipherPath), EngineError> {
    if let (Some(peer_key), Some(session)) = (peer_key, session) {
        match boxseal::seal(plaintext, peer_key, session.secret_bytes()) {
            Ok(envelope) => return Ok((envelope, CipherPath::Sealed)),
            Err(err) => {
                tracing::warn!(
                    target: "sc_engine",
                    event = "sealed_encrypt_degraded",
                    error = %err,
                    "sealed path failed, degrading to fallback",
                );
            }
        }
    } else {
        tracing::warn!(
            target: "sc_engine",
            event = "fallback_encrypt",
            has_peer_key = peer_key.is_some(),
            has_session = session.is_some(),
            "asymmetric material unavailable, using fallback scheme",
        );
    }

    let envelope = fallback::fallback_seal(plaintext).map_err(|_| EngineError::DecryptionFailed)?;
    Ok((envelope, CipherPath::Fallback))
}

/// Decrypt an envelope from a peer, trying the sealed path first whenever
/// the material exists, then the fallback. Fails closed when both fail.
pub fn decrypt_from(
    envelope: &str,
    peer_key: Option<&PublicKeyBytes>,
    session: Option<&ActiveSession>,
) -> Result<(String, CipherPath), EngineError> {
    if let (Some(peer_key), Some(session)) = (peer_key, session) {
        match boxseal::open(envelope, peer_key, session.secret_bytes()) {
            Ok(plaintext) => return Ok((plaintext, CipherPath::Sealed)),
            Err(_) => {
                tracing::warn!(
                    target: "sc_engine",
                    event = "sealed_decrypt_degraded",
                    "sealed path failed, attempting fallback",
                );
            }
        }
    }

    match fallback::fallback_open(envelope) {
        Ok(plaintext) => {
            tracing::warn!(target: "sc_engine", event = "fallback_decrypt");
            Ok((plaintext, CipherPath::Fallback))
        }
        Err(_) => Err(EngineError::DecryptionFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::KeyStore;
    use sc_crypto::BoxKeyPair;
    use sc_proto::UserId;
    use tempfile::tempdir;

    fn unlocked_store(user: &str) -> (tempfile::TempDir, KeyStore) {
        let dir = tempdir().unwrap();
        let store = KeyStore::open(dir.path()).unwrap();
        store.unlock(&UserId::new(user), "pw").unwrap();
        (dir, store)
    }

    #[test]
    fn sealed_when_material_available() {
        let (_dir, store) = unlocked_store("alice");
        let peer = BoxKeyPair::generate();

        let (envelope, path) = store
            .with_session(|s| encrypt_for("hi", Some(&peer.public), Some(s)))
            .unwrap()
            .unwrap();
        assert_eq!(path, CipherPath::Sealed);

        // Peer opens it with their secret + our public.
        let ours = store.with_session(|s| s.public).unwrap();
        let plaintext = sc_crypto::boxseal::open(&envelope, &ours, peer.secret_bytes()).unwrap();
        assert_eq!(plaintext, "hi");
    }

    #[test]
    fn fallback_when_peer_key_missing() {
        let (_dir, store) = unlocked_store("alice");
        let (envelope, path) = store
            .with_session(|s| encrypt_for("hi", None, Some(s)))
            .unwrap()
            .unwrap();
        assert_eq!(path, CipherPath::Fallback);
        assert_eq!(sc_crypto::fallback::fallback_open(&envelope).unwrap(), "hi");
    }

    #[test]
    fn fallback_when_not_signed_in() {
        let (_, path) = encrypt_for("hi", None, None).unwrap();
        assert_eq!(path, CipherPath::Fallback);
    }

    #[test]
    fn decrypt_degrades_to_fallback_for_fallback_envelopes() {
        let (_dir, store) = unlocked_store("bob");
        let peer = BoxKeyPair::generate();
        let envelope = sc_crypto::fallback::fallback_seal("degraded hello").unwrap();

        let (plaintext, path) = store
            .with_session(|s| decrypt_from(&envelope, Some(&peer.public), Some(s)))
            .unwrap()
            .unwrap();
        assert_eq!(plaintext, "degraded hello");
        assert_eq!(path, CipherPath::Fallback);
    }

    #[test]
    fn garbage_fails_both_paths() {
        let (_dir, store) = unlocked_store("bob");
        let peer = BoxKeyPair::generate();
        let err = store
            .with_session(|s| decrypt_from("garbage!", Some(&peer.public), Some(s)))
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, EngineError::DecryptionFailed));
    }
}
