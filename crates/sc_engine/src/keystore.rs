//! Key store: persisted key records + in-memory active session.
//!
//! One JSON `KeyRecord` file per identity known to this device, in a key
//! directory that survives restarts. The local user's record carries the
//! wrapped secret key; peer records carry only the learned public key.
//!
//! The secret key is wrapped as Argon2id(password, salt) → XChaCha20-
//! Poly1305. An authentication failure on unwrap is the ONLY signal that a
//! password is wrong — the error surfaced for it is identical to the
//! absent-account case so login failures cannot be used to enumerate
//! accounts.
//!
//! At most one `ActiveSession` exists at a time; `unlock` replaces any
//! previous one outright (the old key material is dropped and zeroized,
//! never merged).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use sc_crypto::{aead, kdf, keys::PublicKeyBytes, BoxKeyPair};
use sc_proto::UserId;

use crate::error::EngineError;

const WRAP_AAD: &[u8] = b"sc-keyrecord-v1";

/// At-rest form, one file per identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyRecord {
    public_key: PublicKeyBytes,
    /// base64url(nonce || wrapped secret), present only for the local user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encrypted_secret_key: Option<String>,
    /// Hex-encoded 16-byte Argon2id salt, present alongside the wrapped key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kdf_salt: Option<String>,
}

/// In-memory key material for the unlocked identity. Zeroized on drop;
/// never persisted.
#[derive(ZeroizeOnDrop)]
pub struct ActiveSession {
    #[zeroize(skip)]
    pub user_id: UserId,
    #[zeroize(skip)]
    pub public: PublicKeyBytes,
    secret_bytes: [u8; 32],
}

impl ActiveSession {
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret_bytes
    }
}

/// Owns this device's key material and the public keys learned for peers.
/// Nothing else touches raw keys — collaborators receive it by `Arc`.
pub struct KeyStore {
    dir: PathBuf,
    peers: RwLock<HashMap<UserId, PublicKeyBytes>>,
    session: RwLock<Option<ActiveSession>>,
}

impl KeyStore {
    /// Open (creating if needed) the key directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, EngineError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            peers: RwLock::new(HashMap::new()),
            session: RwLock::new(None),
        })
    }

    fn record_path(&self, user_id: &UserId) -> PathBuf {
        // File names are the hex of the raw id bytes: distinct ids can
        // never collide onto one record, and a hostile id cannot escape
        // the key directory.
        self.dir.join(format!("{}.json", hex::encode(user_id.as_str())))
    }

    fn load_record(&self, user_id: &UserId) -> Result<Option<KeyRecord>, EngineError> {
        let path = self.record_path(user_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save_record(&self, user_id: &UserId, record: &KeyRecord) -> Result<(), EngineError> {
        let path = self.record_path(user_id);
        fs::write(&path, serde_json::to_vec_pretty(record)?)?;
        Ok(())
    }

    /// Generate (or reuse) a key pair for `user_id`, wrap the secret under
    /// `password`, persist the record, and return the public key so the
    /// caller can publish it to the directory.
    pub fn persist_own_keys(
        &self,
        user_id: &UserId,
        password: &str,
    ) -> Result<PublicKeyBytes, EngineError> {
        if let Some(record) = self.load_record(user_id)? {
            if record.encrypted_secret_key.is_some() {
                return Ok(record.public_key);
            }
        }

        let pair = BoxKeyPair::generate();
        let salt = kdf::generate_salt();
        let wrap = kdf::wrap_key_from_password(password.as_bytes(), &salt)
            .map_err(|_| EngineError::InvalidCredential)?;
        let wrapped = aead::encrypt(&wrap.0, pair.secret_bytes(), WRAP_AAD)
            .map_err(|_| EngineError::InvalidCredential)?;

        let record = KeyRecord {
            public_key: pair.public,
            encrypted_secret_key: Some(b64(&wrapped)),
            kdf_salt: Some(hex::encode(salt)),
        };
        self.save_record(user_id, &record)?;

        tracing::info!(
            target: "sc_engine",
            event = "own_keys_persisted",
            user_id = %user_id,
            fingerprint = %pair.public.fingerprint(),
        );
        Ok(pair.public)
    }

    /// Unlock `user_id` with `password` and install the result as the
    /// process's active session, replacing any previous one.
    ///
    /// An absent record is treated as first use (keys are generated and
    /// persisted, then unlocked). A wrong password fails with
    /// `InvalidCredential`, which carries no more detail than the
    /// absent-account case.
    pub fn unlock(&self, user_id: &UserId, password: &str) -> Result<(), EngineError> {
        let record = match self.load_record(user_id)? {
            Some(r) if r.encrypted_secret_key.is_some() => r,
            _ => {
                self.persist_own_keys(user_id, password)?;
                self.load_record(user_id)?.ok_or(EngineError::InvalidCredential)?
            }
        };

        let wrapped = record
            .encrypted_secret_key
            .as_deref()
            .ok_or(EngineError::InvalidCredential)?;
        let salt_hex = record.kdf_salt.as_deref().ok_or(EngineError::InvalidCredential)?;
        let salt: [u8; 16] = hex::decode(salt_hex)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or(EngineError::InvalidCredential)?;

        let wrap = kdf::wrap_key_from_password(password.as_bytes(), &salt)
            .map_err(|_| EngineError::InvalidCredential)?;
        let wire = b64d(wrapped).ok_or(EngineError::InvalidCredential)?;
        let secret = aead::decrypt(&wrap.0, &wire, WRAP_AAD)
            .map_err(|_| EngineError::InvalidCredential)?;
        let secret_bytes: [u8; 32] = secret
            .as_slice()
            .try_into()
            .map_err(|_| EngineError::InvalidCredential)?;

        *self.session.write() = Some(ActiveSession {
            user_id: user_id.clone(),
            public: record.public_key,
            secret_bytes,
        });

        tracing::info!(target: "sc_engine", event = "unlocked", user_id = %user_id);
        Ok(())
    }

    /// Discard the active session. The secret bytes are zeroized on drop.
    pub fn lock(&self) {
        if self.session.write().take().is_some() {
            tracing::info!(target: "sc_engine", event = "locked");
        }
    }

    /// Idempotent upsert into the peer key table, persisted so learned keys
    /// survive restarts.
    pub fn remember_peer_key(
        &self,
        peer_id: &UserId,
        public_key: PublicKeyBytes,
    ) -> Result<(), EngineError> {
        if self.peers.read().get(peer_id).copied() == Some(public_key) {
            return Ok(());
        }
        self.peers.write().insert(peer_id.clone(), public_key);

        // Never clobber our own record (which carries the wrapped secret).
        let record = match self.load_record(peer_id)? {
            Some(mut existing) => {
                existing.public_key = public_key;
                existing
            }
            None => KeyRecord {
                public_key,
                encrypted_secret_key: None,
                kdf_salt: None,
            },
        };
        self.save_record(peer_id, &record)
    }

    /// Pure lookup — never triggers network access.
    pub fn peer_key(&self, peer_id: &UserId) -> Option<PublicKeyBytes> {
        if let Some(key) = self.peers.read().get(peer_id) {
            return Some(*key);
        }
        // Fall back to a record learned in an earlier process lifetime.
        match self.load_record(peer_id) {
            Ok(Some(record)) => {
                self.peers.write().insert(peer_id.clone(), record.public_key);
                Some(record.public_key)
            }
            _ => None,
        }
    }

    /// Run `f` against the active session, if any.
    pub fn with_session<R>(&self, f: impl FnOnce(&ActiveSession) -> R) -> Option<R> {
        self.session.read().as_ref().map(f)
    }

    /// Id of the unlocked identity, if any.
    pub fn session_user(&self) -> Option<UserId> {
        self.session.read().as_ref().map(|s| s.user_id.clone())
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.read().is_some()
    }
}

fn b64(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.encode(bytes)
}

fn b64d(s: &str) -> Option<Vec<u8>> {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.decode(s).ok()
}
