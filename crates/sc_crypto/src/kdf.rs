//! Password-based key derivation.
//!
//! A persisted secret key never touches disk in the clear; it is wrapped
//! under a key derived here from the account password. Argon2id with a
//! per-identity random salt; the salt lives beside the wrapped key and is
//! not secret.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

/// Salt length for the wrapping-key derivation.
pub const SALT_LEN: usize = 16;

/// 32-byte wrapping key derived from a user password. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct WrapKey(pub [u8; 32]);

/// Derive a wrapping key from `password` and a per-identity salt.
///
/// Argon2id, 64 MiB / 3 passes / 1 lane. Interactive-use parameters; a
/// wrong password is only detectable when the wrapped key fails to
/// authenticate, not here.
pub fn wrap_key_from_password(
    password: &[u8],
    salt: &[u8; SALT_LEN],
) -> Result<WrapKey, CryptoError> {
    let params = Params::new(64 * 1024, 3, 1, Some(32))
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    let mut key = [0u8; 32];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(WrapKey(key))
}

/// Fresh random salt, generated once per identity and stored with the record.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}
