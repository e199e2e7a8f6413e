//! sc_crypto — SecureChat cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Nonces are generated internally, never accepted from callers.
//!
//! # Module layout
//! - `keys`     — X25519 box key pairs + public key newtype
//! - `boxseal`  — asymmetric box transform (X25519 + HKDF + XChaCha20-Poly1305)
//! - `fallback` — fixed-key symmetric scheme (degraded mode)
//! - `aead`     — XChaCha20-Poly1305 encrypt/decrypt helpers
//! - `kdf`      — Argon2id password-based key derivation
//! - `error`    — unified error type

pub mod aead;
pub mod boxseal;
pub mod error;
pub mod fallback;
pub mod kdf;
pub mod keys;

pub use error::CryptoError;
pub use keys::{BoxKeyPair, PublicKeyBytes};
