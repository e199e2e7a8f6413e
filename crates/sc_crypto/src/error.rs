use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("AEAD encryption failed")]
    AeadEncrypt,

    #[error("AEAD decryption failed: ciphertext did not authenticate")]
    AeadDecrypt,

    #[error("Envelope decryption failed")]
    OpenFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
