use thiserror::Error;

/// Engine failure taxonomy.
///
/// Cryptographic failures are absorbed as close to the point of failure as
/// possible (policy and router); only `RefreshRejected` and repeated
/// `InvalidCredential` are meant to reach the user.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Password unlock failed. Deliberately carries no detail: "wrong
    /// password" and "no such account" must be indistinguishable to avoid
    /// account enumeration.
    #[error("Cannot sign in")]
    InvalidCredential,

    /// A single envelope is corrupt or keyed wrongly. Recoverable — degrade
    /// or drop that one message, never the session.
    #[error("Envelope decryption failed")]
    DecryptionFailed,

    /// No public key known for the peer (and none discoverable).
    #[error("No public key available for peer {0}")]
    KeyUnavailable(String),

    /// Credential refresh was rejected — fatal to the session.
    #[error("Session refresh rejected: {0}")]
    RefreshRejected(String),

    /// Delivery channel unavailable; the transport collaborator retries,
    /// the engine does not.
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// No active session — the operation requires a prior unlock.
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Key storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Key record serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
