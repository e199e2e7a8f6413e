//! Contracts for the external collaborators.
//!
//! The auth service, user directory, history store, and delivery channel
//! are outside this engine; it reaches them only through these traits.
//! Network timeouts and transport-level retry are owned by the
//! implementations — no engine operation blocks indefinitely on them.

use async_trait::async_trait;
use tokio::sync::mpsc;

use sc_crypto::keys::PublicKeyBytes;
use sc_proto::{Identity, InboundEvent, MessageEnvelope, SessionCredential, UserId};

use crate::error::EngineError;

/// User directory (read) + key publication (write).
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up a user by id. `Ok(None)` means the id is unknown.
    async fn lookup(&self, user_id: &UserId) -> Result<Option<Identity>, EngineError>;

    /// Make the local public key discoverable via `lookup`.
    async fn publish_key(
        &self,
        user_id: &UserId,
        public_key: &PublicKeyBytes,
    ) -> Result<(), EngineError>;
}

/// Bulk history fetch (read).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Fetch stored envelopes for the `(local, peer)` pair. The engine
    /// independently re-filters and re-sorts — upstream filtering and
    /// ordering are not trusted.
    async fn fetch(
        &self,
        local: &UserId,
        peer: &UserId,
    ) -> Result<Vec<sc_proto::HistoryRecord>, EngineError>;
}

/// Real-time delivery channel. At-least-once, unordered, auto-reconnect.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Hand one outbound envelope to the transport. The transport owns
    /// retry; the engine does not call this twice for one message.
    async fn send(&self, envelope: &MessageEnvelope) -> Result<(), EngineError>;

    /// Open an inbound event stream. Each call replaces the previous
    /// logical subscription on the transport side.
    async fn subscribe(&self) -> Result<mpsc::Receiver<InboundEvent>, EngineError>;

    /// Rebind the connection to a new session identifier without dropping
    /// in-flight events.
    async fn bind_session(&self, session_id: &str) -> Result<(), EngineError>;
}

/// Credential refresh (write).
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange the current token for a fresh credential. An `Err` means
    /// the session is no longer valid.
    async fn refresh(&self, token: &str) -> Result<SessionCredential, EngineError>;
}
