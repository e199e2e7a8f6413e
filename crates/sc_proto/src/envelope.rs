//! Encrypted message envelope — what the transport and server see.
//!
//! The server is a DUMB RELAY: it only sees:
//!   - id            (random UUID, used for ack/dedup)
//!   - sender_id     (needed to prevent spam)
//!   - recipient_id  (needed for routing — cannot be avoided)
//!   - sent_at       (needed for history ordering)
//!   - ciphertext    (opaque base64url bytes)
//!   - store_history (whether the server may retain this envelope)
//!
//! The server CANNOT see plaintext or which cipher path produced the
//! ciphertext.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::UserId;

/// On-wire envelope — sent to and received from the delivery channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Generated locally at composition time and reused verbatim on the
    /// wire, so an echoed copy de-duplicates against the local one.
    pub id: String,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    /// base64url(nonce || ciphertext+tag), box or fallback scheme.
    pub ciphertext: String,
    #[serde(alias = "timestamp")]
    pub sent_at: DateTime<Utc>,
    /// False in anonymous mode — the server must not retain the envelope.
    #[serde(default = "default_store_history")]
    pub store_history: bool,
}

fn default_store_history() -> bool {
    true
}

/// Raw inbound delivery event. The transport does not guarantee `id` or
/// `timestamp` are present; `normalize` defaults them at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub sender_id: UserId,
    #[serde(alias = "user_id")]
    pub recipient_id: UserId,
    pub ciphertext: String,
    #[serde(default, alias = "timestamp")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl InboundEvent {
    /// Fill in locally-defaulted fields: a fresh UUID when the event has no
    /// id, the current time when it has no timestamp.
    pub fn normalize(self) -> MessageEnvelope {
        MessageEnvelope {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            ciphertext: self.ciphertext,
            sent_at: self.sent_at.unwrap_or_else(Utc::now),
            store_history: true,
        }
    }
}
