//! Collaborator request/response types.
//! These map directly to JSON bodies on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::UserId;

/// One stored envelope as returned by the bulk history fetch.
///
/// The store promises neither ordering nor correct pair filtering — the
/// engine re-filters and re-sorts on its side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub sender_id: UserId,
    #[serde(alias = "user_id")]
    pub recipient_id: UserId,
    #[serde(alias = "encrypted_message")]
    pub ciphertext: String,
    #[serde(alias = "timestamp")]
    pub sent_at: DateTime<Utc>,
}

/// Product of a successful credential refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionCredential {
    pub token: String,
    pub session_id: String,
}
