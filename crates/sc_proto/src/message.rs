//! Decrypted message types (the cache form).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::UserId;

/// Which cipher path produced (or consumed) a given plaintext.
///
/// `Fallback` marks the degraded fixed-key mode; surfacing it lets tests
/// and any future UI warning distinguish real end-to-end protection from
/// transport-only obfuscation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CipherPath {
    /// Asymmetric box transform — readable only by the two endpoints.
    Sealed,
    /// Fixed-key symmetric scheme — degraded mode.
    Fallback,
}

/// One decrypted message as held by the conversation cache.
///
/// Never mutated after creation; cache updates are append/merge only.
/// `id` is the de-duplication key, `sent_at` the sort key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    /// `None` when the envelope could not be decrypted and this entry is a
    /// placeholder for the conversation slot.
    pub path: Option<CipherPath>,
}

impl Message {
    pub fn is_placeholder(&self) -> bool {
        self.path.is_none()
    }
}
