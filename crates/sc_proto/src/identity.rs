//! Canonical identity types.
//!
//! Upstream collaborators are inconsistent about the identity field name:
//! the auth service says `user_id`, the directory and delivery events say
//! `id`, and some payloads carry both. `UserId` is the single canonical
//! correlation key — every external payload normalizes into it at the
//! boundary so one person can never fork into two identities.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use sc_crypto::keys::PublicKeyBytes;

/// Canonical user identifier. Opaque, trimmed, case-preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

/// Directory view of a registered user.
///
/// `public_key` is absent until the user has published one; messaging such
/// a peer runs on the degraded fallback path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    #[serde(alias = "user_id")]
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKeyBytes>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_is_trimmed() {
        assert_eq!(UserId::new("  u1 "), UserId::new("u1"));
    }

    #[test]
    fn identity_accepts_id_field() {
        let parsed: Identity =
            serde_json::from_str(r#"{"id": "u1", "username": "alice"}"#).unwrap();
        assert_eq!(parsed.id, UserId::new("u1"));
        assert!(parsed.public_key.is_none());
    }

    #[test]
    fn identity_accepts_user_id_alias() {
        let parsed: Identity =
            serde_json::from_str(r#"{"user_id": "u1", "username": "alice"}"#).unwrap();
        assert_eq!(parsed.id, UserId::new("u1"));
    }

    #[test]
    fn aliased_forms_yield_the_same_identity() {
        let a: Identity = serde_json::from_str(r#"{"id": "u1", "username": "a"}"#).unwrap();
        let b: Identity = serde_json::from_str(r#"{"user_id": "u1", "username": "a"}"#).unwrap();
        assert_eq!(a.id, b.id);
    }
}
