//! Per-conversation message cache.
//!
//! One bucket per peer id, each an ordered, de-duplicated sequence of
//! decrypted messages. The cache is the single source of truth for ALL
//! peers simultaneously — inbound delivery writes to whichever bucket the
//! sender belongs to, selected or not.
//!
//! Bucket lifecycle: `Empty -> Loading -> Ready`.
//!   - `Empty`: peer never selected this session (bucket absent).
//!   - `Loading`: a history fetch is outstanding. Appends arriving during
//!     the fetch are kept and merged when the fetch seeds the bucket.
//!   - `Ready`: the bucket serves snapshots without network access.
//!
//! Invariants:
//!   - no two entries share a message id (duplicate delivery is absorbed);
//!   - entries are non-decreasing by `sent_at` (delivery order is NOT
//!     timestamp order, so append insertion-sorts rather than pushing);
//!   - entries are never mutated after insertion.
//!
//! History responses are written to the bucket of the peer they were
//! fetched for, never to "whatever is currently selected" — a late
//! response for a deselected peer lands harmlessly in its own bucket.

use std::collections::HashMap;

use parking_lot::RwLock;

use sc_proto::{Message, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Empty,
    Loading,
    Ready,
}

#[derive(Default)]
struct Bucket {
    loading: bool,
    messages: Vec<Message>,
}

impl Bucket {
    fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Insert preserving non-decreasing `sent_at`; ties keep arrival order.
    fn insert_sorted(&mut self, message: Message) {
        let at = self
            .messages
            .partition_point(|m| m.sent_at <= message.sent_at);
        self.messages.insert(at, message);
    }
}

pub struct ConversationCache {
    buckets: RwLock<HashMap<UserId, Bucket>>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self { buckets: RwLock::new(HashMap::new()) }
    }

    pub fn state(&self, peer: &UserId) -> ConversationState {
        match self.buckets.read().get(peer) {
            None => ConversationState::Empty,
            Some(b) if b.loading => ConversationState::Loading,
            Some(_) => ConversationState::Ready,
        }
    }

    pub fn is_ready(&self, peer: &UserId) -> bool {
        self.state(peer) == ConversationState::Ready
    }

    /// Mark a bucket as loading ahead of a history fetch. Returns false on
    /// the fast path (bucket already `Ready` — do not re-fetch).
    pub fn begin_load(&self, peer: &UserId) -> bool {
        let mut buckets = self.buckets.write();
        match buckets.get_mut(peer) {
            Some(bucket) if !bucket.loading => false,
            Some(_) => true,
            None => {
                buckets.insert(peer.clone(), Bucket { loading: true, messages: Vec::new() });
                true
            }
        }
    }

    /// Seed a bucket from fetched history, merging whatever was appended
    /// while the fetch was outstanding, and promote it to `Ready`.
    pub fn seed(&self, peer: &UserId, history: Vec<Message>) {
        let mut buckets = self.buckets.write();
        let bucket = buckets.entry(peer.clone()).or_default();
        for message in history {
            if !bucket.contains(&message.id) {
                bucket.insert_sorted(message);
            }
        }
        bucket.loading = false;
    }

    /// Promote a bucket straight to `Ready` with no history (anonymous
    /// mode). Messages appended earlier in the session are kept.
    pub fn seed_empty(&self, peer: &UserId) {
        let mut buckets = self.buckets.write();
        buckets.entry(peer.clone()).or_default().loading = false;
    }

    /// Append one message to a peer's bucket. De-duplicates by message id
    /// (no-op when already present), insertion-sorts by timestamp, and
    /// transparently promotes an `Empty` bucket to `Ready`. Safe to call
    /// for any peer at any time relative to `begin_load`/`seed`.
    ///
    /// Returns true when the message was inserted.
    pub fn append(&self, peer: &UserId, message: Message) -> bool {
        let mut buckets = self.buckets.write();
        let bucket = buckets.entry(peer.clone()).or_default();
        if bucket.contains(&message.id) {
            return false;
        }
        bucket.insert_sorted(message);
        true
    }

    /// Pure read of the current ordered sequence for display.
    pub fn snapshot(&self, peer: &UserId) -> Vec<Message> {
        self.buckets
            .read()
            .get(peer)
            .map(|b| b.messages.clone())
            .unwrap_or_default()
    }

    /// Total number of cached messages across all peers.
    pub fn len(&self) -> usize {
        self.buckets.read().values().map(|b| b.messages.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConversationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use sc_proto::CipherPath;

    fn msg(id: &str, ts_offset: i64) -> Message {
        let base = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        Message {
            id: id.to_string(),
            sender_id: UserId::new("peer"),
            recipient_id: UserId::new("me"),
            body: format!("body-{id}"),
            sent_at: base + Duration::seconds(ts_offset),
            path: Some(CipherPath::Sealed),
        }
    }

    #[test]
    fn out_of_order_appends_sort_by_timestamp() {
        let cache = ConversationCache::new();
        let peer = UserId::new("peer");

        cache.append(&peer, msg("m3", 3));
        cache.append(&peer, msg("m1", 1));
        cache.append(&peer, msg("m2", 2));

        let ids: Vec<_> = cache.snapshot(&peer).iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
    }

    #[test]
    fn duplicate_id_is_a_noop() {
        let cache = ConversationCache::new();
        let peer = UserId::new("peer");

        assert!(cache.append(&peer, msg("m1", 1)));
        assert!(!cache.append(&peer, msg("m1", 99)));

        let snapshot = cache.snapshot(&peer);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].body, "body-m1");
    }

    #[test]
    fn append_promotes_empty_to_ready() {
        let cache = ConversationCache::new();
        let peer = UserId::new("peer");
        assert_eq!(cache.state(&peer), ConversationState::Empty);

        cache.append(&peer, msg("m1", 1));
        assert_eq!(cache.state(&peer), ConversationState::Ready);
    }

    #[test]
    fn begin_load_fast_path_refuses_refetch() {
        let cache = ConversationCache::new();
        let peer = UserId::new("peer");

        assert!(cache.begin_load(&peer));
        cache.seed(&peer, vec![msg("m1", 1)]);
        assert!(!cache.begin_load(&peer), "Ready bucket must not re-fetch");
    }

    #[test]
    fn seed_merges_messages_appended_during_load() {
        let cache = ConversationCache::new();
        let peer = UserId::new("peer");

        cache.begin_load(&peer);
        // Inbound delivery lands while the fetch is outstanding.
        cache.append(&peer, msg("live", 5));
        cache.seed(&peer, vec![msg("h1", 1), msg("live", 5), msg("h2", 2)]);

        let ids: Vec<_> = cache.snapshot(&peer).iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, ["h1", "h2", "live"]);
    }

    #[test]
    fn buckets_are_independent_per_peer() {
        let cache = ConversationCache::new();
        let a = UserId::new("a");
        let b = UserId::new("b");

        cache.append(&a, msg("m1", 1));
        cache.append(&b, msg("m2", 2));

        assert_eq!(cache.snapshot(&a).len(), 1);
        assert_eq!(cache.snapshot(&b).len(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let cache = ConversationCache::new();
        let peer = UserId::new("peer");

        cache.append(&peer, msg("first", 1));
        cache.append(&peer, msg("second", 1));

        let ids: Vec<_> = cache.snapshot(&peer).iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, ["first", "second"]);
    }

    #[test]
    fn seed_empty_promotes_without_history() {
        let cache = ConversationCache::new();
        let peer = UserId::new("peer");

        cache.begin_load(&peer);
        cache.seed_empty(&peer);
        assert_eq!(cache.state(&peer), ConversationState::Ready);
        assert!(cache.snapshot(&peer).is_empty());
    }

    #[test]
    fn snapshot_of_unknown_peer_is_empty() {
        let cache = ConversationCache::new();
        assert!(cache.snapshot(&UserId::new("nobody")).is_empty());
    }
}
