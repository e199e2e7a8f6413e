//! The messenger facade — what the surrounding application drives.
//!
//! Owns the key store, the conversation cache, the router, the delivery
//! subscription, and the session guard, and exposes the user-level
//! operations: sign in, select a conversation, send, toggle anonymous
//! mode, sign out.
//!
//! Exactly one delivery subscription exists per logical session. The pump
//! task lives inside a `DeliverySubscription` handle that aborts the task
//! on drop; re-binding stores a new handle in its place, so two live
//! subscriptions can never coexist.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use sc_proto::{CipherPath, Message, MessageEnvelope, SessionCredential, UserId};

use crate::{
    cache::ConversationCache,
    error::EngineError,
    guard::{self, SessionEvent, DEFAULT_REFRESH_INTERVAL},
    keystore::KeyStore,
    policy,
    router::{self, MessageRouter},
    traits::{AuthService, DeliveryTransport, Directory, HistoryStore},
};

/// Owned handle to the single live delivery subscription.
/// Dropping it tears the pump task down.
struct DeliverySubscription {
    task: JoinHandle<()>,
}

impl Drop for DeliverySubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// External collaborators, injected at construction.
pub struct Collaborators {
    pub directory: Arc<dyn Directory>,
    pub history: Arc<dyn HistoryStore>,
    pub transport: Arc<dyn DeliveryTransport>,
    pub auth: Arc<dyn AuthService>,
}

pub struct Messenger {
    keys: Arc<KeyStore>,
    cache: Arc<ConversationCache>,
    router: Arc<MessageRouter>,
    directory: Arc<dyn Directory>,
    history: Arc<dyn HistoryStore>,
    transport: Arc<dyn DeliveryTransport>,
    auth: Arc<dyn AuthService>,

    credential: Arc<Mutex<Option<SessionCredential>>>,
    active_peer: Arc<RwLock<Option<UserId>>>,
    anonymous: AtomicBool,

    subscription: Mutex<Option<DeliverySubscription>>,
    guard_task: Mutex<Option<JoinHandle<()>>>,
    refresh_interval: tokio::time::Duration,

    session_events: watch::Sender<SessionEvent>,
    view_rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
}

impl Messenger {
    /// Build a messenger over the key directory at `key_dir`.
    pub fn new(key_dir: impl AsRef<Path>, collaborators: Collaborators) -> Result<Self, EngineError> {
        Self::with_refresh_interval(key_dir, collaborators, DEFAULT_REFRESH_INTERVAL)
    }

    /// As `new`, with an explicit refresh cadence (tests drive this).
    pub fn with_refresh_interval(
        key_dir: impl AsRef<Path>,
        collaborators: Collaborators,
        refresh_interval: tokio::time::Duration,
    ) -> Result<Self, EngineError> {
        let keys = Arc::new(KeyStore::open(key_dir)?);
        let cache = Arc::new(ConversationCache::new());
        let active_peer = Arc::new(RwLock::new(None));
        let (view_tx, view_rx) = mpsc::unbounded_channel();
        let (session_events, _) = watch::channel(SessionEvent::Active);

        let router = Arc::new(MessageRouter::new(
            Arc::clone(&keys),
            Arc::clone(&cache),
            Arc::clone(&collaborators.directory),
            Arc::clone(&active_peer),
            view_tx,
        ));

        Ok(Self {
            keys,
            cache,
            router,
            directory: collaborators.directory,
            history: collaborators.history,
            transport: collaborators.transport,
            auth: collaborators.auth,
            credential: Arc::new(Mutex::new(None)),
            active_peer,
            anonymous: AtomicBool::new(false),
            subscription: Mutex::new(None),
            guard_task: Mutex::new(None),
            refresh_interval,
            session_events,
            view_rx: Mutex::new(Some(view_rx)),
        })
    }

    /// Sign in: unlock the key store, publish the public key, bind the
    /// transport to the issued credential, open the delivery subscription,
    /// and start the refresh guard.
    pub async fn login(
        &self,
        user_id: &UserId,
        password: &str,
        credential: SessionCredential,
    ) -> Result<(), EngineError> {
        self.keys.unlock(user_id, password)?;

        let public = self
            .keys
            .with_session(|s| s.public)
            .ok_or(EngineError::NotSignedIn)?;
        self.directory.publish_key(user_id, &public).await?;

        self.transport.bind_session(&credential.session_id).await?;
        *self.credential.lock().await = Some(credential);

        self.bind_delivery().await?;

        let guard_task = guard::spawn_refresh_loop(
            Arc::clone(&self.auth),
            Arc::clone(&self.transport),
            Arc::clone(&self.keys),
            Arc::clone(&self.credential),
            self.session_events.clone(),
            self.refresh_interval,
        );
        if let Some(old) = self.guard_task.lock().await.replace(guard_task) {
            old.abort();
        }

        let _ = self.session_events.send(SessionEvent::Active);
        tracing::info!(target: "sc_engine", event = "login", user_id = %user_id);
        Ok(())
    }

    /// (Re-)establish the single delivery subscription. The previous
    /// handle, if any, is dropped — and with it its pump task — before the
    /// new one is stored, so duplicate processing cannot occur.
    pub async fn bind_delivery(&self) -> Result<(), EngineError> {
        let rx = self.transport.subscribe().await?;
        let router = Arc::clone(&self.router);
        let task = tokio::spawn(async move { router.pump(rx).await });

        *self.subscription.lock().await = Some(DeliverySubscription { task });
        tracing::debug!(target: "sc_engine", event = "delivery_bound");
        Ok(())
    }

    /// Select a conversation, returning its ordered history.
    ///
    /// Fast path: a `Ready` bucket is returned as-is, with no network
    /// access and no reordering. Otherwise the bulk history is fetched
    /// (unless anonymous mode disables it), re-filtered to exactly the
    /// `(local, peer)` pair in either direction, decrypted, and seeded
    /// sorted by timestamp. The seed is written to the bucket of the peer
    /// the fetch was issued for, so a stale response cannot leak into a
    /// conversation selected later.
    pub async fn select_conversation(&self, peer: &UserId) -> Result<Vec<Message>, EngineError> {
        let local = self.keys.session_user().ok_or(EngineError::NotSignedIn)?;
        *self.active_peer.write() = Some(peer.clone());

        if self.cache.is_ready(peer) {
            return Ok(self.cache.snapshot(peer));
        }

        if self.anonymous.load(Ordering::Relaxed) {
            self.cache.seed_empty(peer);
            return Ok(self.cache.snapshot(peer));
        }

        if self.cache.begin_load(peer) {
            let records = self.history.fetch(&local, peer).await?;
            let peer_key =
                router::resolve_peer_key(&self.keys, self.directory.as_ref(), peer).await;

            let mut seeded = Vec::with_capacity(records.len());
            for record in records {
                // Upstream filtering is not trusted: keep exactly the
                // local/peer pair, either direction.
                let pair_matches = (record.sender_id == local && record.recipient_id == *peer)
                    || (record.sender_id == *peer && record.recipient_id == local);
                if !pair_matches {
                    continue;
                }

                let decrypted = self.keys.with_session(|s| {
                    policy::decrypt_from(&record.ciphertext, peer_key.as_ref(), Some(s))
                });
                let (body, path) = match decrypted {
                    Some(Ok((body, path))) => (body, Some(path)),
                    // One undecryptable record degrades to a placeholder in
                    // its slot instead of failing the conversation.
                    Some(Err(_)) | None => {
                        tracing::warn!(
                            target: "sc_engine",
                            event = "history_record_undecryptable",
                            message_id = %record.id,
                        );
                        ("[message could not be decrypted]".to_string(), None)
                    }
                };

                seeded.push(Message {
                    id: record.id,
                    sender_id: record.sender_id,
                    recipient_id: record.recipient_id,
                    body,
                    sent_at: record.sent_at,
                    path,
                });
            }
            self.cache.seed(peer, seeded);
        }

        Ok(self.cache.snapshot(peer))
    }

    /// Compose and send a message to `peer`.
    ///
    /// The message id is generated here and reused verbatim on the wire,
    /// so an echoed copy de-duplicates against the optimistic local echo.
    /// The echo is appended before the transport send — the user sees the
    /// message immediately, without waiting for any acknowledgement.
    pub async fn send_message(&self, peer: &UserId, body: &str) -> Result<Message, EngineError> {
        let local = self.keys.session_user().ok_or(EngineError::NotSignedIn)?;

        let peer_key =
            router::resolve_peer_key(&self.keys, self.directory.as_ref(), peer).await;

        let (ciphertext, path) = self
            .keys
            .with_session(|s| policy::encrypt_for(body, peer_key.as_ref(), Some(s)))
            .ok_or(EngineError::NotSignedIn)??;

        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: local.clone(),
            recipient_id: peer.clone(),
            body: body.to_string(),
            sent_at: Utc::now(),
            path: Some(path),
        };

        let envelope = MessageEnvelope {
            id: message.id.clone(),
            sender_id: local,
            recipient_id: peer.clone(),
            ciphertext,
            sent_at: message.sent_at,
            store_history: !self.anonymous.load(Ordering::Relaxed),
        };

        // Optimistic local echo, then the wire.
        self.cache.append(peer, message.clone());
        self.transport.send(&envelope).await?;

        tracing::debug!(
            target: "sc_engine",
            event = "message_sent",
            recipient_id = %peer,
            message_id = %message.id,
            path = ?path,
            store_history = envelope.store_history,
        );
        Ok(message)
    }

    /// Toggle anonymous mode: no history fetch on selection, and outbound
    /// envelopes ask the server not to retain them.
    pub fn set_anonymous_mode(&self, enabled: bool) {
        self.anonymous.store(enabled, Ordering::Relaxed);
    }

    pub fn anonymous_mode(&self) -> bool {
        self.anonymous.load(Ordering::Relaxed)
    }

    /// Pure read of a conversation for display; never mutates.
    pub fn snapshot(&self, peer: &UserId) -> Vec<Message> {
        self.cache.snapshot(peer)
    }

    /// Display fingerprint of the peer's known public key, for manual
    /// verification against an out-of-band copy.
    pub fn peer_fingerprint(&self, peer: &UserId) -> Result<String, EngineError> {
        self.keys
            .peer_key(peer)
            .map(|key| key.fingerprint())
            .ok_or_else(|| EngineError::KeyUnavailable(peer.to_string()))
    }

    /// Which cipher path a send to `peer` would take right now.
    pub fn send_path(&self, peer: &UserId) -> CipherPath {
        if self.keys.peer_key(peer).is_some() && self.keys.is_unlocked() {
            CipherPath::Sealed
        } else {
            CipherPath::Fallback
        }
    }

    /// Observe session lifecycle events (`Expired` forces re-auth).
    pub fn session_events(&self) -> watch::Receiver<SessionEvent> {
        self.session_events.subscribe()
    }

    /// Take the active-view message stream (messages from the currently
    /// selected peer, as routed). Yields `None` after the first call.
    pub async fn take_view_updates(&self) -> Option<mpsc::UnboundedReceiver<Message>> {
        self.view_rx.lock().await.take()
    }

    /// Current session credential, if signed in.
    pub async fn credential(&self) -> Option<SessionCredential> {
        self.credential.lock().await.clone()
    }

    /// Sign out: stop the guard and the subscription, drop the credential,
    /// and lock the key store (zeroizing the in-memory secret).
    pub async fn logout(&self) {
        if let Some(guard_task) = self.guard_task.lock().await.take() {
            guard_task.abort();
        }
        *self.subscription.lock().await = None;
        *self.credential.lock().await = None;
        *self.active_peer.write() = None;
        self.keys.lock();
        tracing::info!(target: "sc_engine", event = "logout");
    }
}
