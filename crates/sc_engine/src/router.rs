//! Inbound delivery routing.
//!
//! For each delivery event: normalize identities, drop anything not
//! addressed to the local user, pick the decryption path, write the result
//! into the sender's cache bucket unconditionally, and notify the active
//! view only when the sender is the currently selected peer.
//!
//! A corrupt or unparseable envelope is logged and skipped — it must never
//! stop delivery of later events.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use sc_proto::{CipherPath, InboundEvent, Message, UserId};

use crate::{
    cache::ConversationCache,
    error::EngineError,
    keystore::KeyStore,
    policy,
    traits::Directory,
};

/// Outcome of routing one inbound event.
#[derive(Debug, PartialEq, Eq)]
pub enum Routed {
    /// Message decrypted and appended to the sender's bucket.
    Delivered(CipherPath),
    /// Duplicate of an already-cached message id.
    Duplicate,
    /// Not addressed to the local identity.
    NotAddressedToUs,
}

pub struct MessageRouter {
    keys: Arc<KeyStore>,
    cache: Arc<ConversationCache>,
    directory: Arc<dyn Directory>,
    /// Peer whose conversation the display layer is showing, if any.
    active_peer: Arc<RwLock<Option<UserId>>>,
    /// Side channel to the display layer for the active conversation.
    view_tx: mpsc::UnboundedSender<Message>,
}

/// Look up a peer key: keystore first, then one on-demand directory fetch.
/// A learned key is remembered (persisted) for later sessions. Shared by
/// the receive, send, and history-seeding paths.
pub(crate) async fn resolve_peer_key(
    keys: &KeyStore,
    directory: &dyn Directory,
    peer: &UserId,
) -> Option<sc_crypto::keys::PublicKeyBytes> {
    if let Some(key) = keys.peer_key(peer) {
        return Some(key);
    }
    match directory.lookup(peer).await {
        Ok(Some(identity)) => {
            if let Some(key) = identity.public_key {
                if let Err(err) = keys.remember_peer_key(peer, key) {
                    tracing::warn!(
                        target: "sc_engine",
                        event = "peer_key_persist_failed",
                        peer = %peer,
                        error = %err,
                    );
                }
                return Some(key);
            }
            None
        }
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(
                target: "sc_engine",
                event = "directory_lookup_failed",
                peer = %peer,
                error = %err,
            );
            None
        }
    }
}

impl MessageRouter {
    pub fn new(
        keys: Arc<KeyStore>,
        cache: Arc<ConversationCache>,
        directory: Arc<dyn Directory>,
        active_peer: Arc<RwLock<Option<UserId>>>,
        view_tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self { keys, cache, directory, active_peer, view_tx }
    }

    /// Route one inbound event. Errors are confined to the one event.
    pub async fn handle_inbound(&self, event: InboundEvent) -> Result<Routed, EngineError> {
        let envelope = event.normalize();

        let local = match self.keys.session_user() {
            Some(id) => id,
            None => return Err(EngineError::NotSignedIn),
        };

        // The transport is trusted to filter by recipient, but do not
        // assume it: misdelivered events are dropped here.
        if envelope.recipient_id != local {
            tracing::debug!(
                target: "sc_engine",
                event = "inbound_discarded",
                recipient_id = %envelope.recipient_id,
                sender_id = %envelope.sender_id,
            );
            return Ok(Routed::NotAddressedToUs);
        }

        let sender = envelope.sender_id.clone();
        let peer_key = resolve_peer_key(&self.keys, self.directory.as_ref(), &sender).await;

        let (body, path) = self
            .keys
            .with_session(|s| {
                policy::decrypt_from(&envelope.ciphertext, peer_key.as_ref(), Some(s))
            })
            .ok_or(EngineError::NotSignedIn)??;

        let message = Message {
            id: envelope.id,
            sender_id: sender.clone(),
            recipient_id: envelope.recipient_id,
            body,
            sent_at: envelope.sent_at,
            path: Some(path),
        };

        // The cache reflects every peer, not only the active conversation.
        if !self.cache.append(&sender, message.clone()) {
            return Ok(Routed::Duplicate);
        }

        tracing::debug!(
            target: "sc_engine",
            event = "inbound_delivered",
            sender_id = %sender,
            message_id = %message.id,
            path = ?path,
        );

        let is_active = self.active_peer.read().as_ref() == Some(&sender);
        if is_active {
            // Display layer gone is not a routing failure.
            let _ = self.view_tx.send(message);
        }

        Ok(Routed::Delivered(path))
    }

    /// Pump an inbound stream until it closes. Per-event failures are
    /// logged and the pump continues — one bad envelope never stops
    /// delivery of the ones behind it.
    pub async fn pump(&self, mut rx: mpsc::Receiver<InboundEvent>) {
        while let Some(event) = rx.recv().await {
            if let Err(err) = self.handle_inbound(event).await {
                tracing::warn!(
                    target: "sc_engine",
                    event = "inbound_dropped",
                    error = %err,
                );
            }
        }
        tracing::debug!(target: "sc_engine", event = "inbound_stream_closed");
    }
}
