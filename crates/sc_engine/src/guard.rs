//! Session credential guard.
//!
//! Runs a fixed-interval refresh loop while a session exists. A refresh
//! that returns a new session identifier rebinds the transport in place —
//! the conversation cache and the unlocked key material are untouched, so
//! nothing is lost or re-fetched. A rejected refresh is fatal: the key
//! store is locked and the surrounding application is signalled to force
//! re-authentication.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use sc_proto::SessionCredential;

use crate::{
    keystore::KeyStore,
    traits::{AuthService, DeliveryTransport},
};

/// Default cadence for credential refresh.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Broadcast state of the logical session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Active,
    /// Refresh was rejected; the application must force re-authentication.
    Expired,
}

pub fn spawn_refresh_loop(
    auth: Arc<dyn AuthService>,
    transport: Arc<dyn DeliveryTransport>,
    keys: Arc<KeyStore>,
    credential: Arc<Mutex<Option<SessionCredential>>>,
    events: watch::Sender<SessionEvent>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        // The first tick fires immediately; skip it so the freshly-issued
        // credential is not refreshed at once.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let current = match credential.lock().await.clone() {
                Some(c) => c,
                None => {
                    tracing::debug!(target: "sc_engine", event = "refresh_skipped_no_credential");
                    continue;
                }
            };

            match auth.refresh(&current.token).await {
                Ok(fresh) => {
                    let rotated = fresh.session_id != current.session_id;
                    if rotated {
                        // Rebind before exposing the new credential so no
                        // send races onto a dead binding.
                        if let Err(err) = transport.bind_session(&fresh.session_id).await {
                            tracing::warn!(
                                target: "sc_engine",
                                event = "rebind_failed",
                                error = %err,
                            );
                        } else {
                            tracing::info!(
                                target: "sc_engine",
                                event = "session_rotated",
                                session_id = %fresh.session_id,
                            );
                        }
                    }
                    *credential.lock().await = Some(fresh);
                }
                Err(err) => {
                    tracing::error!(
                        target: "sc_engine",
                        event = "refresh_rejected",
                        error = %err,
                    );
                    keys.lock();
                    *credential.lock().await = None;
                    let _ = events.send(SessionEvent::Expired);
                    break;
                }
            }
        }
    })
}
