//! sc_engine — SecureChat end-to-end encrypted messaging engine
//!
//! The client-side core: key lifecycle, cipher path selection, the
//! per-conversation message cache, inbound routing, and session
//! credential upkeep. Everything outside — auth service, user directory,
//! history store, delivery transport, display layer — is an external
//! collaborator reached through the traits in [`traits`].
//!
//! # Module layout
//! - `keystore` — persisted key records, peer key table, active session
//! - `policy`   — the one sealed-vs-fallback decision function
//! - `cache`    — ordered, de-duplicated per-peer conversation buckets
//! - `router`   — inbound delivery routing
//! - `guard`    — credential refresh / transport rebind loop
//! - `client`   — the `Messenger` facade tying it together
//! - `traits`   — external collaborator contracts
//! - `error`    — engine failure taxonomy

pub mod cache;
pub mod client;
pub mod error;
pub mod guard;
pub mod keystore;
pub mod policy;
pub mod router;
pub mod traits;

pub use cache::{ConversationCache, ConversationState};
pub use client::{Collaborators, Messenger};
pub use error::EngineError;
pub use guard::SessionEvent;
pub use keystore::KeyStore;
pub use router::{MessageRouter, Routed};
