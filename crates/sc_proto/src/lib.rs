//! sc_proto — SecureChat protocol types and serialisation
//!
//! # Module layout
//! - `identity` — canonical `UserId` + directory `Identity`
//! - `envelope` — wire `MessageEnvelope` + raw `InboundEvent` with boundary defaulting
//! - `message`  — cache-form `Message` + `CipherPath` tag
//! - `api`      — collaborator DTOs (history records, session credentials)

pub mod api;
pub mod envelope;
pub mod identity;
pub mod message;

pub use api::{HistoryRecord, SessionCredential};
pub use envelope::{InboundEvent, MessageEnvelope};
pub use identity::{Identity, UserId};
pub use message::{CipherPath, Message};
