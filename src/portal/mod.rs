//! WhatsApp-style portal client core.
//!
//! The [`engine::SyncEngine`] owns all synchronization state and drives the
//! registered [`listener::PortalListener`]; the embedder's rendering surface
//! stays a thin adapter on top of it.

pub mod api;
pub mod engine;
pub mod error;
pub mod format;
pub mod listener;
pub mod store;
pub mod types;
