//! Rendering-surface callback interface.
//!
//! The engine never touches a rendering surface directly; it calls back into
//! whatever adapter the embedder registered. The adapter in turn drives the
//! engine through its public operations and nothing else.

use crate::portal::types::{Contact, Message};
use async_trait::async_trait;

/// Callbacks the sync engine fires whenever its state changes.
#[async_trait]
pub trait PortalListener: Send + Sync {
    /// The contact list was refreshed. Contacts arrive sorted most recent
    /// first with `unread_count` already filled in.
    async fn render_contact_list(&self, contacts: Vec<Contact>);

    /// The active conversation's loaded messages changed. `pinned_to_bottom`
    /// tells the adapter whether it should keep the scroll position glued to
    /// the newest message.
    async fn render_messages(&self, messages: Vec<Message>, pinned_to_bottom: bool);

    /// An inactive conversation gained inbound messages since the last poll.
    async fn notify_new_inbound_message(&self, contact: Contact, preview: String);

    /// A user-initiated load failed; render an inline error state in place of
    /// the content. The selection stays active, the next action retries.
    async fn on_load_failed(&self, wa_id: String, error: String);

    /// A send failed after the optimistic entry was rolled back. `body` is
    /// the original text so the adapter can restore the input field.
    async fn on_send_failed(&self, wa_id: String, body: String, error: String);
}

/// Default listener that ignores everything.
pub struct EmptyPortalListener;

#[async_trait]
impl PortalListener for EmptyPortalListener {
    async fn render_contact_list(&self, _contacts: Vec<Contact>) {}
    async fn render_messages(&self, _messages: Vec<Message>, _pinned_to_bottom: bool) {}
    async fn notify_new_inbound_message(&self, _contact: Contact, _preview: String) {}
    async fn on_load_failed(&self, _wa_id: String, _error: String) {}
    async fn on_send_failed(&self, _wa_id: String, _body: String, _error: String) {}
}
