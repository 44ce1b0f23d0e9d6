//! Conversation sync engine.
//!
//! Keeps the locally displayed contact list and conversation eventually
//! consistent with server state by periodic polling, with optimistic
//! low-latency feedback for user-initiated sends.
//!
//! All mutable state lives behind one `tokio::sync::Mutex`; the lock is never
//! held across a network await, so asynchronous completions interleave
//! arbitrarily. Every completion is guarded by an epoch snapshot: selecting a
//! conversation or switching phone accounts bumps the epoch, and any response
//! that comes back under an older epoch is discarded rather than applied.

use crate::portal::api::{HttpPortalApi, ImageUpload, PortalApi};
use crate::portal::error::PortalError;
use crate::portal::format;
use crate::portal::listener::{EmptyPortalListener, PortalListener};
use crate::portal::store::MessageStore;
use crate::portal::types::{Contact, Direction, Message, MessageStatus};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Notification previews are cut at this many chars.
const PREVIEW_CHARS: usize = 50;

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct SyncEngineConfig {
    /// Business phone account the portal acts for.
    pub phone_id: String,
    /// Portal server base URL.
    pub api_base_url: String,
    /// Fixed polling period.
    pub poll_interval: Duration,
    /// Sender name attached to outgoing image uploads.
    pub sender_name: String,
}

impl SyncEngineConfig {
    /// Default configuration for a phone account.
    pub fn new(phone_id: impl Into<String>) -> Self {
        Self {
            phone_id: phone_id.into(),
            api_base_url: "http://localhost:5000".to_string(),
            poll_interval: Duration::from_secs(8),
            sender_name: "Bot".to_string(),
        }
    }
}

/// Everything the engine mutates, behind one lock.
struct EngineState {
    phone_id: String,
    active_wa_id: Option<String>,
    active_name: Option<String>,
    /// Stale-response guard. Bumped by `select_conversation` / `switch_phone`.
    epoch: u64,
    store: MessageStore,
    /// wa_id -> client-derived unread count.
    unread: HashMap<String, i64>,
    /// Last rendered contact list, most recent conversation first.
    contacts: Vec<Contact>,
    scroll_pinned: bool,
    poll_in_flight: bool,
}

/// The sync engine. One instance per phone account; multiple instances are
/// independent and tear down their own polling timers.
pub struct SyncEngine {
    config: SyncEngineConfig,
    api: Arc<dyn PortalApi>,
    listener: Arc<dyn PortalListener>,
    state: Mutex<EngineState>,
    poll_task: StdMutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Create an engine with the default (no-op) listener.
    pub fn new(config: SyncEngineConfig) -> Result<Self, PortalError> {
        Self::with_listener(config, Arc::new(EmptyPortalListener))
    }

    /// Create an engine with the production HTTP transport.
    pub fn with_listener(
        config: SyncEngineConfig,
        listener: Arc<dyn PortalListener>,
    ) -> Result<Self, PortalError> {
        let client = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let api = Arc::new(HttpPortalApi::new(client, config.api_base_url.clone()));
        Ok(Self::with_api_and_listener(config, api, listener))
    }

    /// Create an engine over an arbitrary transport. This is the seam unit
    /// tests use to run the engine against an in-memory server.
    pub fn with_api_and_listener(
        config: SyncEngineConfig,
        api: Arc<dyn PortalApi>,
        listener: Arc<dyn PortalListener>,
    ) -> Self {
        let state = EngineState {
            phone_id: config.phone_id.clone(),
            active_wa_id: None,
            active_name: None,
            epoch: 0,
            store: MessageStore::new(),
            unread: HashMap::new(),
            contacts: Vec::new(),
            scroll_pinned: true,
            poll_in_flight: false,
        };
        Self {
            config,
            api,
            listener,
            state: Mutex::new(state),
            poll_task: StdMutex::new(None),
        }
    }

    /// Select a conversation: zero its unread count, load its messages and
    /// acknowledge the read to the server.
    ///
    /// Fails softly: a load error is rendered through the listener and the
    /// selection stays active. There is no automatic retry; the next poll
    /// tick or user action is the retry.
    pub async fn select_conversation(&self, wa_id: &str, name: &str) {
        let (epoch, phone_id) = {
            let mut st = self.state.lock().await;
            st.active_wa_id = Some(wa_id.to_string());
            st.active_name = Some(name.to_string());
            st.epoch += 1;
            st.unread.insert(wa_id.to_string(), 0);
            (st.epoch, st.phone_id.clone())
        };
        info!("[Engine] 💬 conversation selected: {} ({})", wa_id, name);

        // Re-render the contact list so the unread badge clears immediately.
        self.push_contact_list().await;

        match self.api.fetch_messages(wa_id, &phone_id).await {
            Ok(messages) => {
                let render = {
                    let mut st = self.state.lock().await;
                    if st.epoch != epoch {
                        debug!("[Engine] discarding stale message load for {}", wa_id);
                        return;
                    }
                    st.store.replace_all(messages);
                    st.scroll_pinned = true;
                    st.store.messages().to_vec()
                };
                debug!(
                    "[Engine] loaded {} messages for {}",
                    render.len(),
                    wa_id
                );
                self.listener.render_messages(render, true).await;

                // Ack the read. Local unread is already zero and the next
                // poll re-derives counts from baselines, so a failure here is
                // only logged.
                if let Err(e) = self.api.mark_read(wa_id, &phone_id).await {
                    warn!("[Engine] mark-read failed for {}: {}", wa_id, e);
                }
            }
            Err(e) => {
                error!("[Engine] ❌ message load failed for {}: {}", wa_id, e);
                self.listener
                    .on_load_failed(wa_id.to_string(), e.to_string())
                    .await;
            }
        }
    }

    /// Fetch the contact list and recompute unread counts.
    ///
    /// The unread delta for a conversation is `max(0, new_count - baseline)`,
    /// accumulated only while the conversation is not active (active means
    /// messages are seen immediately). A contact never seen before has
    /// baseline 0, so its whole backlog counts as unread; that backlog is not
    /// news though, so it fires no notification. Repeating the call with
    /// identical server data changes nothing.
    pub async fn refresh_contact_list(&self) -> Result<(), PortalError> {
        let (epoch, phone_id) = {
            let st = self.state.lock().await;
            (st.epoch, st.phone_id.clone())
        };

        let chats = self.api.fetch_chats(&phone_id).await?;

        let (contacts, notifications) = {
            let mut st = self.state.lock().await;
            if st.epoch != epoch {
                debug!("[Engine] discarding stale contact list");
                return Ok(());
            }

            let mut notifications = Vec::new();
            let mut contacts = chats;
            for contact in contacts.iter_mut() {
                let baseline = st.store.baseline(&contact.wa_id);
                let delta = (contact.message_count - baseline.unwrap_or(0)).max(0);
                let is_active = st.active_wa_id.as_deref() == Some(contact.wa_id.as_str());

                if delta > 0 && !is_active {
                    *st.unread.entry(contact.wa_id.clone()).or_insert(0) += delta;
                }
                st.store.set_baseline(&contact.wa_id, contact.message_count);
                contact.unread_count = st.unread.get(&contact.wa_id).copied().unwrap_or(0);

                // Only messages that arrived since the last look are news;
                // a first-sight backlog stays silent.
                if delta > 0 && !is_active && baseline.is_some() {
                    notifications.push((
                        contact.clone(),
                        format::preview(&contact.last_message, PREVIEW_CHARS),
                    ));
                }
            }

            // Most recent conversation first; contacts with no messages sink
            // to the end. The sort is stable, so equal timestamps keep the
            // server's order.
            contacts.sort_by(|a, b| b.last_message_timestamp.cmp(&a.last_message_timestamp));

            st.contacts = contacts.clone();
            (contacts, notifications)
        };

        debug!("[Engine] contact list refreshed, {} chats", contacts.len());
        self.listener.render_contact_list(contacts).await;
        for (contact, preview) in notifications {
            info!(
                "[Engine] 📬 new messages from {} ({})",
                contact.name, contact.wa_id
            );
            self.listener
                .notify_new_inbound_message(contact, preview)
                .await;
        }
        Ok(())
    }

    /// Send a text message to the active conversation.
    ///
    /// An empty or whitespace-only body is a silent no-op. A non-empty body
    /// is appended optimistically (status pending, keyed by a client
    /// timestamp) and rendered before the network call. Success triggers a
    /// reconcile fetch that replaces the optimistic entry with server truth;
    /// failure rolls the entry back and hands the original body to the
    /// listener so the input is recoverable.
    pub async fn send_message(&self, body: &str) -> Result<(), PortalError> {
        let body = body.trim();
        if body.is_empty() {
            return Ok(());
        }

        let (wa_id, name, phone_id, epoch, synthetic_key, render) = {
            let mut st = self.state.lock().await;
            let wa_id = st
                .active_wa_id
                .clone()
                .ok_or(PortalError::NoActiveConversation)?;
            let name = st.active_name.clone();

            let optimistic = Message {
                id: None,
                wa_id: wa_id.clone(),
                body: body.to_string(),
                image_url: None,
                msg_type: "text".to_string(),
                direction: Direction::Outbound,
                status: MessageStatus::Pending,
                timestamp: Utc::now(),
                read: true,
            };
            let key = optimistic.identity_key();
            st.store.append(optimistic);
            st.scroll_pinned = true;
            (
                wa_id,
                name,
                st.phone_id.clone(),
                st.epoch,
                key,
                st.store.messages().to_vec(),
            )
        };

        // The pending entry is visible before the request goes out.
        self.listener.render_messages(render, true).await;

        match self
            .api
            .send_text(&wa_id, body, &phone_id, name.as_deref())
            .await
        {
            Ok(()) => {
                info!("[Engine] ✅ message sent to {}", wa_id);
                self.reconcile_conversation(&wa_id, &phone_id, epoch, Some(&synthetic_key))
                    .await;
                Ok(())
            }
            Err(e) => {
                error!("[Engine] ❌ send to {} failed: {}", wa_id, e);
                let render = {
                    let mut st = self.state.lock().await;
                    if st.epoch == epoch {
                        st.store.remove_by_key(&synthetic_key);
                        Some(st.store.messages().to_vec())
                    } else {
                        None
                    }
                };
                if let Some(render) = render {
                    self.listener.render_messages(render, true).await;
                }
                self.listener
                    .on_send_failed(wa_id, body.to_string(), e.to_string())
                    .await;
                Err(e)
            }
        }
    }

    /// Send an image to the active conversation.
    ///
    /// No optimistic entry: the upload produces the media URL, so the
    /// conversation is reconciled from the server once the post succeeds.
    pub async fn send_image(
        &self,
        image: ImageUpload,
        caption: &str,
    ) -> Result<(), PortalError> {
        let (wa_id, phone_id, epoch) = {
            let st = self.state.lock().await;
            let wa_id = st
                .active_wa_id
                .clone()
                .ok_or(PortalError::NoActiveConversation)?;
            (wa_id, st.phone_id.clone(), st.epoch)
        };

        match self
            .api
            .send_image(&wa_id, &phone_id, image, caption, &self.config.sender_name)
            .await
        {
            Ok(()) => {
                info!("[Engine] ✅ image sent to {}", wa_id);
                self.reconcile_conversation(&wa_id, &phone_id, epoch, None).await;
                Ok(())
            }
            Err(e) => {
                error!("[Engine] ❌ image send to {} failed: {}", wa_id, e);
                self.listener
                    .on_send_failed(wa_id, String::new(), e.to_string())
                    .await;
                Err(e)
            }
        }
    }

    /// One poll tick: refresh the contact list and, if a conversation is
    /// active, merge any messages not yet loaded (append-only; existing
    /// entries are never removed or reordered).
    ///
    /// Background errors are logged and never blank the current view. At
    /// most one tick runs at a time; an overlapping tick is skipped, and a
    /// slow response still passes the epoch guard before being applied.
    pub async fn poll(&self) {
        {
            let mut st = self.state.lock().await;
            if st.poll_in_flight {
                debug!("[Engine] poll tick skipped, previous tick still in flight");
                return;
            }
            st.poll_in_flight = true;
        }
        self.poll_inner().await;
        self.state.lock().await.poll_in_flight = false;
    }

    async fn poll_inner(&self) {
        if let Err(e) = self.refresh_contact_list().await {
            warn!("[Engine] background contact refresh failed: {}", e);
        }

        let (active, phone_id, epoch) = {
            let st = self.state.lock().await;
            (st.active_wa_id.clone(), st.phone_id.clone(), st.epoch)
        };
        let Some(wa_id) = active else { return };

        match self.api.fetch_messages(&wa_id, &phone_id).await {
            Ok(messages) => {
                let render = {
                    let mut st = self.state.lock().await;
                    if st.epoch != epoch || st.active_wa_id.as_deref() != Some(wa_id.as_str()) {
                        debug!("[Engine] discarding stale poll response for {}", wa_id);
                        return;
                    }
                    let mut appended = 0usize;
                    for msg in messages {
                        if st.store.append(msg) {
                            appended += 1;
                        }
                    }
                    if appended == 0 {
                        None
                    } else {
                        debug!("[Engine] poll merged {} new messages for {}", appended, wa_id);
                        Some((st.store.messages().to_vec(), st.scroll_pinned))
                    }
                };
                if let Some((messages, pinned)) = render {
                    self.listener.render_messages(messages, pinned).await;
                }
            }
            Err(e) => {
                warn!("[Engine] background message poll failed for {}: {}", wa_id, e);
            }
        }
    }

    /// Switch the phone account the portal acts for. All client-derived
    /// state belongs to the old account and is dropped.
    pub async fn switch_phone(&self, phone_id: &str) -> Result<(), PortalError> {
        {
            let mut st = self.state.lock().await;
            st.phone_id = phone_id.to_string();
            st.active_wa_id = None;
            st.active_name = None;
            st.epoch += 1;
            st.unread.clear();
            st.store.clear_baselines();
            st.store.replace_all(Vec::new());
            st.contacts.clear();
            st.scroll_pinned = true;
        }
        info!("[Engine] 🔄 switched to phone account {}", phone_id);
        self.refresh_contact_list().await
    }

    /// Start the fixed-interval polling task. Idempotent.
    pub fn start_polling(self: Arc<Self>) {
        let mut guard = self.poll_task.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let weak = Arc::downgrade(&self);
        let period = self.config.poll_interval;
        info!("[Engine] ⏱️ polling every {:?}", period);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first interval tick fires immediately; the initial load is
            // the embedder's explicit refresh, so skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(engine) = weak.upgrade() else { break };
                engine.poll().await;
            }
        });
        *guard = Some(handle);
    }

    /// Stop the polling task, if any.
    pub fn stop_polling(&self) {
        if let Some(handle) = self.poll_task.lock().unwrap().take() {
            handle.abort();
            info!("[Engine] polling stopped");
        }
    }

    /// The adapter reports whether the view is scrolled to the newest
    /// message; polls must not disturb the scroll position otherwise.
    pub async fn set_scroll_pinned(&self, pinned: bool) {
        self.state.lock().await.scroll_pinned = pinned;
    }

    /// Snapshot of the loaded conversation, chronological server order.
    pub async fn loaded_messages(&self) -> Vec<Message> {
        self.state.lock().await.store.messages().to_vec()
    }

    /// Snapshot of the contact list as last rendered.
    pub async fn contacts(&self) -> Vec<Contact> {
        self.state.lock().await.contacts.clone()
    }

    /// Active conversation id and display name, if one is selected.
    pub async fn active_conversation(&self) -> Option<(String, String)> {
        let st = self.state.lock().await;
        match (&st.active_wa_id, &st.active_name) {
            (Some(id), Some(name)) => Some((id.clone(), name.clone())),
            _ => None,
        }
    }

    pub async fn unread_count(&self, wa_id: &str) -> i64 {
        self.state
            .lock()
            .await
            .unread
            .get(wa_id)
            .copied()
            .unwrap_or(0)
    }

    /// Aggregate unread across all conversations.
    pub async fn total_unread_count(&self) -> i64 {
        self.state.lock().await.unread.values().sum()
    }

    /// Re-fetch the active conversation after a successful send, replacing
    /// the optimistic entry with server truth. If the fetch fails the
    /// optimistic entry (when there is one) is dropped as well: the send was
    /// accepted, so the next poll appends the server copy, and a leftover
    /// pending row would sit next to it under a different identity key.
    async fn reconcile_conversation(
        &self,
        wa_id: &str,
        phone_id: &str,
        epoch: u64,
        optimistic_key: Option<&str>,
    ) {
        match self.api.fetch_messages(wa_id, phone_id).await {
            Ok(messages) => {
                let render = {
                    let mut st = self.state.lock().await;
                    if st.epoch != epoch {
                        debug!("[Engine] discarding stale reconcile fetch for {}", wa_id);
                        return;
                    }
                    st.store.replace_all(messages);
                    st.store.messages().to_vec()
                };
                self.listener.render_messages(render, true).await;
            }
            Err(e) => {
                warn!("[Engine] reconcile fetch for {} failed: {}", wa_id, e);
                let Some(key) = optimistic_key else { return };
                let render = {
                    let mut st = self.state.lock().await;
                    if st.epoch == epoch && st.store.remove_by_key(key) {
                        Some(st.store.messages().to_vec())
                    } else {
                        None
                    }
                };
                if let Some(render) = render {
                    self.listener.render_messages(render, true).await;
                }
            }
        }
    }

    /// Render the stored contact list with current unread counts applied.
    async fn push_contact_list(&self) {
        let contacts = {
            let st = self.state.lock().await;
            if st.contacts.is_empty() {
                return;
            }
            let mut contacts = st.contacts.clone();
            for contact in contacts.iter_mut() {
                contact.unread_count = st.unread.get(&contact.wa_id).copied().unwrap_or(0);
            }
            contacts
        };
        self.listener.render_contact_list(contacts).await;
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.poll_task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
