//! In-memory owner of live conversation state.
//!
//! Each conversation gets a slot with `watch` channels for its state, its
//! generation flag and resync requests, plus an atomic subscriber count.
//! Errors live in one hub-wide list so that a subscriber can pick out the
//! ones for its conversation. Any change that affects the conversation list
//! is announced on a broadcast channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parlor_core::conversation::Conversation;
use parlor_core::ids::{AssistantId, ConversationId, ErrorId};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::dto::ConversationListDto;
use crate::errors::{Result, StreamError};
use crate::snapshot::build_list_item;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

// ─── Errors ─────────────────────────────────────────────────────────────────

/// A failure reported against a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatError {
    /// Error id, used for de-duplication.
    pub id: ErrorId,
    /// Conversation the error belongs to.
    pub conversation_id: ConversationId,
    /// Error text, possibly blank.
    pub message: String,
    /// Kind of failure, used when the text is blank.
    pub kind: String,
    /// When it was reported.
    pub created_at: DateTime<Utc>,
}

impl ChatError {
    /// Text shown to subscribers.
    #[must_use]
    pub fn display_message(&self) -> String {
        if self.message.trim().is_empty() {
            format!("{} (error {})", self.kind, self.id)
        } else {
            self.message.clone()
        }
    }
}

// ─── Changes ────────────────────────────────────────────────────────────────

/// What happened to a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// Inserted or modified.
    Updated,
    /// Generation started or stopped.
    Generating,
    /// Removed from the hub.
    Removed,
}

/// Notification that a conversation changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationChange {
    /// Changed conversation.
    pub conversation_id: ConversationId,
    /// Its assistant.
    pub assistant_id: AssistantId,
    /// Kind of change.
    pub kind: ChangeKind,
}

// ─── Slots and guards ───────────────────────────────────────────────────────

struct ConversationSlot {
    state: watch::Sender<Arc<Conversation>>,
    generating: watch::Sender<bool>,
    resync: watch::Sender<u64>,
    refs: Arc<AtomicUsize>,
}

/// Receivers a publisher session needs for one conversation.
pub struct ConversationWatch {
    /// Conversation state.
    pub state: watch::Receiver<Arc<Conversation>>,
    /// Generation flag.
    pub generating: watch::Receiver<bool>,
    /// Resync request counter.
    pub resync: watch::Receiver<u64>,
    /// Hub-wide error list.
    pub errors: watch::Receiver<Arc<Vec<ChatError>>>,
}

/// Registered interest in a conversation. Dropping it releases the reference.
#[derive(Debug)]
pub struct ConversationRef {
    conversation_id: ConversationId,
    refs: Arc<AtomicUsize>,
}

impl ConversationRef {
    /// The referenced conversation.
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }
}

impl Drop for ConversationRef {
    fn drop(&mut self) {
        let remaining = self.refs.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        debug!(conversation_id = %self.conversation_id, refs = remaining, "conversation reference released");
    }
}

// ─── Hub ────────────────────────────────────────────────────────────────────

/// Live conversations, their subscribers, and reported errors.
pub struct ConversationHub {
    slots: DashMap<ConversationId, Arc<ConversationSlot>>,
    errors: watch::Sender<Arc<Vec<ChatError>>>,
    changes: broadcast::Sender<ConversationChange>,
}

impl ConversationHub {
    /// Empty hub.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            slots: DashMap::new(),
            errors: watch::Sender::new(Arc::new(Vec::new())),
            changes,
        }
    }

    fn slot(&self, id: &ConversationId) -> Result<Arc<ConversationSlot>> {
        self.slots
            .get(id)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| StreamError::ConversationNotFound(id.clone()))
    }

    fn announce(&self, conversation: &Conversation, kind: ChangeKind) {
        // no receivers is fine
        let _ = self.changes.send(ConversationChange {
            conversation_id: conversation.id.clone(),
            assistant_id: conversation.assistant_id.clone(),
            kind,
        });
    }

    /// Add a conversation, or replace the state of an existing one.
    pub fn insert(&self, conversation: Conversation) {
        let snapshot = Arc::new(conversation);
        match self.slots.entry(snapshot.id.clone()) {
            Entry::Occupied(entry) => {
                let _ = entry.get().state.send_replace(Arc::clone(&snapshot));
            }
            Entry::Vacant(entry) => {
                let slot = ConversationSlot {
                    state: watch::Sender::new(Arc::clone(&snapshot)),
                    generating: watch::Sender::new(false),
                    resync: watch::Sender::new(0),
                    refs: Arc::new(AtomicUsize::new(0)),
                };
                let _ = entry.insert(Arc::new(slot));
            }
        }
        debug!(conversation_id = %snapshot.id, "conversation stored");
        self.announce(&snapshot, ChangeKind::Updated);
    }

    /// Drop a conversation and its errors. Open publisher sessions for it end.
    pub fn remove(&self, id: &ConversationId) -> Result<()> {
        let (_, slot) = self
            .slots
            .remove(id)
            .ok_or_else(|| StreamError::ConversationNotFound(id.clone()))?;
        let _ = self.errors.send_if_modified(|list| {
            let before = list.len();
            Arc::make_mut(list).retain(|e| &e.conversation_id != id);
            list.len() != before
        });
        let conversation = Arc::clone(&slot.state.borrow());
        self.announce(&conversation, ChangeKind::Removed);
        info!(conversation_id = %id, "conversation removed");
        Ok(())
    }

    /// Current state of a conversation.
    pub fn get(&self, id: &ConversationId) -> Option<Arc<Conversation>> {
        self.slots.get(id).map(|s| Arc::clone(&s.state.borrow()))
    }

    /// Whether the hub holds this conversation.
    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.slots.contains_key(id)
    }

    /// List entries, optionally for one assistant, pinned first then most
    /// recently updated.
    pub fn list(&self, assistant_id: Option<&AssistantId>) -> Vec<ConversationListDto> {
        let mut items: Vec<ConversationListDto> = self
            .slots
            .iter()
            .filter_map(|entry| {
                let slot = entry.value();
                let conversation = slot.state.borrow();
                if assistant_id.is_some_and(|a| a != &conversation.assistant_id) {
                    return None;
                }
                Some(build_list_item(&conversation, *slot.generating.borrow()))
            })
            .collect();
        items.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then(b.update_at.cmp(&a.update_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        items
    }

    /// Mutate a conversation and notify subscribers.
    ///
    /// The update time is bumped after `f` runs. Updates to one conversation
    /// are serialized by the map entry's write lock, so `f` must not call
    /// back into the hub.
    pub fn update<R>(&self, id: &ConversationId, f: impl FnOnce(&mut Conversation) -> R) -> Result<R> {
        let (out, next) = {
            let slot = self
                .slots
                .get_mut(id)
                .ok_or_else(|| StreamError::ConversationNotFound(id.clone()))?;
            let mut next = Arc::clone(&slot.state.borrow());
            let conversation = Arc::make_mut(&mut next);
            let out = f(conversation);
            conversation.touch();
            let _ = slot.state.send_replace(Arc::clone(&next));
            (out, next)
        };
        self.announce(&next, ChangeKind::Updated);
        Ok(out)
    }

    /// Set the generation flag. Returns whether it changed.
    pub fn set_generating(&self, id: &ConversationId, generating: bool) -> Result<bool> {
        let slot = self.slot(id)?;
        let changed = slot.generating.send_if_modified(|current| {
            if *current == generating {
                false
            } else {
                *current = generating;
                true
            }
        });
        if changed {
            debug!(conversation_id = %id, generating, "generation flag changed");
            let conversation = Arc::clone(&slot.state.borrow());
            self.announce(&conversation, ChangeKind::Generating);
        }
        Ok(changed)
    }

    /// Whether a response is being generated.
    pub fn is_generating(&self, id: &ConversationId) -> bool {
        self.slots.get(id).is_some_and(|s| *s.generating.borrow())
    }

    /// Record an error for a conversation and return its id.
    pub fn report_error(
        &self,
        conversation_id: &ConversationId,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> ErrorId {
        let error = ChatError {
            id: ErrorId::new(),
            conversation_id: conversation_id.clone(),
            message: message.into(),
            kind: kind.into(),
            created_at: Utc::now(),
        };
        let id = error.id.clone();
        warn!(conversation_id = %conversation_id, error_id = %id, kind = %error.kind, "chat error reported");
        self.errors.send_modify(|list| Arc::make_mut(list).push(error));
        id
    }

    /// Remove an error. Returns whether it existed.
    pub fn dismiss_error(&self, error_id: &ErrorId) -> bool {
        self.errors.send_if_modified(|list| {
            let before = list.len();
            Arc::make_mut(list).retain(|e| &e.id != error_id);
            list.len() != before
        })
    }

    /// Errors currently recorded for a conversation.
    pub fn errors_for(&self, conversation_id: &ConversationId) -> Vec<ChatError> {
        self.errors
            .borrow()
            .iter()
            .filter(|e| &e.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Register interest in a conversation.
    pub fn acquire(&self, id: &ConversationId) -> Result<ConversationRef> {
        let slot = self.slot(id)?;
        let refs = slot.refs.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(conversation_id = %id, refs, "conversation reference acquired");
        Ok(ConversationRef {
            conversation_id: id.clone(),
            refs: Arc::clone(&slot.refs),
        })
    }

    /// Number of live references.
    pub fn ref_count(&self, id: &ConversationId) -> usize {
        self.slots
            .get(id)
            .map_or(0, |s| s.refs.load(Ordering::Acquire))
    }

    /// Live references across all conversations.
    pub fn subscriber_count(&self) -> usize {
        self.slots
            .iter()
            .map(|s| s.refs.load(Ordering::Acquire))
            .sum()
    }

    /// Whether anyone is subscribed or a response is being generated.
    pub fn is_in_use(&self, id: &ConversationId) -> bool {
        self.slots.get(id).is_some_and(|s| {
            s.refs.load(Ordering::Acquire) > 0 || *s.generating.borrow()
        })
    }

    /// Ask every open session of a conversation to resend a full snapshot.
    pub fn request_resync(&self, id: &ConversationId) -> Result<()> {
        let slot = self.slot(id)?;
        slot.resync.send_modify(|n| *n = n.wrapping_add(1));
        debug!(conversation_id = %id, "resync requested");
        Ok(())
    }

    /// Receivers for one conversation.
    pub fn watch(&self, id: &ConversationId) -> Result<ConversationWatch> {
        let slot = self.slot(id)?;
        Ok(ConversationWatch {
            state: slot.state.subscribe(),
            generating: slot.generating.subscribe(),
            resync: slot.resync.subscribe(),
            errors: self.errors.subscribe(),
        })
    }

    /// Conversation change notifications.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ConversationChange> {
        self.changes.subscribe()
    }

    /// Number of conversations held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the hub is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for ConversationHub {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parlor_core::messages::Message;

    fn seeded(hub: &ConversationHub, assistant: &AssistantId) -> ConversationId {
        let conv = Conversation::new(assistant.clone());
        let id = conv.id.clone();
        hub.insert(conv);
        id
    }

    #[test]
    fn insert_and_get() {
        let hub = ConversationHub::new();
        let id = seeded(&hub, &AssistantId::new());
        assert!(hub.contains(&id));
        assert_eq!(hub.get(&id).unwrap().id, id);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn unknown_conversation_errors() {
        let hub = ConversationHub::new();
        let missing = ConversationId::new();
        assert_matches!(hub.acquire(&missing), Err(StreamError::ConversationNotFound(_)));
        assert_matches!(hub.update(&missing, |_| ()), Err(StreamError::ConversationNotFound(_)));
        assert_matches!(hub.request_resync(&missing), Err(StreamError::ConversationNotFound(_)));
        assert!(hub.get(&missing).is_none());
        assert_eq!(hub.ref_count(&missing), 0);
    }

    #[test]
    fn update_mutates_and_bumps_time() {
        let hub = ConversationHub::new();
        let id = seeded(&hub, &AssistantId::new());
        let before = hub.get(&id).unwrap().update_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        let node_id = hub
            .update(&id, |c| c.append_message(Message::user("hi")))
            .unwrap();
        let conv = hub.get(&id).unwrap();
        assert_eq!(conv.nodes[0].id, node_id);
        assert!(conv.update_at > before);
    }

    #[test]
    fn update_does_not_disturb_held_snapshot() {
        let hub = ConversationHub::new();
        let id = seeded(&hub, &AssistantId::new());
        let held = hub.get(&id).unwrap();
        hub.update(&id, |c| c.title = "changed".into()).unwrap();
        assert_eq!(held.title, "");
        assert_eq!(hub.get(&id).unwrap().title, "changed");
    }

    #[test]
    fn ref_counts_follow_guards() {
        let hub = ConversationHub::new();
        let id = seeded(&hub, &AssistantId::new());
        let a = hub.acquire(&id).unwrap();
        let b = hub.acquire(&id).unwrap();
        assert_eq!(hub.ref_count(&id), 2);
        assert_eq!(hub.subscriber_count(), 2);
        assert!(hub.is_in_use(&id));
        drop(a);
        assert_eq!(hub.ref_count(&id), 1);
        drop(b);
        assert_eq!(hub.ref_count(&id), 0);
        assert!(!hub.is_in_use(&id));
    }

    #[test]
    fn concurrent_acquire_release_is_balanced() {
        let hub = Arc::new(ConversationHub::new());
        let id = seeded(&hub, &AssistantId::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let hub = Arc::clone(&hub);
                let id = id.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let guard = hub.acquire(&id).unwrap();
                        drop(guard);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(hub.ref_count(&id), 0);
    }

    #[test]
    fn concurrent_inserts_share_one_slot() {
        let hub = Arc::new(ConversationHub::new());
        let template = Conversation::new(AssistantId::new());
        let id = template.id.clone();
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let hub = Arc::clone(&hub);
                let conv = template.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    let id = conv.id.clone();
                    hub.insert(conv);
                    hub.acquire(&id).unwrap()
                })
            })
            .collect();
        let guards: Vec<ConversationRef> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(hub.len(), 1);
        assert_eq!(hub.ref_count(&id), guards.len());
        drop(guards);
        assert_eq!(hub.ref_count(&id), 0);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let hub = Arc::new(ConversationHub::new());
        let id = seeded(&hub, &AssistantId::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let hub = Arc::clone(&hub);
                let id = id.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let _ = hub.update(&id, |c| c.append_message(Message::user("x"))).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(hub.get(&id).unwrap().nodes.len(), 200);
    }

    #[test]
    fn generating_counts_as_in_use() {
        let hub = ConversationHub::new();
        let id = seeded(&hub, &AssistantId::new());
        assert!(hub.set_generating(&id, true).unwrap());
        assert!(!hub.set_generating(&id, true).unwrap());
        assert!(hub.is_generating(&id));
        assert!(hub.is_in_use(&id));
        assert!(hub.set_generating(&id, false).unwrap());
        assert!(!hub.is_in_use(&id));
    }

    #[test]
    fn list_filters_and_orders() {
        let hub = ConversationHub::new();
        let a = AssistantId::new();
        let b = AssistantId::new();
        let older = seeded(&hub, &a);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let newer = seeded(&hub, &a);
        let _other = seeded(&hub, &b);
        hub.update(&older, |c| c.is_pinned = true).unwrap();

        let listed: Vec<ConversationId> = hub.list(Some(&a)).into_iter().map(|d| d.id).collect();
        assert_eq!(listed, [older, newer]);
        assert_eq!(hub.list(None).len(), 3);
    }

    #[test]
    fn errors_are_scoped_and_dismissable() {
        let hub = ConversationHub::new();
        let a = seeded(&hub, &AssistantId::new());
        let b = seeded(&hub, &AssistantId::new());
        let ea = hub.report_error(&a, "provider", "rate limited");
        let _eb = hub.report_error(&b, "provider", "boom");

        let for_a = hub.errors_for(&a);
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].id, ea);

        assert!(hub.dismiss_error(&ea));
        assert!(!hub.dismiss_error(&ea));
        assert!(hub.errors_for(&a).is_empty());
        assert_eq!(hub.errors_for(&b).len(), 1);
    }

    #[test]
    fn remove_discards_conversation_errors() {
        let hub = ConversationHub::new();
        let gone = seeded(&hub, &AssistantId::new());
        let kept = seeded(&hub, &AssistantId::new());
        for _ in 0..3 {
            let _ = hub.report_error(&gone, "provider", "boom");
        }
        let _ = hub.report_error(&kept, "provider", "still here");

        hub.remove(&gone).unwrap();
        assert!(!hub.contains(&gone));
        assert!(hub.errors_for(&gone).is_empty());
        assert_eq!(hub.errors_for(&kept).len(), 1);
    }

    #[test]
    fn blank_error_message_falls_back() {
        let err = ChatError {
            id: ErrorId::from("e1"),
            conversation_id: ConversationId::new(),
            message: "  ".into(),
            kind: "network".into(),
            created_at: Utc::now(),
        };
        assert_eq!(err.display_message(), "network (error e1)");
    }

    #[test]
    fn changes_are_broadcast() {
        let hub = ConversationHub::new();
        let mut rx = hub.subscribe_changes();
        let assistant = AssistantId::new();
        let id = seeded(&hub, &assistant);
        let _ = hub.set_generating(&id, true).unwrap();
        hub.remove(&id).unwrap();

        let kinds: Vec<ChangeKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|c| {
                assert_eq!(c.assistant_id, assistant);
                c.kind
            })
            .collect();
        assert_eq!(kinds, [ChangeKind::Updated, ChangeKind::Generating, ChangeKind::Removed]);
        assert!(!hub.contains(&id));
    }

    #[tokio::test]
    async fn resync_notifies_watchers() {
        let hub = ConversationHub::new();
        let id = seeded(&hub, &AssistantId::new());
        let mut watch = hub.watch(&id).unwrap();
        hub.request_resync(&id).unwrap();
        watch.resync.changed().await.unwrap();
        assert_eq!(*watch.resync.borrow_and_update(), 1);
    }

    #[tokio::test]
    async fn remove_closes_watchers() {
        let hub = ConversationHub::new();
        let id = seeded(&hub, &AssistantId::new());
        let mut watch = hub.watch(&id).unwrap();
        hub.remove(&id).unwrap();
        assert!(watch.state.changed().await.is_err());
    }
}
