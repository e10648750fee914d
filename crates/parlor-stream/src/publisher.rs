//! Per-subscriber publishing of conversation updates.
//!
//! Every subscription owns a [`SubscriptionCursor`] holding the last
//! snapshot it sent, its sequence counter and the error ids it has already
//! seen. Cursors are never shared, so each subscriber diffs against its own
//! baseline.
//!
//! [`StreamPublisher::subscribe`] spawns a session task that waits on the
//! conversation's channels and a heartbeat timer, pushing [`StreamItem`]s to
//! an mpsc channel. The session ends when the receiver is dropped, the
//! subscription is closed, the conversation is removed, or the publisher
//! shuts down; the conversation reference is released on every path.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use parlor_core::ids::{ConversationId, ErrorId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, trace, warn};

use crate::diff::single_node_diff;
use crate::dto::ConversationDto;
use crate::errors::{Result, StreamError};
use crate::events::ConversationEvent;
use crate::hub::{ChatError, ConversationHub, ConversationRef, ConversationWatch};
use crate::snapshot::build_snapshot;

// ─── Cursor ─────────────────────────────────────────────────────────────────

/// Lifecycle of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created, nothing registered yet.
    Idle,
    /// Reference held, nothing sent yet.
    Subscribed,
    /// At least one snapshot or node update sent.
    Streaming,
    /// Finished; no further events.
    Closed,
}

/// Per-subscription diff baseline, sequence counter and seen errors.
#[derive(Debug)]
pub struct SubscriptionCursor {
    conversation_id: ConversationId,
    previous: Option<ConversationDto>,
    sequence: u64,
    seen_errors: HashSet<ErrorId>,
    state: SubscriptionState,
}

impl SubscriptionCursor {
    /// Fresh cursor. Errors in `already_reported` will not be sent.
    pub fn new(
        conversation_id: ConversationId,
        already_reported: impl IntoIterator<Item = ErrorId>,
    ) -> Self {
        Self {
            conversation_id,
            previous: None,
            sequence: 0,
            seen_errors: already_reported.into_iter().collect(),
            state: SubscriptionState::Idle,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Last sequence number issued (0 before the first event).
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Record that the reference is held.
    pub fn mark_subscribed(&mut self) {
        if self.state == SubscriptionState::Idle {
            self.state = SubscriptionState::Subscribed;
        }
    }

    /// Event for a new conversation state: a node update when exactly one
    /// node changed since the last event, a snapshot otherwise.
    ///
    /// Returns `None` once closed.
    pub fn next_conversation_event(&mut self, current: ConversationDto) -> Option<ConversationEvent> {
        if self.state == SubscriptionState::Closed {
            return None;
        }
        self.sequence += 1;
        let seq = self.sequence;
        let diff = self
            .previous
            .as_ref()
            .and_then(|prev| single_node_diff(prev, &current));
        let event = match diff {
            Some(diff) => ConversationEvent::node_update(seq, &current, diff),
            None => ConversationEvent::Snapshot {
                seq,
                conversation: current.clone(),
            },
        };
        self.previous = Some(current);
        self.state = SubscriptionState::Streaming;
        Some(event)
    }

    /// Forget the baseline so the next event is a full snapshot.
    pub fn reset_baseline(&mut self) {
        self.previous = None;
    }

    /// Error events for errors of this conversation not seen before.
    pub fn new_error_events(&mut self, errors: &[ChatError]) -> Vec<ConversationEvent> {
        if self.state == SubscriptionState::Closed {
            return Vec::new();
        }
        errors
            .iter()
            .filter(|e| e.conversation_id == self.conversation_id)
            .filter(|e| self.seen_errors.insert(e.id.clone()))
            .map(|e| ConversationEvent::Error {
                message: e.display_message(),
            })
            .collect()
    }

    /// Stop producing events.
    pub fn close(&mut self) {
        self.state = SubscriptionState::Closed;
    }
}

// ─── Publisher ──────────────────────────────────────────────────────────────

/// Item delivered to a subscriber.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamItem {
    /// A conversation event.
    Event(ConversationEvent),
    /// Keep-alive with no payload.
    Heartbeat,
}

/// Publisher tuning.
#[derive(Clone, Copy, Debug)]
pub struct PublisherConfig {
    /// Heartbeat period.
    pub heartbeat_interval: Duration,
    /// Outbound channel capacity per subscriber.
    pub buffer: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(1),
            buffer: 256,
        }
    }
}

/// Spawns publisher sessions for subscribers.
#[derive(Clone)]
pub struct StreamPublisher {
    hub: Arc<ConversationHub>,
    config: PublisherConfig,
    shutdown: CancellationToken,
}

impl StreamPublisher {
    /// Publisher over `hub`; sessions stop when `shutdown` is cancelled.
    #[must_use]
    pub fn new(hub: Arc<ConversationHub>, config: PublisherConfig, shutdown: CancellationToken) -> Self {
        Self {
            hub,
            config,
            shutdown,
        }
    }

    /// The hub this publisher reads from.
    #[must_use]
    pub fn hub(&self) -> &Arc<ConversationHub> {
        &self.hub
    }

    /// Open a subscription. The first item is always a snapshot with `seq` 1.
    pub fn subscribe(&self, conversation_id: &ConversationId) -> Result<Subscription> {
        if self.shutdown.is_cancelled() {
            return Err(StreamError::ShuttingDown);
        }
        let watch = self.hub.watch(conversation_id)?;
        let known = self
            .hub
            .errors_for(conversation_id)
            .into_iter()
            .map(|e| e.id);
        let mut cursor = SubscriptionCursor::new(conversation_id.clone(), known);
        let reference = self.hub.acquire(conversation_id)?;
        cursor.mark_subscribed();

        let (tx, rx) = mpsc::channel(self.config.buffer.max(1));
        let state = Arc::new(Mutex::new(cursor.state()));
        let cancel = self.shutdown.child_token();
        let session = Session {
            cursor,
            watch,
            reference,
            tx,
            heartbeat: self.config.heartbeat_interval,
            cancel: cancel.clone(),
            state: Arc::clone(&state),
        };
        let span = info_span!("publisher_session", conversation_id = %conversation_id);
        let handle = tokio::spawn(session.run().instrument(span));

        Ok(Subscription {
            conversation_id: conversation_id.clone(),
            rx,
            state,
            cancel,
            handle,
        })
    }
}

/// Receiving end of a publisher session.
#[derive(Debug)]
pub struct Subscription {
    conversation_id: ConversationId,
    rx: mpsc::Receiver<StreamItem>,
    state: Arc<Mutex<SubscriptionState>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Subscribed conversation.
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Next item, or `None` once the session has ended.
    pub async fn recv(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }

    /// Session lifecycle state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        *self.state.lock()
    }

    /// Stop the session and wait for it to release its resources.
    pub async fn close(self) {
        self.cancel.cancel();
        drop(self.rx);
        if let Err(e) = self.handle.await {
            warn!(conversation_id = %self.conversation_id, error = %e, "publisher session panicked");
        }
    }
}

// ─── Session task ───────────────────────────────────────────────────────────

struct Session {
    cursor: SubscriptionCursor,
    watch: ConversationWatch,
    reference: ConversationRef,
    tx: mpsc::Sender<StreamItem>,
    heartbeat: Duration,
    cancel: CancellationToken,
    state: Arc<Mutex<SubscriptionState>>,
}

/// Why a session stopped.
#[derive(Debug)]
enum Exit {
    Cancelled,
    ReceiverGone,
    ConversationRemoved,
}

impl Session {
    async fn run(mut self) {
        let exit = self.pump().await;
        self.cursor.close();
        *self.state.lock() = SubscriptionState::Closed;
        debug!(
            conversation_id = %self.reference.conversation_id(),
            seq = self.cursor.sequence(),
            reason = ?exit,
            "publisher session closed"
        );
        // the reference is released when `self` drops here
    }

    async fn pump(&mut self) -> Exit {
        if let Err(exit) = self.emit_current(false).await {
            return exit;
        }

        let mut heartbeat = time::interval_at(Instant::now() + self.heartbeat, self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Err(Exit::Cancelled),
                () = self.tx.closed() => Err(Exit::ReceiverGone),
                changed = self.watch.state.changed() => match changed {
                    Ok(()) => self.emit_current(false).await,
                    Err(_) => Err(Exit::ConversationRemoved),
                },
                changed = self.watch.generating.changed() => match changed {
                    Ok(()) => self.emit_current(false).await,
                    Err(_) => Err(Exit::ConversationRemoved),
                },
                changed = self.watch.resync.changed() => match changed {
                    Ok(()) => {
                        let _ = *self.watch.resync.borrow_and_update();
                        self.emit_current(true).await
                    }
                    Err(_) => Err(Exit::ConversationRemoved),
                },
                changed = self.watch.errors.changed() => match changed {
                    Ok(()) => self.emit_errors().await,
                    Err(_) => Err(Exit::Cancelled),
                },
                _ = heartbeat.tick() => {
                    trace!("heartbeat");
                    self.send(StreamItem::Heartbeat).await
                }
            };
            if let Err(exit) = step {
                return exit;
            }
        }
    }

    /// Deliver one item. A full buffer never outlives cancellation.
    async fn send(&self, item: StreamItem) -> std::result::Result<(), Exit> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Exit::Cancelled),
            sent = self.tx.send(item) => sent.map_err(|_| Exit::ReceiverGone),
        }
    }

    /// Send the event for the latest state.
    async fn emit_current(&mut self, force_snapshot: bool) -> std::result::Result<(), Exit> {
        let current = {
            let conversation = Arc::clone(&self.watch.state.borrow_and_update());
            let generating = *self.watch.generating.borrow_and_update();
            build_snapshot(&conversation, generating)
        };
        if force_snapshot {
            self.cursor.reset_baseline();
        }
        let Some(event) = self.cursor.next_conversation_event(current) else {
            return Ok(());
        };
        *self.state.lock() = self.cursor.state();
        debug!(event_type = event.event_type(), seq = event.seq(), "publishing conversation event");
        self.send(StreamItem::Event(event)).await
    }

    async fn emit_errors(&mut self) -> std::result::Result<(), Exit> {
        let errors = Arc::clone(&self.watch.errors.borrow_and_update());
        for event in self.cursor.new_error_events(&errors) {
            self.send(StreamItem::Event(event)).await?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parlor_core::conversation::Conversation;
    use parlor_core::ids::AssistantId;
    use parlor_core::messages::Message;

    fn conversation(n: usize) -> Conversation {
        let mut c = Conversation::new(AssistantId::new());
        for i in 0..n {
            let _ = c.append_message(Message::user(format!("m{i}")));
        }
        c
    }

    fn chat_error(conversation_id: &ConversationId, id: &str, message: &str) -> ChatError {
        ChatError {
            id: ErrorId::from(id),
            conversation_id: conversation_id.clone(),
            message: message.into(),
            kind: "provider".into(),
            created_at: chrono::Utc::now(),
        }
    }

    // ── cursor ──

    #[test]
    fn first_event_is_snapshot_with_seq_one() {
        let c = conversation(2);
        let mut cursor = SubscriptionCursor::new(c.id.clone(), []);
        assert_eq!(cursor.state(), SubscriptionState::Idle);
        cursor.mark_subscribed();
        assert_eq!(cursor.state(), SubscriptionState::Subscribed);

        let event = cursor.next_conversation_event(build_snapshot(&c, false)).unwrap();
        assert_matches!(event, ConversationEvent::Snapshot { seq: 1, .. });
        assert_eq!(cursor.state(), SubscriptionState::Streaming);
    }

    #[test]
    fn single_node_change_yields_node_update() {
        let mut c = conversation(2);
        let mut cursor = SubscriptionCursor::new(c.id.clone(), []);
        let _ = cursor.next_conversation_event(build_snapshot(&c, false));
        c.nodes[1].current_message_mut().unwrap().append_text("!");

        let event = cursor.next_conversation_event(build_snapshot(&c, true)).unwrap();
        assert_matches!(
            event,
            ConversationEvent::NodeUpdate { seq: 2, node_index: 1, is_generating: true, ref node_id, .. }
                if node_id == &c.nodes[1].id
        );
    }

    #[test]
    fn baseline_advances_even_after_snapshot() {
        let mut c = conversation(2);
        let mut cursor = SubscriptionCursor::new(c.id.clone(), []);
        let _ = cursor.next_conversation_event(build_snapshot(&c, false));
        c.title = "new".into();
        let e2 = cursor.next_conversation_event(build_snapshot(&c, false)).unwrap();
        assert_matches!(e2, ConversationEvent::Snapshot { seq: 2, .. });
        c.nodes[0].current_message_mut().unwrap().append_text("!");
        let e3 = cursor.next_conversation_event(build_snapshot(&c, false)).unwrap();
        assert_matches!(e3, ConversationEvent::NodeUpdate { seq: 3, node_index: 0, .. });
    }

    #[test]
    fn reset_baseline_forces_snapshot() {
        let mut c = conversation(1);
        let mut cursor = SubscriptionCursor::new(c.id.clone(), []);
        let _ = cursor.next_conversation_event(build_snapshot(&c, false));
        cursor.reset_baseline();
        c.nodes[0].current_message_mut().unwrap().append_text("!");
        let event = cursor.next_conversation_event(build_snapshot(&c, false)).unwrap();
        assert_matches!(event, ConversationEvent::Snapshot { seq: 2, .. });
    }

    #[test]
    fn sequence_strictly_increases() {
        let mut c = conversation(1);
        let mut cursor = SubscriptionCursor::new(c.id.clone(), []);
        let mut seqs = Vec::new();
        for i in 0..20 {
            if i % 5 == 0 {
                c.title = format!("t{i}");
            } else {
                c.nodes[0].current_message_mut().unwrap().append_text(".");
            }
            let event = cursor.next_conversation_event(build_snapshot(&c, false)).unwrap();
            seqs.push(event.seq().unwrap());
        }
        assert_eq!(seqs, (1..=20).collect::<Vec<u64>>());
    }

    #[test]
    fn errors_deduplicate_and_filter() {
        let id = ConversationId::new();
        let other = ConversationId::new();
        let mut cursor = SubscriptionCursor::new(id.clone(), [ErrorId::from("old")]);
        let errors = vec![
            chat_error(&id, "old", "stale"),
            chat_error(&id, "e1", "fresh"),
            chat_error(&other, "e2", "not mine"),
        ];
        let events = cursor.new_error_events(&errors);
        assert_eq!(events, [ConversationEvent::Error { message: "fresh".into() }]);
        assert!(cursor.new_error_events(&errors).is_empty());
    }

    #[test]
    fn closed_cursor_emits_nothing() {
        let c = conversation(1);
        let mut cursor = SubscriptionCursor::new(c.id.clone(), []);
        cursor.close();
        assert!(cursor.next_conversation_event(build_snapshot(&c, false)).is_none());
        assert!(cursor.new_error_events(&[chat_error(&c.id, "e", "x")]).is_empty());
        assert_eq!(cursor.sequence(), 0);
    }

    // ── sessions ──

    fn publisher(hub: &Arc<ConversationHub>) -> (StreamPublisher, CancellationToken) {
        let shutdown = CancellationToken::new();
        let config = PublisherConfig {
            heartbeat_interval: Duration::from_secs(1),
            buffer: 16,
        };
        (StreamPublisher::new(Arc::clone(hub), config, shutdown.clone()), shutdown)
    }

    async fn next_event(sub: &mut Subscription) -> ConversationEvent {
        loop {
            match sub.recv().await {
                Some(StreamItem::Event(e)) => return e,
                Some(StreamItem::Heartbeat) => {}
                None => panic!("session ended"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn session_streams_snapshot_then_updates() {
        let hub = Arc::new(ConversationHub::new());
        let c = conversation(1);
        let id = c.id.clone();
        hub.insert(c);
        let (publisher, _shutdown) = publisher(&hub);

        let mut sub = publisher.subscribe(&id).unwrap();
        assert_eq!(hub.ref_count(&id), 1);
        assert_matches!(next_event(&mut sub).await, ConversationEvent::Snapshot { seq: 1, .. });
        assert_eq!(sub.state(), SubscriptionState::Streaming);

        let _ = hub.update(&id, |c| c.append_message(Message::assistant("hi"))).unwrap();
        assert_matches!(
            next_event(&mut sub).await,
            ConversationEvent::NodeUpdate { seq: 2, node_index: 1, .. }
        );

        let _ = hub.set_generating(&id, true).unwrap();
        // generation flag alone changes no node
        assert_matches!(
            next_event(&mut sub).await,
            ConversationEvent::Snapshot { seq: 3, ref conversation } if conversation.is_generating
        );
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_follow_interval() {
        let hub = Arc::new(ConversationHub::new());
        let c = conversation(0);
        let id = c.id.clone();
        hub.insert(c);
        let (publisher, _shutdown) = publisher(&hub);
        let mut sub = publisher.subscribe(&id).unwrap();
        let _ = next_event(&mut sub).await;

        let start = Instant::now();
        let slack = Duration::from_millis(5);
        assert_eq!(sub.recv().await, Some(StreamItem::Heartbeat));
        let first = start.elapsed();
        assert!(first >= Duration::from_secs(1) - slack && first <= Duration::from_secs(1) + slack);
        assert_eq!(sub.recv().await, Some(StreamItem::Heartbeat));
        let second = start.elapsed();
        assert!(second >= Duration::from_secs(2) - slack && second <= Duration::from_secs(2) + slack);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_keep_independent_cursors() {
        let hub = Arc::new(ConversationHub::new());
        let c = conversation(1);
        let id = c.id.clone();
        hub.insert(c);
        let (publisher, _shutdown) = publisher(&hub);

        let mut early = publisher.subscribe(&id).unwrap();
        assert_matches!(next_event(&mut early).await, ConversationEvent::Snapshot { seq: 1, .. });
        let _ = hub.update(&id, |c| c.append_message(Message::assistant("a"))).unwrap();
        assert_matches!(next_event(&mut early).await, ConversationEvent::NodeUpdate { seq: 2, .. });

        let mut late = publisher.subscribe(&id).unwrap();
        assert_eq!(hub.ref_count(&id), 2);
        assert_matches!(next_event(&mut late).await, ConversationEvent::Snapshot { seq: 1, .. });

        let _ = hub.update(&id, |c| c.append_message(Message::user("b"))).unwrap();
        assert_matches!(next_event(&mut early).await, ConversationEvent::NodeUpdate { seq: 3, node_index: 2, .. });
        assert_matches!(next_event(&mut late).await, ConversationEvent::NodeUpdate { seq: 2, node_index: 2, .. });
    }

    #[tokio::test(start_paused = true)]
    async fn resync_sends_full_snapshot() {
        let hub = Arc::new(ConversationHub::new());
        let c = conversation(1);
        let id = c.id.clone();
        hub.insert(c);
        let (publisher, _shutdown) = publisher(&hub);
        let mut sub = publisher.subscribe(&id).unwrap();
        let _ = next_event(&mut sub).await;

        hub.request_resync(&id).unwrap();
        assert_matches!(next_event(&mut sub).await, ConversationEvent::Snapshot { seq: 2, .. });
    }

    #[tokio::test(start_paused = true)]
    async fn new_errors_are_pushed_once() {
        let hub = Arc::new(ConversationHub::new());
        let c = conversation(1);
        let id = c.id.clone();
        hub.insert(c);
        let _old = hub.report_error(&id, "provider", "before subscribe");
        let (publisher, _shutdown) = publisher(&hub);
        let mut sub = publisher.subscribe(&id).unwrap();
        let _ = next_event(&mut sub).await;

        let _ = hub.report_error(&id, "provider", "quota exceeded");
        assert_eq!(
            next_event(&mut sub).await,
            ConversationEvent::Error { message: "quota exceeded".into() }
        );

        // unrelated change to the error list must not replay
        let _ = hub.report_error(&ConversationId::new(), "provider", "elsewhere");
        let _ = hub.update(&id, |c| c.title = "x".into()).unwrap();
        assert_matches!(next_event(&mut sub).await, ConversationEvent::Snapshot { seq: 2, .. });
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_receiver_releases_reference() {
        let hub = Arc::new(ConversationHub::new());
        let c = conversation(1);
        let id = c.id.clone();
        hub.insert(c);
        let (publisher, _shutdown) = publisher(&hub);
        let sub = publisher.subscribe(&id).unwrap();
        assert_eq!(hub.ref_count(&id), 1);

        drop(sub);
        // let the session observe the closed channel
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(hub.ref_count(&id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn close_releases_reference() {
        let hub = Arc::new(ConversationHub::new());
        let c = conversation(1);
        let id = c.id.clone();
        hub.insert(c);
        let (publisher, _shutdown) = publisher(&hub);
        let sub = publisher.subscribe(&id).unwrap();
        sub.close().await;
        assert_eq!(hub.ref_count(&id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_ends_sessions_and_rejects_new() {
        let hub = Arc::new(ConversationHub::new());
        let c = conversation(1);
        let id = c.id.clone();
        hub.insert(c);
        let (publisher, shutdown) = publisher(&hub);
        let mut sub = publisher.subscribe(&id).unwrap();
        let _ = next_event(&mut sub).await;

        shutdown.cancel();
        assert_eq!(sub.recv().await, None);
        assert_eq!(sub.state(), SubscriptionState::Closed);
        assert_eq!(hub.ref_count(&id), 0);
        assert_matches!(publisher.subscribe(&id), Err(StreamError::ShuttingDown));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_ends_session_blocked_on_full_buffer() {
        let hub = Arc::new(ConversationHub::new());
        let c = conversation(1);
        let id = c.id.clone();
        hub.insert(c);
        let shutdown = CancellationToken::new();
        let config = PublisherConfig {
            heartbeat_interval: Duration::from_secs(60),
            buffer: 1,
        };
        let publisher = StreamPublisher::new(Arc::clone(&hub), config, shutdown.clone());

        // the snapshot fills the buffer and is never read
        let sub = publisher.subscribe(&id).unwrap();
        time::sleep(Duration::from_millis(10)).await;
        let _ = hub.update(&id, |c| c.append_message(Message::assistant("stalled"))).unwrap();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sub.state(), SubscriptionState::Streaming);
        assert_eq!(hub.ref_count(&id), 1);

        shutdown.cancel();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sub.state(), SubscriptionState::Closed);
        assert_eq!(hub.ref_count(&id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn removing_conversation_ends_session() {
        let hub = Arc::new(ConversationHub::new());
        let c = conversation(1);
        let id = c.id.clone();
        hub.insert(c);
        let (publisher, _shutdown) = publisher(&hub);
        let mut sub = publisher.subscribe(&id).unwrap();
        let _ = next_event(&mut sub).await;

        hub.remove(&id).unwrap();
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn subscribe_unknown_conversation_fails() {
        let hub = Arc::new(ConversationHub::new());
        let (publisher, _shutdown) = publisher(&hub);
        assert_matches!(
            publisher.subscribe(&ConversationId::new()),
            Err(StreamError::ConversationNotFound(_))
        );
    }
}
