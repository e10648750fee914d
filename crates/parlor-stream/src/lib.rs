//! # parlor-stream
//!
//! Live conversation updates for connected clients.
//!
//! - **DTOs / snapshots**: transport form of a conversation and its list entry
//! - **Diff**: detects the common case of exactly one changed node
//! - **Events**: `snapshot`, `node_update`, `error` and list `invalidate`
//! - **Hub**: owns live conversation state, errors and subscriber counts
//! - **Publisher**: one session per subscriber with its own sequence counter,
//!   diff baseline, error de-duplication and heartbeats

#![deny(unsafe_code)]

pub mod diff;
pub mod dto;
pub mod errors;
pub mod events;
pub mod hub;
pub mod publisher;
pub mod snapshot;

pub use diff::{NodeDiff, single_node_diff};
pub use dto::{ConversationDto, ConversationListDto, MessageDto, MessageNodeDto};
pub use errors::{Result, StreamError};
pub use events::{ConversationEvent, ConversationListEvent};
pub use hub::{ChangeKind, ChatError, ConversationChange, ConversationHub, ConversationRef};
pub use publisher::{
    PublisherConfig, StreamItem, StreamPublisher, Subscription, SubscriptionCursor,
    SubscriptionState,
};
pub use snapshot::{build_list_item, build_snapshot};
