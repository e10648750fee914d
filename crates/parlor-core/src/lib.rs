//! # parlor-core
//!
//! Foundation types, errors, branded IDs, and logging for the Parlor chat engine.
//!
//! This crate provides the shared vocabulary that all other Parlor crates depend on:
//!
//! - **Branded IDs**: `ConversationId`, `NodeId`, `MessageId`, … as newtypes for type safety
//! - **Messages**: [`Message`](messages::Message) with a role and ordered content parts
//! - **Conversations**: [`MessageNode`](conversation::MessageNode) branch points and the
//!   [`Conversation`](conversation::Conversation) that orders them
//! - **Errors**: [`ParlorError`](errors::ParlorError) via `thiserror`
//! - **Logging**: `tracing` subscriber bootstrap and in-memory capture for tests

#![deny(unsafe_code)]

pub mod conversation;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod messages;

pub use conversation::{Conversation, MessageNode};
pub use errors::{ParlorError, Result};
pub use messages::{Message, MessagePart, MessageRole, TokenUsage};
