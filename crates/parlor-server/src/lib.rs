//! # parlor-server
//!
//! Axum HTTP + SSE server for live conversations and context assembly.
//!
//! - HTTP endpoints: health, conversation CRUD, error reporting, context transform
//! - SSE conversation streams backed by per-subscriber publisher sessions
//! - SSE conversation list stream emitting `invalidate` events
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod sse;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, ParlorServer};
pub use shutdown::ShutdownCoordinator;
