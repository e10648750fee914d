//! `ParlorServer`: Axum HTTP + SSE server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use parlor_context::ContextAssembler;
use parlor_stream::{ConversationHub, StreamPublisher};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::routes;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live conversations.
    pub hub: Arc<ConversationHub>,
    /// Conversation stream sessions.
    pub publisher: StreamPublisher,
    /// Outgoing context assembly.
    pub assembler: Arc<ContextAssembler>,
    /// Cancelled on shutdown.
    pub shutdown: CancellationToken,
    /// When the server started.
    pub start_time: Instant,
    /// Keep-alive period of the conversation list stream.
    pub list_heartbeat_interval: Duration,
}

/// The Parlor server.
pub struct ParlorServer {
    config: ServerConfig,
    hub: Arc<ConversationHub>,
    publisher: StreamPublisher,
    assembler: Arc<ContextAssembler>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl ParlorServer {
    /// Server with an empty hub.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_hub(config, Arc::new(ConversationHub::new()))
    }

    /// Server over an existing hub.
    pub fn with_hub(config: ServerConfig, hub: Arc<ConversationHub>) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let publisher = StreamPublisher::new(Arc::clone(&hub), config.publisher_config(), shutdown.token());
        let assembler = Arc::new(ContextAssembler::new(&config.context));
        Self {
            config,
            hub,
            publisher,
            assembler,
            shutdown,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            publisher: self.publisher.clone(),
            assembler: Arc::clone(&self.assembler),
            shutdown: self.shutdown.token(),
            start_time: self.start_time,
            list_heartbeat_interval: self.config.list_heartbeat_interval,
        };

        Router::new()
            .route("/health", get(health_handler))
            .merge(routes::api_routes())
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address and the serving task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, "parlor server listening");
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            if let Err(e) = served {
                error!(error = %e, "server error");
            }
            info!("parlor server stopped");
        });
        Ok((addr, handle))
    }

    /// Live conversations.
    pub fn hub(&self) -> &Arc<ConversationHub> {
        &self.hub
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.len(),
        state.hub.subscriber_count(),
        state.shutdown.is_cancelled(),
    ))
}
