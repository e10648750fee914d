//! Server configuration.

use std::time::Duration;

use parlor_settings::{ContextSettings, ParlorSettings};
use parlor_stream::PublisherConfig;

/// Configuration for the Parlor server.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Heartbeat period of a conversation stream.
    pub heartbeat_interval: Duration,
    /// Keep-alive period of the conversation list stream.
    pub list_heartbeat_interval: Duration,
    /// Outbound buffer per stream subscriber.
    pub event_buffer_size: usize,
    /// Formatting of injected context.
    pub context: ContextSettings,
}

impl ServerConfig {
    /// Tuning for the stream publisher.
    #[must_use]
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            heartbeat_interval: self.heartbeat_interval,
            buffer: self.event_buffer_size,
        }
    }

    /// `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&ParlorSettings> for ServerConfig {
    fn from(settings: &ParlorSettings) -> Self {
        let server = &settings.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            heartbeat_interval: Duration::from_millis(server.heartbeat_interval_ms),
            list_heartbeat_interval: Duration::from_millis(server.list_heartbeat_interval_ms),
            event_buffer_size: server.event_buffer_size,
            context: settings.context.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ParlorSettings::default())
    }
}
