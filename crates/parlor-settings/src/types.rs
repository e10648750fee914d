//! Settings types.
//!
//! Every struct uses `#[serde(default)]` so partial JSON files merge cleanly
//! over compiled defaults.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParlorSettings {
    /// HTTP and push-channel settings.
    pub server: ServerSettings,
    /// Prompt injection settings.
    pub context: ContextSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl ParlorSettings {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must be positive".into(),
            ));
        }
        if self.server.list_heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.listHeartbeatIntervalMs must be positive".into(),
            ));
        }
        if self.server.event_buffer_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.eventBufferSize must be positive".into(),
            ));
        }
        if self.context.injection_tag.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "context.injectionTag must not be blank".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP server and stream settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Heartbeat period of a conversation stream, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Heartbeat period of the conversation list stream, in milliseconds.
    pub list_heartbeat_interval_ms: u64,
    /// Per-subscriber outbound channel capacity.
    pub event_buffer_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8490,
            heartbeat_interval_ms: 1_000,
            list_heartbeat_interval_ms: 15_000,
            event_buffer_size: 256,
        }
    }
}

/// Prompt injection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextSettings {
    /// Tag wrapped around injected non-system messages.
    pub injection_tag: String,
    /// Joiner for merged injection contents.
    pub separator: String,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            injection_tag: "injected_context".to_string(),
            separator: "\n".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
