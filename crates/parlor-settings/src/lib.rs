//! # parlor-settings
//!
//! Layered configuration for the Parlor chat engine.
//!
//! Settings resolve in priority order:
//! 1. **Compiled defaults** ([`ParlorSettings::default()`])
//! 2. **User file** `~/.parlor/settings.json`, deep-merged over defaults
//! 3. **Environment** `PARLOR_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{ContextSettings, LoggingSettings, ParlorSettings, ServerSettings};

use std::sync::OnceLock;

static SETTINGS: OnceLock<ParlorSettings> = OnceLock::new();

/// Process-wide settings, loaded on first access.
///
/// Falls back to compiled defaults if loading fails.
pub fn get_settings() -> &'static ParlorSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            ParlorSettings::default()
        })
    })
}

/// Install explicit settings before anything reads [`get_settings`].
///
/// Returns the value back if settings were already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: ParlorSettings) -> std::result::Result<(), ParlorSettings> {
    SETTINGS.set(settings)
}
