//! Settings loading with deep merge and environment variable overrides.
//!
//! 1. Start with compiled [`ParlorSettings::default()`]
//! 2. If `~/.parlor/settings.json` exists, deep-merge it over the defaults
//! 3. Apply `PARLOR_*` environment overrides
//! 4. Validate

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::ParlorSettings;

/// Path of the user settings file (`~/.parlor/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".parlor").join("settings.json")
}

/// Load settings from the default path.
pub fn load_settings() -> Result<ParlorSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`, falling back to defaults when it is absent.
pub fn load_settings_from_path(path: &Path) -> Result<ParlorSettings> {
    let defaults = serde_json::to_value(ParlorSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings file");
        let user: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "no settings file, using defaults");
        defaults
    };

    let mut settings: ParlorSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive merge of `source` over `target`.
///
/// Objects merge per key, arrays and primitives are replaced, and nulls in
/// `source` leave the target untouched.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                if value.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `PARLOR_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut ParlorSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using `lookup` as the variable source.
///
/// Unparseable values are ignored with a warning.
pub fn apply_overrides_from(settings: &mut ParlorSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("PARLOR_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("PARLOR_PORT") {
        match parse_u16_range(&v, 1, u16::MAX) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "PARLOR_PORT", value = %v, "invalid port, ignoring"),
        }
    }
    if let Some(v) = read("PARLOR_HEARTBEAT_INTERVAL_MS") {
        match parse_u64_range(&v, 100, 600_000) {
            Some(ms) => settings.server.heartbeat_interval_ms = ms,
            None => warn!(key = "PARLOR_HEARTBEAT_INTERVAL_MS", value = %v, "invalid interval, ignoring"),
        }
    }
    if let Some(v) = read("PARLOR_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("PARLOR_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => warn!(key = "PARLOR_LOG_JSON", value = %v, "invalid boolean, ignoring"),
        }
    }
}

// ── Pure parsers ────────────────────────────────────────────────────────────

/// Parse `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, case-insensitively.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `u16` within `[min, max]`.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a `u64` within `[min, max]`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
