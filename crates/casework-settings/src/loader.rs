//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CaseworkSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `CASEWORK_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::CaseworkSettings;

/// Resolve the default settings file path (`~/.casework/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".casework").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CaseworkSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a malformed one is an error. The result is
/// validated before it is returned.
pub fn load_settings_from_path(path: &Path) -> Result<CaseworkSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// [`load_settings_from_path`] with an injectable environment lookup.
pub fn load_with_env<F>(path: &Path, env: F) -> Result<CaseworkSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(CaseworkSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: CaseworkSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides read through `env`.
///
/// Invalid values are logged at `warn` and ignored (the file/default value
/// stays in effect).
pub fn apply_env_overrides<F>(settings: &mut CaseworkSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let reader = EnvReader { env };

    // ── Transport ───────────────────────────────────────────────────
    if let Some(v) = reader.string("CASEWORK_AGENT_WS_URL") {
        settings.transport.url = v;
    }
    if let Some(v) = reader.bool("CASEWORK_MOCK") {
        settings.transport.mock = v;
    }
    if let Some(v) = reader.u64("CASEWORK_PING_INTERVAL_MS", 1_000, 600_000) {
        settings.transport.ping_interval_ms = v;
    }
    if let Some(v) = reader
        .u64("CASEWORK_RECONNECT_MAX_ATTEMPTS", 0, 100)
        .and_then(|v| u32::try_from(v).ok())
    {
        settings.transport.reconnect.max_attempts = v;
    }

    // ── Protocol ────────────────────────────────────────────────────
    if let Some(v) = reader.u64("CASEWORK_QUERY_TIMEOUT_MS", 100, 3_600_000) {
        settings.protocol.query_timeout_ms = v;
    }
    if let Some(v) = reader.string("CASEWORK_SESSION_ID") {
        settings.protocol.session_id = Some(v);
    }

    // ── Queues ──────────────────────────────────────────────────────
    if let Some(v) = reader.usize("CASEWORK_QUEUE_CAPACITY", 1, 1_000) {
        settings.queues.capacity = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = reader.string("CASEWORK_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    env: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|v| !v.trim().is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.env)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.env)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.env)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
