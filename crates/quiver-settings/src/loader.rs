//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`QuiverSettings::default()`]
//! 2. If `~/.quiver/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `QUIVER_*` environment variable overrides (highest priority)
//! 4. Validate cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::QuiverSettings;

/// Resolve the path to the settings file (`~/.quiver/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".quiver").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<QuiverSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults (plus env overrides). If the
/// file contains invalid JSON or the merged result fails validation, returns
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<QuiverSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
fn load_file_layer(path: &Path) -> Result<QuiverSettings> {
    let defaults = serde_json::to_value(QuiverSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut QuiverSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Split out from [`apply_env_overrides`] so tests can supply variables
/// without touching the process environment.
pub fn apply_overrides(settings: &mut QuiverSettings, lookup: impl Fn(&str) -> Option<String>) {
    // ── Index ───────────────────────────────────────────────────────
    if let Some(v) = read_bool(&lookup, "QUIVER_STRICT") {
        settings.index.strict = v;
    }
    if let Some(v) = read_u64(&lookup, "QUIVER_MAX_SKILL_FILE_SIZE", 1024, 64 * 1024 * 1024) {
        settings.index.max_skill_file_size = v;
    }

    // ── Matcher ─────────────────────────────────────────────────────
    if let Some(v) = read_f64(&lookup, "QUIVER_KEYWORD_WEIGHT") {
        settings.matcher.keyword_weight = v;
    }
    if let Some(v) = read_f64(&lookup, "QUIVER_MODE_WEIGHT") {
        settings.matcher.mode_weight = v;
    }
    if let Some(v) = read_f64(&lookup, "QUIVER_FILE_PATTERN_WEIGHT") {
        settings.matcher.file_pattern_weight = v;
    }
    if let Some(v) = read_usize(&lookup, "QUIVER_MAX_CANDIDATES", 1, 10_000) {
        settings.matcher.max_candidates = v;
    }

    // ── Allocator / cache / logging ─────────────────────────────────
    if let Some(v) = read_bool(&lookup, "QUIVER_INCLUDE_OPTIONAL") {
        settings.allocator.include_optional = v;
    }
    if let Some(v) = read_bool(&lookup, "QUIVER_CACHE_ENABLED") {
        settings.cache.enabled = v;
    }
    if let Some(v) = read_usize(&lookup, "QUIVER_CACHE_MAX_ENTRIES", 1, 1_000_000) {
        settings.cache.max_entries = v;
    }
    if let Some(v) = lookup("QUIVER_LOG_LEVEL").filter(|v| !v.is_empty()) {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

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

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a finite, non-negative `f64`.
pub fn parse_weight(val: &str) -> Option<f64> {
    let n: f64 = val.trim().parse().ok()?;
    (n.is_finite() && n >= 0.0).then_some(n)
}

// ── Variable readers (thin wrappers) ────────────────────────────────────────

fn read_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<bool> {
    let val = lookup(name)?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    min: u64,
    max: u64,
) -> Option<u64> {
    let val = lookup(name)?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_usize(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    min: usize,
    max: usize,
) -> Option<usize> {
    let val = lookup(name)?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

fn read_f64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<f64> {
    let val = lookup(name)?;
    let result = parse_weight(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid weight env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"cache": {"enabled": true, "maxEntries": 10}});
        let source = serde_json::json!({"cache": {"maxEntries": 99}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["cache"]["maxEntries"], 99);
        assert_eq!(merged["cache"]["enabled"], true);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = load_file_layer(&tmp.path().join("nope.json")).unwrap();
        assert!(settings.index.strict);
        assert_eq!(settings.cache.max_entries, 1024);
    }

    #[test]
    fn file_values_override_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"index": {"strict": false}, "matcher": {"modeWeight": 0.1}}"#,
        )
        .unwrap();
        let settings = load_file_layer(&path).unwrap();
        assert!(!settings.index.strict);
        assert!((settings.matcher.mode_weight - 0.1).abs() < f64::EPSILON);
        assert!((settings.matcher.keyword_weight - 0.45).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_json_is_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_file_layer(&path),
            Err(SettingsError::Json(_))
        ));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{"matcher": {"descriptionTermCredit": 3.0}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut settings = QuiverSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("QUIVER_STRICT", "off"),
                ("QUIVER_CACHE_MAX_ENTRIES", "16"),
                ("QUIVER_KEYWORD_WEIGHT", "0.9"),
                ("QUIVER_INCLUDE_OPTIONAL", "false"),
                ("QUIVER_LOG_LEVEL", "debug"),
            ]),
        );
        assert!(!settings.index.strict);
        assert_eq!(settings.cache.max_entries, 16);
        assert!((settings.matcher.keyword_weight - 0.9).abs() < f64::EPSILON);
        assert!(!settings.allocator.include_optional);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_overrides_ignored() {
        let mut settings = QuiverSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("QUIVER_STRICT", "maybe"),
                ("QUIVER_CACHE_MAX_ENTRIES", "0"),
                ("QUIVER_MODE_WEIGHT", "-1"),
                ("QUIVER_LOG_LEVEL", ""),
            ]),
        );
        assert!(settings.index.strict);
        assert_eq!(settings.cache.max_entries, 1024);
        assert!((settings.matcher.mode_weight - 0.35).abs() < f64::EPSILON);
        assert_eq!(settings.logging.level, "warn");
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nah"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u64_range("2048", 1024, 4096), Some(2048));
        assert_eq!(parse_u64_range("10", 1024, 4096), None);
        assert_eq!(parse_usize_range("abc", 0, 10), None);
        assert_eq!(parse_weight("0.25"), Some(0.25));
        assert_eq!(parse_weight("inf"), None);
        assert_eq!(parse_weight("-0.5"), None);
    }
}
