//! # quiver-settings
//!
//! Configuration management with layered sources for the skill engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`QuiverSettings::default()`]
//! 2. **User file** — `~/.quiver/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `QUIVER_*` overrides (highest priority)
//!
//! The engine always receives settings explicitly; [`get_settings`] exists for
//! hosts that want a process-wide instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<QuiverSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.quiver/settings.json` with env var
/// overrides. If loading fails, returns compiled defaults.
pub fn get_settings() -> &'static QuiverSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            QuiverSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns `Err(settings)` if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: QuiverSettings) -> std::result::Result<(), QuiverSettings> {
    SETTINGS.set(settings)
}
