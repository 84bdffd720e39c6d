//! Settings types.
//!
//! All sections use `camelCase` on the wire and `#[serde(default)]` so a
//! partial settings file only needs the keys it changes.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object for the skill engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuiverSettings {
    /// Settings schema version.
    pub version: String,
    /// Index build settings.
    pub index: IndexSettings,
    /// Activation matcher settings.
    pub matcher: MatcherSettings,
    /// Token budget allocator settings.
    pub allocator: AllocatorSettings,
    /// Assembly cache settings.
    pub cache: CacheSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Default for QuiverSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            index: IndexSettings::default(),
            matcher: MatcherSettings::default(),
            allocator: AllocatorSettings::default(),
            cache: CacheSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl QuiverSettings {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.matcher.validate()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Index
// ─────────────────────────────────────────────────────────────────────────────

/// Index build settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexSettings {
    /// Fail the whole build on any malformed document. When false, malformed
    /// documents are excluded and reported instead.
    pub strict: bool,
    /// Maximum size of a single SKILL.md file, in bytes.
    pub max_skill_file_size: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            strict: true,
            max_skill_file_size: 256 * 1024,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Matcher
// ─────────────────────────────────────────────────────────────────────────────

/// Activation matcher weights and limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatcherSettings {
    /// Weight of the keyword-overlap signal.
    pub keyword_weight: f64,
    /// Weight of the mode-match signal.
    pub mode_weight: f64,
    /// Weight of the file-pattern signal.
    pub file_pattern_weight: f64,
    /// Credit (0.0–1.0) for a context token that only matches a word mined
    /// from a skill's description.
    pub description_term_credit: f64,
    /// Candidates scoring below this are dropped.
    pub min_score: f64,
    /// Maximum number of ranked candidates handed to the allocator; the rest
    /// are reported as omitted.
    pub max_candidates: usize,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            keyword_weight: 0.45,
            mode_weight: 0.35,
            file_pattern_weight: 0.20,
            description_term_credit: 0.5,
            min_score: 0.0,
            max_candidates: 32,
        }
    }
}

impl MatcherSettings {
    fn validate(&self) -> Result<()> {
        let weights = [
            ("keywordWeight", self.keyword_weight),
            ("modeWeight", self.mode_weight),
            ("filePatternWeight", self.file_pattern_weight),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(SettingsError::InvalidValue(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if weights.iter().all(|(_, v)| *v <= 0.0) {
            return Err(SettingsError::InvalidValue(
                "at least one matcher weight must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.description_term_credit) {
            return Err(SettingsError::InvalidValue(format!(
                "descriptionTermCredit must be within 0.0..=1.0, got {}",
                self.description_term_credit
            )));
        }
        if !self.min_score.is_finite() {
            return Err(SettingsError::InvalidValue(
                "minScore must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Allocator / cache / logging
// ─────────────────────────────────────────────────────────────────────────────

/// Token budget allocator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllocatorSettings {
    /// Admit optional companions (one hop) of matched skills when budget allows.
    pub include_optional: bool,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            include_optional: true,
        }
    }
}

/// Assembly cache settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Whether assembly results are memoized.
    pub enabled: bool,
    /// Maximum number of memoized results before the cache is reset.
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1024,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
