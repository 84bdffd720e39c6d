//! Core types for skill documents and indexed records.

use std::collections::BTreeSet;

use quiver_core::SkillId;
use serde::{Deserialize, Serialize};

/// A skill document as supplied by the loader, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Path or label used in error messages.
    pub source: String,
    /// Plugin namespace used to qualify bare names, if known.
    pub namespace: Option<String>,
    /// Full document text (frontmatter + body).
    pub content: String,
}

impl RawDocument {
    /// Create a document without a namespace.
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            namespace: None,
            content: content.into(),
        }
    }

    /// Attach a plugin namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frontmatter (wire format)
// ─────────────────────────────────────────────────────────────────────────────

/// A list field that may be written as a YAML list or a comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    /// `keywords: zod, schema`
    Csv(String),
    /// `keywords: [zod, schema]`
    List(Vec<String>),
}

impl StringList {
    /// Flatten into trimmed, non-empty items.
    pub fn to_vec(&self) -> Vec<String> {
        let items: Vec<String> = match self {
            Self::Csv(s) => s.split(',').map(ToString::to_string).collect(),
            Self::List(v) => v.clone(),
        };
        items
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// A scalar that YAML may type as a number (`version: 1.2`) or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Quoted or unquoted text.
    Text(String),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
        }
    }
}

/// Declared dependencies in frontmatter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DependencySpec {
    /// Skills that must be present whenever this one is.
    pub required: Option<StringList>,
    /// Companion skills worth loading when budget allows.
    pub optional: Option<StringList>,
}

/// Declared per-tier token costs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TokenCosts {
    /// Tier 0.
    pub metadata: Option<i64>,
    /// Tier 1.
    pub instructions: Option<i64>,
    /// Tier 2.
    pub resources: Option<i64>,
}

/// YAML frontmatter of a SKILL.md file.
///
/// Unknown keys (`allowed-tools`, `license`, ...) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SkillFrontmatter {
    /// Skill name; becomes the id (qualified by namespace when bare).
    pub name: Option<String>,
    /// Semantic version.
    pub version: Option<Scalar>,
    /// Short description, also mined for weak keywords.
    pub description: Option<String>,
    /// Trigger keywords and phrases.
    pub keywords: Option<StringList>,
    /// Alternate spelling of `keywords`; merged with it.
    pub triggers: Option<StringList>,
    /// Glob patterns matched against touched files.
    #[serde(alias = "filePatterns", alias = "file-patterns")]
    pub file_patterns: Option<StringList>,
    /// Execution modes; empty means mode-agnostic.
    pub modes: Option<StringList>,
    /// Required and optional dependencies.
    pub dependencies: Option<DependencySpec>,
    /// Informational clustering tag.
    pub group: Option<String>,
    /// Declared tier costs.
    #[serde(alias = "tokenCosts", alias = "token-costs")]
    pub token_costs: Option<TokenCosts>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Indexed records
// ─────────────────────────────────────────────────────────────────────────────

/// One disclosure tier of a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tier {
    /// `metadata`, `instructions`, or `resources`.
    pub name: String,
    /// Token cost of loading this tier on top of the previous ones.
    pub tokens: u64,
    /// Content injected when this tier is admitted.
    pub content: String,
}

/// Resolved dependency lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dependencies {
    /// Transitively required skills.
    pub required: Vec<SkillId>,
    /// One-hop companions.
    pub optional: Vec<SkillId>,
}

impl Dependencies {
    /// Total number of declared dependencies.
    pub fn len(&self) -> usize {
        self.required.len() + self.optional.len()
    }

    /// Whether there are no dependencies at all.
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }
}

/// A validated, immutable skill record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillRecord {
    /// Globally unique id.
    pub id: SkillId,
    /// Semantic version string.
    pub version: String,
    /// Description from frontmatter.
    pub description: String,
    /// Normalized keywords and phrases.
    pub keywords: BTreeSet<String>,
    /// Individual words of all keywords (phrases split), for single-word matches.
    pub keyword_words: BTreeSet<String>,
    /// Weak keywords mined from the description.
    pub description_terms: BTreeSet<String>,
    /// Glob patterns as written.
    pub file_patterns: Vec<String>,
    /// Lowercase modes; empty means mode-agnostic.
    pub modes: BTreeSet<String>,
    /// Disclosure tiers; tier 0 is always `metadata`.
    pub tiers: Vec<Tier>,
    /// Resolved dependencies.
    pub dependencies: Dependencies,
    /// Informational group tag.
    pub group: Option<String>,
    /// Document the record came from.
    pub source: String,
}

impl SkillRecord {
    /// Whether the skill declares no modes.
    pub fn is_mode_agnostic(&self) -> bool {
        self.modes.is_empty()
    }

    /// Whether the skill may activate under `mode`.
    ///
    /// Mode-agnostic skills accept every mode, including none. Mode-specific
    /// skills require the active mode to be one of theirs.
    pub fn accepts_mode(&self, mode: Option<&str>) -> bool {
        if self.is_mode_agnostic() {
            return true;
        }
        mode.is_some_and(|m| self.modes.contains(&m.to_lowercase()))
    }

    /// Index of the deepest tier.
    pub fn max_tier(&self) -> usize {
        self.tiers.len().saturating_sub(1)
    }

    /// Incremental cost of tier `tier`, if it exists.
    pub fn tier_cost(&self, tier: usize) -> Option<u64> {
        self.tiers.get(tier).map(|t| t.tokens)
    }

    /// Tier-0 cost.
    pub fn metadata_cost(&self) -> u64 {
        self.tier_cost(0).unwrap_or(0)
    }

    /// Cost of tiers `0..=tier` combined.
    pub fn cumulative_cost(&self, tier: usize) -> u64 {
        self.tiers
            .iter()
            .take(tier + 1)
            .fold(0u64, |sum, t| sum.saturating_add(t.tokens))
    }

    /// Content of tiers `0..=tier`, joined by blank lines.
    pub fn content_through(&self, tier: usize) -> String {
        self.tiers
            .iter()
            .take(tier + 1)
            .map(|t| t.content.as_str())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn record(modes: &[&str]) -> SkillRecord {
        SkillRecord {
            id: SkillId::new("zod"),
            version: "1.0.0".into(),
            description: "Zod schemas".into(),
            keywords: BTreeSet::new(),
            keyword_words: BTreeSet::new(),
            description_terms: BTreeSet::new(),
            file_patterns: Vec::new(),
            modes: modes.iter().map(|m| (*m).to_string()).collect(),
            tiers: vec![
                Tier { name: "metadata".into(), tokens: 10, content: "meta".into() },
                Tier { name: "instructions".into(), tokens: 100, content: "do".into() },
                Tier { name: "resources".into(), tokens: 300, content: "ref".into() },
            ],
            dependencies: Dependencies::default(),
            group: None,
            source: "test".into(),
        }
    }

    #[test]
    fn string_list_csv_and_list() {
        let csv = StringList::Csv("zod, schema ,, ".into());
        assert_eq!(csv.to_vec(), vec!["zod", "schema"]);
        let list = StringList::List(vec![" a ".into(), String::new()]);
        assert_eq!(list.to_vec(), vec!["a"]);
    }

    #[test]
    fn scalar_display() {
        assert_eq!(Scalar::Text("1.0.0".into()).to_string(), "1.0.0");
        assert_eq!(Scalar::Int(2).to_string(), "2");
        assert_eq!(Scalar::Float(1.5).to_string(), "1.5");
    }

    #[test]
    fn mode_agnostic_accepts_anything() {
        let r = record(&[]);
        assert!(r.accepts_mode(None));
        assert!(r.accepts_mode(Some("frontend_ui")));
    }

    #[test]
    fn mode_specific_requires_membership() {
        let r = record(&["testing_backend"]);
        assert!(r.accepts_mode(Some("testing_backend")));
        assert!(r.accepts_mode(Some("Testing_Backend")));
        assert!(!r.accepts_mode(Some("frontend_ui")));
        assert!(!r.accepts_mode(None));
    }

    #[test]
    fn tier_costs() {
        let r = record(&[]);
        assert_eq!(r.max_tier(), 2);
        assert_eq!(r.metadata_cost(), 10);
        assert_eq!(r.tier_cost(1), Some(100));
        assert_eq!(r.tier_cost(3), None);
        assert_eq!(r.cumulative_cost(1), 110);
        assert_eq!(r.cumulative_cost(2), 410);
    }

    #[test]
    fn content_through_joins_tiers() {
        let r = record(&[]);
        assert_eq!(r.content_through(0), "meta");
        assert_eq!(r.content_through(2), "meta\n\ndo\n\nref");
    }
}
