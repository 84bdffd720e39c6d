//! Per-turn request and result types.

use std::fmt;

use quiver_core::SkillId;
use serde::Serialize;

/// Everything the engine knows about one assistant turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationContext {
    /// Free-text task description.
    pub text: String,
    /// Files touched or opened during the task.
    pub touched_files: Vec<String>,
    /// Declared execution mode, if any.
    pub mode: Option<String>,
    /// Token ceiling for this turn.
    pub budget: u64,
}

impl ActivationContext {
    /// Context with text and budget only.
    pub fn new(text: impl Into<String>, budget: u64) -> Self {
        Self {
            text: text.into(),
            budget,
            ..Self::default()
        }
    }

    /// Add a touched file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.touched_files.push(path.into());
        self
    }

    /// Replace the touched file list.
    #[must_use]
    pub fn with_files<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.touched_files = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set the active mode.
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Set the budget.
    #[must_use]
    pub fn with_budget(mut self, budget: u64) -> Self {
        self.budget = budget;
        self
    }
}

/// Content hash of the inputs an assembly depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap a hex digest.
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three normalized matcher signals, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Signals {
    /// Keyword overlap.
    pub keyword: f64,
    /// Mode match.
    pub mode: f64,
    /// File-pattern hit.
    pub file: f64,
}

/// A ranked activation candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    /// Skill id.
    pub id: SkillId,
    /// Weighted score.
    pub score: f64,
    /// Signals the score was computed from.
    pub signals: Signals,
    /// Declared dependency count, used as the first tie-breaker.
    pub dependency_count: usize,
}

/// How a skill came to be admitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Admission {
    /// Ranked by the matcher.
    Matched {
        /// Zero-based rank.
        rank: usize,
        /// Matcher score.
        score: f64,
    },
    /// Pulled in as a required dependency of another admitted skill.
    RequiredBy {
        /// The skill that requires it.
        dependent: SkillId,
    },
    /// Optional companion of another admitted skill.
    CompanionOf {
        /// The skill that names it as optional.
        anchor: SkillId,
    },
}

/// A skill admitted into the bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmittedSkill {
    /// Skill id.
    pub id: SkillId,
    /// Deepest admitted tier.
    pub tier: usize,
    /// Name of `tier`.
    pub tier_name: String,
    /// Tokens consumed by tiers `0..=tier`.
    pub tokens: u64,
    /// Deepest tier the skill has.
    pub max_tier: usize,
    /// Why the skill is in the bundle.
    pub admission: Admission,
}

impl AdmittedSkill {
    /// Whether the skill was admitted at its deepest tier.
    pub fn is_fully_loaded(&self) -> bool {
        self.tier == self.max_tier
    }
}

/// Why a considered skill was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum OmissionReason {
    /// Even the top-ranked skill's metadata (with its required
    /// dependencies) exceeds the budget.
    MetadataBudgetInsufficient {
        /// Tokens the metadata would take.
        needed: u64,
        /// Budget for the turn.
        budget: u64,
    },
    /// Metadata did not fit in what remained after higher-ranked skills.
    MetadataDoesNotFit {
        /// Tokens the metadata would take.
        needed: u64,
        /// Tokens left when it was considered.
        remaining: u64,
    },
    /// A required dependency does not accept the active mode.
    DependencyModeExcluded {
        /// The dependency outside the mode.
        dependency: SkillId,
    },
    /// Ranked past the matcher's candidate limit.
    BelowCandidateCutoff {
        /// Zero-based rank among all matched skills.
        rank: usize,
    },
}

impl fmt::Display for OmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MetadataBudgetInsufficient { needed, budget } => write!(
                f,
                "budget insufficient for minimum metadata (needs {needed} tokens, budget {budget})"
            ),
            Self::MetadataDoesNotFit { needed, remaining } => write!(
                f,
                "metadata does not fit (needs {needed} tokens, {remaining} remaining)"
            ),
            Self::DependencyModeExcluded { dependency } => {
                write!(f, "required dependency {dependency} is outside the active mode")
            }
            Self::BelowCandidateCutoff { rank } => {
                write!(f, "ranked below the candidate limit (rank {rank})")
            }
        }
    }
}

/// A skill considered but not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Omission {
    /// Skill id.
    pub id: SkillId,
    /// Why it was left out.
    pub reason: OmissionReason,
}

/// Outcome of allocation for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyResult {
    /// Admitted skills in admission order.
    pub admitted: Vec<AdmittedSkill>,
    /// Sum of admitted tokens; never exceeds `budget`.
    pub total_tokens: u64,
    /// Budget the allocation ran against.
    pub budget: u64,
    /// Skills considered but left out.
    pub omitted: Vec<Omission>,
    /// Fingerprint of the inputs.
    pub fingerprint: Fingerprint,
    /// Index generation the result was computed against.
    pub generation: u64,
}

impl AssemblyResult {
    /// Admitted entry for `id`.
    pub fn get(&self, id: &str) -> Option<&AdmittedSkill> {
        self.admitted.iter().find(|a| a.id.as_str() == id)
    }

    /// Whether `id` was admitted at any tier.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Whether nothing was admitted.
    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
