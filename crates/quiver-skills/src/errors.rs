//! Error types for index and graph construction.
//!
//! Build-time errors are the only errors the engine produces. Per-turn budget
//! shortfalls are reported as data in the assembly result, not here.

use quiver_core::SkillId;

/// A problem with one skill document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{document}: {kind}")]
pub struct SchemaError {
    /// Path or label of the offending document.
    pub document: String,
    /// What is wrong with it.
    pub kind: SchemaErrorKind,
}

impl SchemaError {
    /// Create a schema error for `document`.
    pub fn new(document: impl Into<String>, kind: SchemaErrorKind) -> Self {
        Self {
            document: document.into(),
            kind,
        }
    }
}

/// Specific schema violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaErrorKind {
    /// Document does not open with a `---` fenced YAML block.
    #[error("missing YAML frontmatter (expected leading and closing ---)")]
    MissingFrontmatter,

    /// Frontmatter is not valid YAML for the skill schema.
    #[error("invalid frontmatter: {0}")]
    Yaml(String),

    /// A required field is absent or empty.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// The skill id contains disallowed characters or is too long.
    #[error("invalid skill id `{0}` (lowercase letters, digits and -_./: only)")]
    InvalidId(String),

    /// The version is not `MAJOR.MINOR.PATCH[-pre][+build]`.
    #[error("invalid version `{0}`")]
    InvalidVersion(String),

    /// A file pattern failed to compile.
    #[error("invalid file pattern `{pattern}`: {message}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// Another document already declared this id.
    #[error("duplicate skill id `{id}` (first declared in {first_document})")]
    DuplicateId {
        /// The colliding id.
        id: SkillId,
        /// Document that declared it first.
        first_document: String,
    },

    /// The skill lists itself as a required dependency.
    #[error("skill `{0}` requires itself")]
    SelfDependency(SkillId),

    /// A required dependency does not name any indexed skill.
    #[error("unknown required dependency `{dependency}`")]
    UnknownDependency {
        /// The reference as written.
        dependency: String,
    },

    /// A required dependency exists but was itself rejected.
    #[error("required dependency `{dependency}` was rejected")]
    RejectedDependency {
        /// The rejected dependency.
        dependency: SkillId,
    },

    /// A declared tier cost is negative.
    #[error("tier `{tier}` declares a negative token cost ({cost})")]
    NegativeCost {
        /// Tier name.
        tier: String,
        /// Declared cost.
        cost: i64,
    },

    /// Declared tier costs decrease with disclosure depth.
    #[error("tier `{tier}` costs {cost} tokens, less than the previous tier ({previous})")]
    NonMonotonicTiers {
        /// Tier name.
        tier: String,
        /// Declared cost of this tier.
        cost: u64,
        /// Cost of the tier before it.
        previous: u64,
    },

    /// The file could not be read.
    #[error("unreadable: {0}")]
    Unreadable(String),

    /// The file exceeds the configured size limit.
    #[error("file too large: {size} bytes (max {max} bytes)")]
    FileTooLarge {
        /// Actual size.
        size: u64,
        /// Configured maximum.
        max: u64,
    },
}

/// Failure to build a [`SkillIndex`](crate::index::SkillIndex).
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// One or more documents failed validation in strict mode.
    #[error("{} skill document(s) failed validation:\n{}", .0.len(), format_schema_errors(.0))]
    Schema(Vec<SchemaError>),

    /// The combined file-pattern matcher could not be built.
    #[error("failed to compile file patterns: {0}")]
    Patterns(#[from] globset::Error),
}

impl IndexError {
    /// All schema errors carried by this error.
    pub fn schema_errors(&self) -> &[SchemaError] {
        match self {
            Self::Schema(errors) => errors,
            Self::Patterns(_) => &[],
        }
    }
}

/// A cycle among required dependencies.
///
/// `path` starts and ends with the same id, e.g. `[a, b, a]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("required dependency cycle: {}", format_path(.path))]
pub struct CycleError {
    /// The full cycle path.
    pub path: Vec<SkillId>,
}

impl CycleError {
    /// Whether `id` participates in the cycle.
    pub fn involves(&self, id: &str) -> bool {
        self.path.iter().any(|p| p.as_str() == id)
    }
}

fn format_schema_errors(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_path(path: &[SkillId]) -> String {
    path.iter()
        .map(SkillId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
