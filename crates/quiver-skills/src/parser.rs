//! SKILL.md parser and validator.
//!
//! Splits a document into YAML frontmatter and a markdown body, validates the
//! frontmatter against the skill schema, and cuts the body into disclosure
//! tiers. Dependency references are returned unresolved; the index resolves
//! them once every document's id is known.

use std::collections::BTreeSet;

use globset::Glob;
use quiver_core::{SkillId, TIER_INSTRUCTIONS, TIER_METADATA, TIER_RESOURCES, estimate_tokens};

use crate::constants::{INSTRUCTIONS_MARKER, MAX_ID_LEN, RESOURCES_HEADING, RESOURCES_MARKER};
use crate::errors::{SchemaError, SchemaErrorKind};
use crate::text::{description_terms, normalize_keyword};
use crate::types::{
    Dependencies, RawDocument, SkillFrontmatter, SkillRecord, StringList, Tier, TokenCosts,
};

/// A validated document whose dependency references are not yet resolved.
#[derive(Debug, Clone)]
pub struct ParsedSkill {
    /// Record with empty `dependencies`.
    pub record: SkillRecord,
    /// Namespace the document was loaded under.
    pub namespace: Option<String>,
    /// Required references as written.
    pub required_refs: Vec<String>,
    /// Optional references as written.
    pub optional_refs: Vec<String>,
    /// Compiled file patterns, parallel to `record.file_patterns`.
    pub globs: Vec<Glob>,
}

/// Parse and validate one raw document.
pub fn parse_document(doc: &RawDocument) -> Result<ParsedSkill, SchemaError> {
    parse_inner(doc).map_err(|kind| SchemaError::new(doc.source.clone(), kind))
}

fn parse_inner(doc: &RawDocument) -> Result<ParsedSkill, SchemaErrorKind> {
    let (yaml, body) =
        extract_frontmatter(&doc.content).ok_or(SchemaErrorKind::MissingFrontmatter)?;

    let fm: SkillFrontmatter = if yaml.trim().is_empty() {
        SkillFrontmatter::default()
    } else {
        serde_yaml_ng::from_str(&yaml).map_err(|e| SchemaErrorKind::Yaml(e.to_string()))?
    };

    let name = required_text(fm.name.as_deref(), "name")?;
    let namespace = doc.namespace.as_deref().map(normalize_namespace);
    let id = qualify(&name, namespace.as_deref());
    validate_id(&id)?;

    let version = fm
        .version
        .as_ref()
        .map(|v| v.to_string().trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(SchemaErrorKind::MissingField("version"))?;
    if !is_valid_version(&version) {
        return Err(SchemaErrorKind::InvalidVersion(version));
    }

    let description = required_text(fm.description.as_deref(), "description")?;

    let keywords: BTreeSet<String> = list(fm.keywords.as_ref())
        .into_iter()
        .chain(list(fm.triggers.as_ref()))
        .filter_map(|k| normalize_keyword(&k))
        .collect();
    let keyword_words: BTreeSet<String> = keywords
        .iter()
        .flat_map(|k| k.split(' ').map(ToString::to_string))
        .collect();

    let file_patterns = list(fm.file_patterns.as_ref());
    let globs = file_patterns
        .iter()
        .map(|p| {
            Glob::new(p).map_err(|e| SchemaErrorKind::InvalidPattern {
                pattern: p.clone(),
                message: e.kind().to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let modes: BTreeSet<String> = list(fm.modes.as_ref())
        .into_iter()
        .map(|m| m.to_lowercase())
        .collect();

    let deps = fm.dependencies.clone().unwrap_or_default();
    let required_refs = list(deps.required.as_ref());
    let optional_refs = list(deps.optional.as_ref());
    if required_refs
        .iter()
        .any(|r| r.eq_ignore_ascii_case(&name) || r.eq_ignore_ascii_case(id.as_str()))
    {
        return Err(SchemaErrorKind::SelfDependency(id));
    }

    let metadata = render_metadata(&description, &keywords);
    let (instructions, resources) = split_body_tiers(&body);
    let tiers = build_tiers(
        metadata,
        instructions,
        resources,
        &fm.token_costs.clone().unwrap_or_default(),
    )?;

    let group = fm
        .group
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(ToString::to_string);

    let description_terms = description_terms(&description).into_iter().collect();

    Ok(ParsedSkill {
        record: SkillRecord {
            id,
            version,
            description,
            keywords,
            keyword_words,
            description_terms,
            file_patterns,
            modes,
            tiers,
            dependencies: Dependencies::default(),
            group,
            source: doc.source.clone(),
        },
        namespace,
        required_refs,
        optional_refs,
        globs,
    })
}

/// Extract YAML frontmatter from content.
///
/// Looks for a `---` delimited block at the start of the content.
/// Returns `(yaml, body_after_frontmatter)`, or `None` when the block is
/// missing or unterminated.
pub fn extract_frontmatter(content: &str) -> Option<(String, String)> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    let after_first = trimmed.strip_prefix("---")?;
    let after_first = after_first
        .strip_prefix("\r\n")
        .or_else(|| after_first.strip_prefix('\n'))?;

    // Closing fence may sit on the very first line (empty frontmatter)
    let (yaml, rest) = if let Some(rest) = after_first.strip_prefix("---") {
        ("", rest)
    } else {
        let end_idx = after_first.find("\n---")?;
        (&after_first[..end_idx], &after_first[end_idx + 4..])
    };

    let rest = rest.trim_start_matches('-');
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);
    Some((yaml.to_string(), body.to_string()))
}

/// Split a body into `(instructions, resources)`.
///
/// Resources start at a `<!-- tier: resources -->` comment or a `## Resources`
/// heading outside code fences. A leading `<!-- tier: instructions -->`
/// comment is dropped.
pub fn split_body_tiers(body: &str) -> (String, String) {
    let mut instructions = Vec::new();
    let mut resources = Vec::new();
    let mut in_resources = false;
    let mut in_code_block = false;

    for line in body.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
        } else if !in_code_block {
            match tier_marker(trimmed) {
                Some(Marker::Resources) if !in_resources => {
                    in_resources = true;
                    continue;
                }
                Some(Marker::Instructions) if !in_resources => continue,
                _ => {}
            }
            if !in_resources && trimmed.to_lowercase() == RESOURCES_HEADING {
                in_resources = true;
            }
        }

        if in_resources {
            resources.push(line);
        } else {
            instructions.push(line);
        }
    }

    (
        instructions.join("\n").trim().to_string(),
        resources.join("\n").trim().to_string(),
    )
}

enum Marker {
    Instructions,
    Resources,
}

fn tier_marker(line: &str) -> Option<Marker> {
    let inner = line.strip_prefix("<!--")?.strip_suffix("-->")?;
    let normalized = inner.split_whitespace().collect::<Vec<_>>().join(" ");
    let normalized = normalized.to_lowercase().replace(": ", ":").replace(':', ": ");
    if normalized == RESOURCES_MARKER {
        Some(Marker::Resources)
    } else if normalized == INSTRUCTIONS_MARKER {
        Some(Marker::Instructions)
    } else {
        None
    }
}

/// Render the always-resident tier-0 text.
fn render_metadata(description: &str, keywords: &BTreeSet<String>) -> String {
    if keywords.is_empty() {
        description.to_string()
    } else {
        let triggers = keywords.iter().cloned().collect::<Vec<_>>().join(", ");
        format!("{description}\nTriggers: {triggers}")
    }
}

/// Assemble tiers, applying declared costs or estimating them.
///
/// Empty instructions/resources tiers are dropped. Estimated costs are raised
/// to the previous tier's cost so the sequence never decreases; declared costs
/// that decrease are rejected.
fn build_tiers(
    metadata: String,
    instructions: String,
    resources: String,
    declared: &TokenCosts,
) -> Result<Vec<Tier>, SchemaErrorKind> {
    let candidates = [
        (TIER_METADATA, metadata, declared.metadata),
        (TIER_INSTRUCTIONS, instructions, declared.instructions),
        (TIER_RESOURCES, resources, declared.resources),
    ];

    for (name, _, cost) in &candidates {
        if let Some(c) = cost.filter(|c| *c < 0) {
            return Err(SchemaErrorKind::NegativeCost {
                tier: (*name).to_string(),
                cost: c,
            });
        }
    }

    let mut tiers: Vec<Tier> = Vec::with_capacity(candidates.len());
    let mut previous = 0u64;
    for (position, (name, content, cost)) in candidates.into_iter().enumerate() {
        if position > 0 && content.is_empty() {
            continue;
        }
        let tokens = match cost.and_then(|c| u64::try_from(c).ok()) {
            Some(c) if c < previous => {
                return Err(SchemaErrorKind::NonMonotonicTiers {
                    tier: name.to_string(),
                    cost: c,
                    previous,
                });
            }
            Some(c) => c,
            None => estimate_tokens(&content).max(previous),
        };
        previous = tokens;
        tiers.push(Tier {
            name: name.to_string(),
            tokens,
            content,
        });
    }
    Ok(tiers)
}

fn list(value: Option<&StringList>) -> Vec<String> {
    value.map(StringList::to_vec).unwrap_or_default()
}

fn required_text(value: Option<&str>, field: &'static str) -> Result<String, SchemaErrorKind> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .ok_or(SchemaErrorKind::MissingField(field))
}

fn normalize_namespace(namespace: &str) -> String {
    namespace.trim().to_lowercase().replace(' ', "-")
}

/// Qualify a bare name with its namespace (`plugin:name`).
fn qualify(name: &str, namespace: Option<&str>) -> SkillId {
    match namespace {
        Some(ns) if !name.contains(':') && !ns.is_empty() => SkillId::new(format!("{ns}:{name}")),
        _ => SkillId::new(name),
    }
}

fn validate_id(id: &SkillId) -> Result<(), SchemaErrorKind> {
    let s = id.as_str();
    let valid_chars = s.chars().all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.' | '/' | ':')
    });
    if s.is_empty()
        || s.len() > MAX_ID_LEN
        || !valid_chars
        || s.starts_with(':')
        || s.ends_with(':')
    {
        return Err(SchemaErrorKind::InvalidId(s.to_string()));
    }
    Ok(())
}

/// `MAJOR.MINOR.PATCH` with optional `-prerelease` and `+build` suffixes.
pub fn is_valid_version(version: &str) -> bool {
    let (rest, build) = match version.split_once('+') {
        Some((rest, build)) => (rest, Some(build)),
        None => (version, None),
    };
    let (core, pre) = match rest.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (rest, None),
    };

    let parts: Vec<&str> = core.split('.').collect();
    let core_ok = parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));

    let label_ok = |label: Option<&str>| {
        label.is_none_or(|l| {
            !l.is_empty()
                && l.split('.').all(|part| {
                    !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                })
        })
    };

    core_ok && label_ok(pre) && label_ok(build)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
