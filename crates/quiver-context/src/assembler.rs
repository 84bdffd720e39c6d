//! Context assembler.
//!
//! Orders admitted skills so that every required dependency precedes its
//! dependents (dependency depth first, then admission order) and serializes
//! them into a `<skills>` block. Each skill's content sits under a delimiter
//! carrying its id and version so the consumer can attribute it.

use std::collections::BTreeSet;
use std::fmt::Write;

use quiver_core::SkillId;
use quiver_skills::{DependencyGraph, SkillIndex};
use serde::Serialize;

use crate::types::{AssemblyResult, Fingerprint, Omission};

/// One serialized skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleEntry {
    /// Skill id.
    pub id: SkillId,
    /// Skill version.
    pub version: String,
    /// Deepest admitted tier.
    pub tier: usize,
    /// Name of `tier`.
    pub tier_name: String,
    /// Tokens of tiers `0..=tier`.
    pub tokens: u64,
    /// Informational group tag.
    pub group: Option<String>,
}

/// The injected context for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SerializedBundle {
    /// The `<skills>` block, or empty when nothing was considered.
    pub text: String,
    /// Entries in serialization order.
    pub entries: Vec<BundleEntry>,
    /// Skills considered but left out.
    pub omitted: Vec<Omission>,
    /// Tokens admitted.
    pub total_tokens: u64,
    /// Budget for the turn.
    pub budget: u64,
    /// Index generation.
    pub generation: u64,
    /// Fingerprint of the inputs.
    pub fingerprint: Fingerprint,
}

impl SerializedBundle {
    /// Whether there is no text to inject.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Serialize `result` against the index and graph it was computed from.
#[must_use]
pub fn assemble(result: &AssemblyResult, index: &SkillIndex, graph: &DependencyGraph) -> SerializedBundle {
    let members: BTreeSet<SkillId> = result.admitted.iter().map(|a| a.id.clone()).collect();
    let depths = graph.depths(&members);

    let mut order: Vec<usize> = (0..result.admitted.len()).collect();
    order.sort_by_key(|&i| (depths.get(&result.admitted[i].id).copied().unwrap_or(0), i));

    let mut entries = Vec::with_capacity(order.len());
    let mut text = String::new();

    if !result.admitted.is_empty() || !result.omitted.is_empty() {
        let _ = writeln!(
            text,
            "<skills generation=\"{}\" tokens=\"{}\" budget=\"{}\">",
            result.generation, result.total_tokens, result.budget
        );

        for i in order {
            let admitted = &result.admitted[i];
            let Some(record) = index.get(&admitted.id) else {
                continue;
            };

            let _ = write!(
                text,
                "<skill id=\"{}\" version=\"{}\" tier=\"{}\"",
                escape_xml(&admitted.id),
                escape_xml(&record.version),
                escape_xml(&admitted.tier_name)
            );
            if let Some(group) = &record.group {
                let _ = write!(text, " group=\"{}\"", escape_xml(group));
            }
            text.push_str(">\n");
            text.push_str(&record.content_through(admitted.tier));
            text.push_str("\n</skill>\n");

            entries.push(BundleEntry {
                id: admitted.id.clone(),
                version: record.version.clone(),
                tier: admitted.tier,
                tier_name: admitted.tier_name.clone(),
                tokens: admitted.tokens,
                group: record.group.clone(),
            });
        }

        for omission in &result.omitted {
            let _ = writeln!(
                text,
                "<omitted id=\"{}\" reason=\"{}\"/>",
                escape_xml(&omission.id),
                escape_xml(&omission.reason.to_string())
            );
        }

        text.push_str("</skills>");
    }

    SerializedBundle {
        text,
        entries,
        omitted: result.omitted.clone(),
        total_tokens: result.total_tokens,
        budget: result.budget,
        generation: result.generation,
        fingerprint: result.fingerprint.clone(),
    }
}

/// Escape XML special characters.
fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
