//! Request fingerprints for the assembly cache.
//!
//! Two contexts share a fingerprint exactly when the matcher cannot tell them
//! apart: same token sequence, same set of touched paths, same mode, same
//! budget, same generation.

use quiver_skills::text::{normalize_path, tokenize};
use sha2::{Digest, Sha256};

use crate::types::{ActivationContext, Fingerprint};

/// Fingerprint `ctx` against index generation `generation`.
#[must_use]
pub fn fingerprint(ctx: &ActivationContext, generation: u64) -> Fingerprint {
    let mut hasher = Sha256::new();

    let tokens = tokenize(&ctx.text);
    update_list(&mut hasher, &tokens);

    let mut paths: Vec<String> = ctx
        .touched_files
        .iter()
        .map(|p| normalize_path(p))
        .filter(|p| !p.is_empty())
        .collect();
    paths.sort();
    paths.dedup();
    update_list(&mut hasher, &paths);

    match normalize_mode(ctx.mode.as_deref()) {
        Some(mode) => {
            hasher.update([1u8]);
            update_field(&mut hasher, mode.as_bytes());
        }
        None => hasher.update([0u8]),
    }

    hasher.update(ctx.budget.to_le_bytes());
    hasher.update(generation.to_le_bytes());

    Fingerprint::new(format!("{:x}", hasher.finalize()))
}

/// Lowercased, trimmed mode; empty counts as no mode.
pub(crate) fn normalize_mode(mode: Option<&str>) -> Option<String> {
    mode.map(|m| m.trim().to_lowercase()).filter(|m| !m.is_empty())
}

// Length-prefixed so adjacent fields cannot run into each other
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update(u64::try_from(bytes.len()).unwrap_or(u64::MAX).to_le_bytes());
    hasher.update(bytes);
}

fn update_list(hasher: &mut Sha256, items: &[String]) {
    hasher.update(u64::try_from(items.len()).unwrap_or(u64::MAX).to_le_bytes());
    for item in items {
        update_field(hasher, item.as_bytes());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
