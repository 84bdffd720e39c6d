//! Token estimation and tier naming.
//!
//! Skill documents may declare a token cost per disclosure tier. When they do
//! not, the cost is estimated from content length at roughly 4 bytes per token,
//! which is the same heuristic the context budget reports use elsewhere.

/// Name of tier 0: always-resident metadata.
pub const TIER_METADATA: &str = "metadata";

/// Name of tier 1: loaded on admission.
pub const TIER_INSTRUCTIONS: &str = "instructions";

/// Name of tier 2: supporting material, loaded last.
pub const TIER_RESOURCES: &str = "resources";

/// Approximate bytes per token for English prose and code.
const BYTES_PER_TOKEN: u64 = 4;

/// Estimate the token count of `text` (`ceil(bytes / 4)`).
///
/// Empty text costs zero tokens.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(BYTES_PER_TOKEN)
}

/// Canonical name for a tier position.
///
/// Tiers beyond the three standard ones are named `tier-N`.
pub fn tier_name(tier: usize) -> String {
    match tier {
        0 => TIER_METADATA.to_string(),
        1 => TIER_INSTRUCTIONS.to_string(),
        2 => TIER_RESOURCES.to_string(),
        n => format!("tier-{n}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
