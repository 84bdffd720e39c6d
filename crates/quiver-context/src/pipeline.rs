//! Per-turn pipeline: match, allocate, assemble.
//!
//! Pure functions over an immutable [`Generation`]. The engine wraps them
//! with caching; these never touch shared state.

use quiver_settings::QuiverSettings;

use crate::allocator::{allocate, omit_cut_off};
use crate::assembler::{SerializedBundle, assemble};
use crate::engine::Generation;
use crate::fingerprint::{fingerprint, normalize_mode};
use crate::matcher::{match_skills, split_at_limit};
use crate::types::{ActivationContext, AssemblyResult};

/// Match and allocate for `ctx`, producing a fingerprinted result.
#[must_use]
pub fn resolve(generation: &Generation, ctx: &ActivationContext, settings: &QuiverSettings) -> AssemblyResult {
    let mut candidates = match_skills(ctx, &generation.index, &settings.matcher);
    let cut_off = split_at_limit(&mut candidates, settings.matcher.max_candidates);
    let mode = normalize_mode(ctx.mode.as_deref());
    let mut result = allocate(
        &candidates,
        &generation.graph,
        &generation.index,
        ctx.budget,
        mode.as_deref(),
        &settings.allocator,
    );
    omit_cut_off(&mut result, &cut_off, candidates.len());
    result.fingerprint = fingerprint(ctx, generation.number);
    result
}

/// Serialize a result computed against `generation`.
#[must_use]
pub fn render(generation: &Generation, result: &AssemblyResult) -> SerializedBundle {
    assemble(result, &generation.index, &generation.graph)
}

/// Full uncached pipeline for one turn.
#[must_use]
pub fn assemble_context(
    generation: &Generation,
    ctx: &ActivationContext,
    settings: &QuiverSettings,
) -> SerializedBundle {
    render(generation, &resolve(generation, ctx, settings))
}
