//! Activation matcher.
//!
//! Scores every skill that the context touches through a keyword, a
//! description term, or a file pattern, after filtering by mode:
//!
//! ```text
//! score = keyword_weight * keyword + mode_weight * mode + file_pattern_weight * file
//! ```
//!
//! Ranking is descending by score, then by fewer declared dependencies, then
//! by id, so identical contexts always rank identically. The full ranking is
//! returned; [`split_at_limit`] applies `max_candidates`.

use std::collections::BTreeSet;

use quiver_core::SkillId;
use quiver_settings::MatcherSettings;
use quiver_skills::{SkillIndex, SkillRecord};
use quiver_skills::text::{is_stopword, tokenize};
use tracing::{debug, trace};

use crate::fingerprint::normalize_mode;
use crate::types::{ActivationContext, ScoredCandidate, Signals};

/// Rank candidate skills for `ctx`. Never fails; no match is an empty list.
#[must_use]
pub fn match_skills(
    ctx: &ActivationContext,
    index: &SkillIndex,
    settings: &MatcherSettings,
) -> Vec<ScoredCandidate> {
    let tokens = tokenize(&ctx.text);
    let mode = normalize_mode(ctx.mode.as_deref());
    let eligible = index.lookup_by_mode(mode.as_deref());
    if eligible.is_empty() {
        return Vec::new();
    }

    let mut file_hits: BTreeSet<&SkillId> = BTreeSet::new();
    for path in &ctx.touched_files {
        file_hits.extend(index.lookup_by_file_pattern(path));
    }

    let mut touched: BTreeSet<&SkillId> = file_hits.clone();
    for token in tokens.iter().filter(|t| !is_stopword(t)) {
        touched.extend(index.lookup_by_keyword(token));
        touched.extend(index.lookup_by_description_term(token));
    }
    for n in 2..=index.max_phrase_words().min(tokens.len()) {
        for window in tokens.windows(n) {
            touched.extend(index.lookup_by_keyword(&window.join(" ")));
        }
    }

    let mut candidates: Vec<ScoredCandidate> = touched
        .into_iter()
        .filter(|id| eligible.contains(id))
        .filter_map(|id| index.get(id))
        .filter_map(|record| {
            let signals = Signals {
                keyword: keyword_signal(&tokens, record, settings.description_term_credit),
                mode: if record.accepts_mode(mode.as_deref()) { 1.0 } else { 0.0 },
                file: if file_hits.contains(&record.id) { 1.0 } else { 0.0 },
            };
            if signals.keyword <= 0.0 && signals.file <= 0.0 {
                return None;
            }
            let score = settings.keyword_weight * signals.keyword
                + settings.mode_weight * signals.mode
                + settings.file_pattern_weight * signals.file;
            trace!(
                id = %record.id,
                score,
                keyword = signals.keyword,
                mode = signals.mode,
                file = signals.file,
                "Scored skill"
            );
            Some(ScoredCandidate {
                id: record.id.clone(),
                score,
                signals,
                dependency_count: record.dependencies.len(),
            })
        })
        .filter(|c| c.score >= settings.min_score)
        .collect();

    rank(&mut candidates);

    debug!(
        tokens = tokens.len(),
        files = ctx.touched_files.len(),
        eligible = eligible.len(),
        candidates = candidates.len(),
        "Matched skills"
    );
    candidates
}

/// Split off the candidates ranked past `max_candidates`.
pub fn split_at_limit(candidates: &mut Vec<ScoredCandidate>, max_candidates: usize) -> Vec<ScoredCandidate> {
    if candidates.len() <= max_candidates {
        return Vec::new();
    }
    candidates.split_off(max_candidates)
}

/// Sort by score descending, then fewer dependencies, then id.
pub fn rank(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.dependency_count.cmp(&b.dependency_count))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Fraction of the context's content tokens covered by the skill's keywords.
///
/// Multi-word keyword phrases are matched first, longest first; each match
/// counts as one full unit and consumes its tokens. Remaining non-stopword
/// tokens earn 1.0 for a keyword word, `description_credit` for a
/// description term, and 0 otherwise.
fn keyword_signal(tokens: &[String], record: &SkillRecord, description_credit: f64) -> f64 {
    let mut consumed = vec![false; tokens.len()];
    let mut phrase_units = 0usize;

    let mut phrases: Vec<Vec<&str>> = record
        .keywords
        .iter()
        .filter(|k| k.contains(' '))
        .map(|k| k.split(' ').collect())
        .collect();
    phrases.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    for phrase in &phrases {
        let n = phrase.len();
        let mut i = 0;
        while i + n <= tokens.len() {
            let hit = (0..n).all(|j| !consumed[i + j] && tokens[i + j] == phrase[j]);
            if hit {
                consumed[i..i + n].iter_mut().for_each(|c| *c = true);
                phrase_units += 1;
                i += n;
            } else {
                i += 1;
            }
        }
    }

    let mut credit = 0.0;
    let mut content_tokens = 0usize;
    for (token, _) in tokens.iter().zip(&consumed).filter(|(_, c)| !**c) {
        if is_stopword(token) {
            continue;
        }
        content_tokens += 1;
        if record.keyword_words.contains(token) {
            credit += 1.0;
        } else if record.description_terms.contains(token) {
            credit += description_credit;
        }
    }

    let units = phrase_units + content_tokens;
    if units == 0 {
        return 0.0;
    }
    (phrase_units as f64 + credit) / units as f64
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
