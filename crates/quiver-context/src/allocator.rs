//! Token budget allocator.
//!
//! Greedy, best-first admission against a hard token ceiling:
//!
//! 1. **Metadata phase.** Each ranked candidate forms an admission unit with
//!    its not-yet-admitted required closure; optional companions of admitted
//!    skills follow as units of their own. Units are admitted whole (summed
//!    tier-0 cost) in order. After the first unit that does not fit, only
//!    zero-cost units are admitted.
//! 2. **Escalation passes.** For tier 1, then tier 2, every admitted skill is
//!    offered its next tier in admission order. A skill whose next tier does
//!    not fit stays where it is and the pass continues with the next skill.
//!    A companion is never escalated past its anchor.
//!
//! Every member of a unit must accept the active mode. A candidate whose
//! required closure reaches a skill outside the mode is omitted whole with
//! [`OmissionReason::DependencyModeExcluded`]; such companions are skipped.
//! Candidates ranked past the matcher's cut-off are recorded by
//! [`omit_cut_off`].
//!
//! The prefix rule in the metadata phase keeps the admitted set monotone in
//! the budget, and the total admitted tokens are monotone as well.

use std::collections::HashMap;

use quiver_core::SkillId;
use quiver_settings::AllocatorSettings;
use quiver_skills::{DependencyGraph, SkillIndex, SkillRecord};
use tracing::debug;

use crate::types::{Admission, AdmittedSkill, AssemblyResult, Omission, OmissionReason, ScoredCandidate};

/// Admit skills and tiers for `candidates` within `budget`.
///
/// The returned result has an empty fingerprint; the pipeline fills it in.
#[must_use]
pub fn allocate(
    candidates: &[ScoredCandidate],
    graph: &DependencyGraph,
    index: &SkillIndex,
    budget: u64,
    mode: Option<&str>,
    settings: &AllocatorSettings,
) -> AssemblyResult {
    let mut alloc = Allocator {
        index,
        graph,
        slots: Vec::new(),
        positions: HashMap::new(),
        omitted: Vec::new(),
        remaining: budget,
        blocked: false,
        mode,
    };

    let mut first_unit = true;
    for (rank, candidate) in candidates.iter().enumerate() {
        let admission = Admission::Matched {
            rank,
            score: candidate.score,
        };
        let members = match alloc.unit(&candidate.id, admission) {
            Ok(members) if members.is_empty() => continue,
            Ok(members) => members,
            Err(dependency) => {
                debug!(id = %candidate.id, %dependency, "Required dependency outside the active mode");
                alloc.omitted.push(Omission {
                    id: candidate.id.clone(),
                    reason: OmissionReason::DependencyModeExcluded { dependency },
                });
                continue;
            }
        };

        if std::mem::take(&mut first_unit) {
            let needed = unit_cost(&members);
            if needed > budget {
                debug!(id = %candidate.id, needed, budget, "Budget insufficient for top-ranked metadata");
                return AssemblyResult {
                    budget,
                    omitted: vec![Omission {
                        id: candidate.id.clone(),
                        reason: OmissionReason::MetadataBudgetInsufficient { needed, budget },
                    }],
                    generation: index.generation(),
                    ..AssemblyResult::default()
                };
            }
        }

        let _ = alloc.try_admit(members, None);
    }

    if settings.include_optional {
        let anchors = alloc.slots.len();
        for anchor_pos in 0..anchors {
            let anchor = alloc.slots[anchor_pos].record.id.clone();
            for companion in graph.optional(&anchor) {
                let admission = Admission::CompanionOf {
                    anchor: anchor.clone(),
                };
                match alloc.unit(companion, admission) {
                    Ok(members) if !members.is_empty() => {
                        let _ = alloc.try_admit(members, Some(anchor_pos));
                    }
                    Ok(_) => {}
                    Err(dependency) => {
                        debug!(id = %companion, %dependency, "Companion dependency outside the active mode");
                    }
                }
            }
        }
    }

    alloc.escalate();
    alloc.finish(budget)
}

/// Record candidates ranked past the matcher's cut-off as omissions.
///
/// `first_rank` is the rank of `cut_off[0]`. Skills that were admitted
/// anyway, as a dependency or companion, are skipped. A result that failed
/// for lack of budget keeps its single omission.
pub fn omit_cut_off(result: &mut AssemblyResult, cut_off: &[ScoredCandidate], first_rank: usize) {
    let budget_failed = result.is_empty()
        && result
            .omitted
            .iter()
            .any(|o| matches!(o.reason, OmissionReason::MetadataBudgetInsufficient { .. }));
    if budget_failed || cut_off.is_empty() {
        return;
    }

    debug!(count = cut_off.len(), first_rank, "Candidates below the cut-off");
    for (offset, candidate) in cut_off.iter().enumerate() {
        if result.contains(candidate.id.as_str()) || result.omitted.iter().any(|o| o.id == candidate.id) {
            continue;
        }
        result.omitted.push(Omission {
            id: candidate.id.clone(),
            reason: OmissionReason::BelowCandidateCutoff {
                rank: first_rank + offset,
            },
        });
    }
}

struct Slot<'a> {
    record: &'a SkillRecord,
    admission: Admission,
    tier: usize,
    tokens: u64,
    /// Slot of the anchor for optional companions.
    anchor: Option<usize>,
}

struct Allocator<'a> {
    index: &'a SkillIndex,
    graph: &'a DependencyGraph,
    slots: Vec<Slot<'a>>,
    positions: HashMap<SkillId, usize>,
    omitted: Vec<Omission>,
    remaining: u64,
    blocked: bool,
    mode: Option<&'a str>,
}

type Member<'a> = (&'a SkillRecord, Admission);

fn unit_cost(members: &[Member<'_>]) -> u64 {
    members
        .iter()
        .fold(0u64, |sum, (r, _)| sum.saturating_add(r.metadata_cost()))
}

impl<'a> Allocator<'a> {
    /// `lead` plus its required closure, minus anything already admitted.
    ///
    /// Empty when there is nothing to admit. Fails with the first closure
    /// member that does not accept the active mode.
    fn unit(&self, lead: &SkillId, admission: Admission) -> Result<Vec<Member<'a>>, SkillId> {
        if self.positions.contains_key(lead) {
            return Ok(Vec::new());
        }
        let Some(record) = self.index.get(lead) else {
            return Ok(Vec::new());
        };
        if !record.accepts_mode(self.mode) {
            return Ok(Vec::new());
        }

        let mut members: Vec<Member<'a>> = vec![(record, admission)];
        for dep in self.graph.required_closure(lead) {
            let Some(dep_record) = self.index.get(&dep) else {
                continue;
            };
            if !dep_record.accepts_mode(self.mode) {
                return Err(dep);
            }
            if self.positions.contains_key(&dep) || members.iter().any(|(r, _)| r.id == dep) {
                continue;
            }
            let dependent = members
                .iter()
                .map(|(r, _)| &r.id)
                .find(|m| self.graph.required(m).contains(&dep))
                .cloned()
                .unwrap_or_else(|| lead.clone());
            members.push((dep_record, Admission::RequiredBy { dependent }));
        }
        Ok(members)
    }

    /// Admit `members` at tier 0 if the unit fits under the prefix rule.
    fn try_admit(&mut self, members: Vec<Member<'a>>, anchor: Option<usize>) -> bool {
        let needed = unit_cost(&members);
        let fits = needed == 0 || (!self.blocked && needed <= self.remaining);
        let lead = members[0].0.id.clone();

        if !fits {
            self.blocked = true;
            debug!(id = %lead, needed, remaining = self.remaining, "Metadata does not fit");
            if !self.omitted.iter().any(|o| o.id == lead) {
                self.omitted.push(Omission {
                    id: lead,
                    reason: OmissionReason::MetadataDoesNotFit {
                        needed,
                        remaining: self.remaining,
                    },
                });
            }
            return false;
        }

        self.remaining -= needed;
        for (i, (record, admission)) in members.into_iter().enumerate() {
            debug!(id = %record.id, ?admission, tokens = record.metadata_cost(), "Admitted metadata");
            let _ = self.positions.insert(record.id.clone(), self.slots.len());
            self.slots.push(Slot {
                record,
                admission,
                tier: 0,
                tokens: record.metadata_cost(),
                anchor: if i == 0 { anchor } else { None },
            });
        }
        true
    }

    /// One pass per tier depth, skipping skills whose next tier does not fit.
    fn escalate(&mut self) {
        let deepest = self.slots.iter().map(|s| s.record.max_tier()).max().unwrap_or(0);
        for tier in 1..=deepest {
            for i in 0..self.slots.len() {
                let slot = &self.slots[i];
                if slot.tier + 1 != tier {
                    continue;
                }
                if slot.anchor.is_some_and(|a| self.slots[a].tier < tier) {
                    continue;
                }
                let Some(cost) = slot.record.tier_cost(tier) else {
                    continue;
                };
                if cost <= self.remaining {
                    self.remaining -= cost;
                    let slot = &mut self.slots[i];
                    slot.tier = tier;
                    slot.tokens = slot.tokens.saturating_add(cost);
                }
            }
        }
    }

    fn finish(self, budget: u64) -> AssemblyResult {
        let positions = self.positions;
        let mut omitted = self.omitted;
        omitted.retain(|o| !positions.contains_key(&o.id));

        let admitted: Vec<AdmittedSkill> = self
            .slots
            .into_iter()
            .map(|slot| AdmittedSkill {
                id: slot.record.id.clone(),
                tier: slot.tier,
                tier_name: slot
                    .record
                    .tiers
                    .get(slot.tier)
                    .map_or_else(|| quiver_core::tier_name(slot.tier), |t| t.name.clone()),
                tokens: slot.tokens,
                max_tier: slot.record.max_tier(),
                admission: slot.admission,
            })
            .collect();
        let total_tokens = admitted.iter().fold(0u64, |sum, a| sum.saturating_add(a.tokens));

        debug!(
            admitted = admitted.len(),
            omitted = omitted.len(),
            total_tokens,
            budget,
            "Allocation complete"
        );

        AssemblyResult {
            admitted,
            total_tokens,
            budget,
            omitted,
            fingerprint: crate::types::Fingerprint::default(),
            generation: self.index.generation(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use quiver_settings::IndexSettings;
    use quiver_skills::{RawDocument, build_graph};

    /// A skill with declared costs and a body for each tier.
    fn skill(name: &str, costs: (u64, u64, u64), extra_yaml: &str) -> RawDocument {
        let (m, i, r) = costs;
        RawDocument::new(
            format!("{name}/SKILL.md"),
            format!(
                "---\nname: {name}\nversion: 1.0.0\ndescription: The {name} skill\n{extra_yaml}\
                 token_costs:\n  metadata: {m}\n  instructions: {i}\n  resources: {r}\n---\n\
                 Instructions for {name}.\n\n## Resources\n\nReference for {name}.\n"
            ),
        )
    }

    struct Fixture {
        index: SkillIndex,
        graph: DependencyGraph,
    }

    impl Fixture {
        fn new(docs: Vec<RawDocument>) -> Self {
            let index = SkillIndex::build(docs, &IndexSettings::default(), 7).unwrap();
            let graph = build_graph(&index).unwrap();
            Self { index, graph }
        }

        fn run(&self, ranked: &[&str], budget: u64) -> AssemblyResult {
            self.run_with(ranked, budget, &AllocatorSettings::default())
        }

        fn run_with(&self, ranked: &[&str], budget: u64, settings: &AllocatorSettings) -> AssemblyResult {
            let candidates: Vec<ScoredCandidate> = ranked
                .iter()
                .enumerate()
                .map(|(i, id)| ScoredCandidate {
                    id: SkillId::new(*id),
                    score: 1.0 - i as f64 * 0.1,
                    signals: crate::types::Signals::default(),
                    dependency_count: 0,
                })
                .collect();
            allocate(&candidates, &self.graph, &self.index, budget, None, settings)
        }
    }

    fn tiers(result: &AssemblyResult) -> Vec<(&str, usize)> {
        result.admitted.iter().map(|a| (a.id.as_str(), a.tier)).collect()
    }

    #[test]
    fn everything_fits_at_large_budget() {
        let fx = Fixture::new(vec![skill("a", (10, 100, 300), ""), skill("b", (5, 50, 80), "")]);
        let result = fx.run(&["a", "b"], 10_000);
        assert_eq!(tiers(&result), vec![("a", 2), ("b", 2)]);
        assert_eq!(result.total_tokens, 410 + 135);
        assert!(result.omitted.is_empty());
        assert_eq!(result.generation, 7);
        assert!(result.admitted.iter().all(AdmittedSkill::is_fully_loaded));
        assert_eq!(result.admitted[0].tier_name, "resources");
    }

    #[test]
    fn no_candidates_is_empty() {
        let fx = Fixture::new(vec![skill("a", (10, 100, 300), "")]);
        let result = fx.run(&[], 100);
        assert!(result.is_empty());
        assert!(result.omitted.is_empty());
    }

    #[test]
    fn top_metadata_not_fitting_yields_single_omission() {
        let fx = Fixture::new(vec![skill("a", (10, 100, 300), ""), skill("b", (1, 1, 1), "")]);
        let result = fx.run(&["a", "b"], 5);
        assert!(result.is_empty());
        assert_eq!(result.total_tokens, 0);
        assert_eq!(
            result.omitted,
            vec![Omission {
                id: SkillId::new("a"),
                reason: OmissionReason::MetadataBudgetInsufficient { needed: 10, budget: 5 },
            }]
        );
    }

    #[test]
    fn required_closure_is_admitted_with_metadata() {
        let fx = Fixture::new(vec![
            skill("app", (10, 20, 30), "dependencies:\n  required: [core]\n"),
            skill("core", (5, 20, 30), "dependencies:\n  required: [base]\n"),
            skill("base", (5, 20, 30), ""),
        ]);
        let result = fx.run(&["app"], 20);
        assert_eq!(tiers(&result), vec![("app", 0), ("core", 0), ("base", 0)]);
        assert_eq!(
            result.get("core").unwrap().admission,
            Admission::RequiredBy {
                dependent: SkillId::new("app")
            }
        );
        assert_eq!(
            result.get("base").unwrap().admission,
            Admission::RequiredBy {
                dependent: SkillId::new("core")
            }
        );

        // Closure metadata (20) does not fit in 19: nothing is admitted
        let result = fx.run(&["app"], 19);
        assert!(result.is_empty());
        assert_eq!(result.omitted.len(), 1);
    }

    #[test]
    fn escalation_skips_and_continues() {
        let fx = Fixture::new(vec![
            skill("big", (10, 500, 900), ""),
            skill("small", (10, 30, 40), ""),
            skill("tiny", (10, 20, 1000), ""),
        ]);
        let result = fx.run(&["big", "small", "tiny"], 100);
        // 30 metadata, then big's 500 is skipped, small +30, tiny +20
        assert_eq!(tiers(&result), vec![("big", 0), ("small", 1), ("tiny", 1)]);
        assert_eq!(result.total_tokens, 80);
        assert!(result.total_tokens <= result.budget);
    }

    #[test]
    fn metadata_prefix_rule() {
        let fx = Fixture::new(vec![
            skill("a", (10, 10, 10), ""),
            skill("b", (50, 50, 50), ""),
            skill("c", (5, 5, 5), ""),
            skill("free", (0, 0, 0), ""),
        ]);
        let result = fx.run(&["a", "b", "c", "free"], 30);
        let ids: Vec<&str> = result.admitted.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "free"]);
        let omitted: Vec<&str> = result.omitted.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(omitted, vec!["b", "c"]);
        assert_eq!(
            result.omitted[0].reason,
            OmissionReason::MetadataDoesNotFit { needed: 50, remaining: 20 }
        );
    }

    #[test]
    fn companion_escalates_only_behind_anchor() {
        let fx = Fixture::new(vec![
            skill("anchor", (10, 100, 100), "dependencies:\n  optional: [buddy]\n"),
            skill("buddy", (10, 10, 10), ""),
        ]);

        // Anchor's instructions do not fit, so the companion stays at tier 0
        let result = fx.run(&["anchor"], 60);
        assert_eq!(tiers(&result), vec![("anchor", 0), ("buddy", 0)]);
        assert_eq!(
            result.get("buddy").unwrap().admission,
            Admission::CompanionOf {
                anchor: SkillId::new("anchor")
            }
        );

        // Anchor reaches tier 1 but not tier 2
        let result = fx.run(&["anchor"], 140);
        assert_eq!(tiers(&result), vec![("anchor", 1), ("buddy", 1)]);
    }

    #[test]
    fn companions_respect_mode() {
        let fx = Fixture::new(vec![
            skill("anchor", (10, 10, 10), "dependencies:\n  optional: [ui-buddy]\n"),
            skill("ui-buddy", (10, 10, 10), "modes: [frontend_ui]\n"),
        ]);
        let candidates = vec![ScoredCandidate {
            id: SkillId::new("anchor"),
            score: 1.0,
            signals: crate::types::Signals::default(),
            dependency_count: 1,
        }];
        let settings = AllocatorSettings::default();

        let result = allocate(&candidates, &fx.graph, &fx.index, 1_000, None, &settings);
        assert_eq!(tiers(&result), vec![("anchor", 2)]);

        let result = allocate(&candidates, &fx.graph, &fx.index, 1_000, Some("frontend_ui"), &settings);
        assert_eq!(tiers(&result), vec![("anchor", 2), ("ui-buddy", 2)]);
    }

    #[test]
    fn optional_companions_can_be_disabled() {
        let fx = Fixture::new(vec![
            skill("anchor", (10, 10, 10), "dependencies:\n  optional: [buddy]\n"),
            skill("buddy", (10, 10, 10), ""),
        ]);
        let settings = AllocatorSettings {
            include_optional: false,
        };
        let result = fx.run_with(&["anchor"], 1_000, &settings);
        assert_eq!(tiers(&result), vec![("anchor", 2)]);
    }

    #[test]
    fn candidate_already_admitted_as_dependency_is_not_duplicated() {
        let fx = Fixture::new(vec![
            skill("app", (10, 10, 10), "dependencies:\n  required: [core]\n"),
            skill("core", (10, 10, 10), ""),
        ]);
        let result = fx.run(&["app", "core"], 1_000);
        assert_eq!(tiers(&result), vec![("app", 2), ("core", 2)]);
        assert!(matches!(
            result.get("core").unwrap().admission,
            Admission::RequiredBy { .. }
        ));
    }

    fn candidate(id: &str, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            id: SkillId::new(id),
            score,
            signals: crate::types::Signals::default(),
            dependency_count: 0,
        }
    }

    #[test]
    fn dependency_outside_mode_blocks_its_dependent() {
        let fx = Fixture::new(vec![
            skill("api-client", (10, 10, 10), "dependencies:\n  required: [backend-tests]\n"),
            skill("backend-tests", (10, 10, 10), "modes: [testing_backend]\n"),
            skill("styles", (10, 10, 10), ""),
        ]);
        let candidates = vec![candidate("api-client", 0.9), candidate("styles", 0.5)];
        let settings = AllocatorSettings::default();

        let result = allocate(&candidates, &fx.graph, &fx.index, 10_000, Some("frontend_ui"), &settings);
        assert_eq!(tiers(&result), vec![("styles", 2)]);
        assert_eq!(
            result.omitted,
            vec![Omission {
                id: SkillId::new("api-client"),
                reason: OmissionReason::DependencyModeExcluded {
                    dependency: SkillId::new("backend-tests")
                },
            }]
        );

        let result = allocate(&candidates, &fx.graph, &fx.index, 10_000, Some("testing_backend"), &settings);
        assert_eq!(tiers(&result), vec![("api-client", 2), ("backend-tests", 2), ("styles", 2)]);
        assert!(result.omitted.is_empty());
    }

    #[test]
    fn excluded_candidate_does_not_count_as_top_ranked() {
        let fx = Fixture::new(vec![
            skill("api-client", (1, 1, 1), "dependencies:\n  required: [backend-tests]\n"),
            skill("backend-tests", (1, 1, 1), "modes: [testing_backend]\n"),
            skill("styles", (50, 50, 50), ""),
        ]);
        let candidates = vec![candidate("api-client", 0.9), candidate("styles", 0.5)];
        let result = allocate(
            &candidates,
            &fx.graph,
            &fx.index,
            20,
            Some("frontend_ui"),
            &AllocatorSettings::default(),
        );
        assert!(result.is_empty());
        assert_eq!(
            result.omitted,
            vec![Omission {
                id: SkillId::new("styles"),
                reason: OmissionReason::MetadataBudgetInsufficient { needed: 50, budget: 20 },
            }]
        );
    }

    #[test]
    fn companion_with_dependency_outside_mode_is_skipped() {
        let fx = Fixture::new(vec![
            skill("anchor", (10, 10, 10), "dependencies:\n  optional: [buddy]\n"),
            skill("buddy", (10, 10, 10), "dependencies:\n  required: [backend-tests]\n"),
            skill("backend-tests", (10, 10, 10), "modes: [testing_backend]\n"),
        ]);
        let candidates = vec![candidate("anchor", 1.0)];
        let result = allocate(
            &candidates,
            &fx.graph,
            &fx.index,
            1_000,
            Some("frontend_ui"),
            &AllocatorSettings::default(),
        );
        assert_eq!(tiers(&result), vec![("anchor", 2)]);
        assert!(result.omitted.is_empty());
    }

    #[test]
    fn cut_off_candidates_are_reported() {
        let fx = Fixture::new(vec![
            skill("app", (10, 10, 10), "dependencies:\n  required: [core]\n"),
            skill("core", (10, 10, 10), ""),
            skill("extra", (10, 10, 10), ""),
        ]);
        let mut result = fx.run(&["app"], 1_000);
        let cut_off = vec![candidate("core", 0.4), candidate("extra", 0.3)];
        omit_cut_off(&mut result, &cut_off, 1);

        // core was admitted as a dependency, so only extra is reported
        assert_eq!(
            result.omitted,
            vec![Omission {
                id: SkillId::new("extra"),
                reason: OmissionReason::BelowCandidateCutoff { rank: 2 },
            }]
        );
    }

    #[test]
    fn cut_off_keeps_single_budget_omission() {
        let fx = Fixture::new(vec![skill("a", (10, 10, 10), ""), skill("b", (1, 1, 1), "")]);
        let mut result = fx.run(&["a"], 5);
        omit_cut_off(&mut result, &[candidate("b", 0.1)], 1);
        assert_eq!(result.omitted.len(), 1);
        assert!(matches!(
            result.omitted[0].reason,
            OmissionReason::MetadataBudgetInsufficient { .. }
        ));
    }

    #[test]
    fn huge_declared_costs_saturate() {
        let max = i64::MAX.unsigned_abs();
        let fx = Fixture::new(vec![
            skill("app", (max, max, max), "dependencies:\n  required: [core]\n"),
            skill("core", (max, max, max), "dependencies:\n  required: [base]\n"),
            skill("base", (max, max, max), ""),
        ]);
        let result = fx.run(&["app"], u64::MAX);
        assert_eq!(tiers(&result), vec![("app", 0), ("core", 0), ("base", 0)]);
        assert_eq!(result.total_tokens, u64::MAX);

        let result = fx.run(&["app"], 1_000);
        assert!(result.is_empty());
        assert_eq!(
            result.omitted[0].reason,
            OmissionReason::MetadataBudgetInsufficient {
                needed: u64::MAX,
                budget: 1_000
            }
        );
    }
}
