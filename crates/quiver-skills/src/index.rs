//! Immutable skill metadata index.
//!
//! A [`SkillIndex`] is built once per generation from a set of raw documents
//! and never mutated afterwards. Building validates every document, resolves
//! dependency references to ids, and precomputes the lookup tables the
//! matcher needs: keyword, description-term and mode indexes plus a combined
//! glob matcher over all file patterns.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use globset::{GlobSet, GlobSetBuilder};
use quiver_core::SkillId;
use quiver_settings::IndexSettings;
use tracing::{debug, info, warn};

use crate::errors::{IndexError, Result, SchemaError, SchemaErrorKind};
use crate::parser::{ParsedSkill, parse_document};
use crate::text::{is_stopword, normalize_path};
use crate::types::{Dependencies, RawDocument, SkillRecord};

/// Validated skills of one generation plus their lookup tables.
#[derive(Debug, Clone)]
pub struct SkillIndex {
    generation: u64,
    records: BTreeMap<SkillId, SkillRecord>,
    /// Keywords, phrases, and the individual words of phrases.
    keyword_index: HashMap<String, BTreeSet<SkillId>>,
    description_index: HashMap<String, BTreeSet<SkillId>>,
    mode_index: BTreeMap<String, BTreeSet<SkillId>>,
    mode_agnostic: BTreeSet<SkillId>,
    patterns: GlobSet,
    /// Owner of each compiled pattern, by pattern index.
    pattern_owners: Vec<SkillId>,
    max_phrase_words: usize,
    rejected: Vec<SchemaError>,
}

impl SkillIndex {
    /// An index with no skills.
    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            records: BTreeMap::new(),
            keyword_index: HashMap::new(),
            description_index: HashMap::new(),
            mode_index: BTreeMap::new(),
            mode_agnostic: BTreeSet::new(),
            patterns: GlobSet::empty(),
            pattern_owners: Vec::new(),
            max_phrase_words: 1,
            rejected: Vec::new(),
        }
    }

    /// Build an index from in-memory documents.
    pub fn build(documents: Vec<RawDocument>, settings: &IndexSettings, generation: u64) -> Result<Self> {
        Self::build_with_errors(documents, Vec::new(), settings, generation)
    }

    /// Build an index, folding in errors already found while loading.
    ///
    /// In strict mode any error fails the build and every error is returned.
    /// In lenient mode failing documents are excluded, along with documents
    /// whose required dependencies were excluded, and the errors are kept in
    /// [`rejected`](Self::rejected).
    pub fn build_with_errors(
        documents: Vec<RawDocument>,
        mut errors: Vec<SchemaError>,
        settings: &IndexSettings,
        generation: u64,
    ) -> Result<Self> {
        let mut accepted: BTreeMap<SkillId, ParsedSkill> = BTreeMap::new();
        for doc in &documents {
            match parse_document(doc) {
                Ok(parsed) => {
                    let id = parsed.record.id.clone();
                    if let Some(first) = accepted.get(&id) {
                        let first_document = first.record.source.clone();
                        errors.push(SchemaError::new(
                            &doc.source,
                            SchemaErrorKind::DuplicateId { id, first_document },
                        ));
                    } else {
                        let _ = accepted.insert(id, parsed);
                    }
                }
                Err(e) => errors.push(e),
            }
        }

        // Reject unresolvable required dependencies until nothing changes, so
        // a rejection cascades to everything that requires it.
        let mut rejected_ids: BTreeSet<SkillId> = BTreeSet::new();
        loop {
            let failures: Vec<(SkillId, SchemaError)> = accepted
                .values()
                .filter_map(|p| {
                    check_required(p, &accepted, &rejected_ids)
                        .err()
                        .map(|e| (p.record.id.clone(), e))
                })
                .collect();
            if failures.is_empty() {
                break;
            }
            for (id, error) in failures {
                let _ = accepted.remove(&id);
                let _ = rejected_ids.insert(id);
                errors.push(error);
            }
        }

        if !errors.is_empty() {
            if settings.strict {
                return Err(IndexError::Schema(errors));
            }
            for error in &errors {
                warn!(error = %error, "Skill document rejected");
            }
        }

        let resolved: BTreeMap<SkillId, Dependencies> = accepted
            .values()
            .map(|p| (p.record.id.clone(), resolve_dependencies(p, &accepted)))
            .collect();

        let mut index = Self::empty(generation);
        index.rejected = errors;
        let mut builder = GlobSetBuilder::new();

        for (id, parsed) in accepted {
            let ParsedSkill { mut record, globs, .. } = parsed;
            record.dependencies = resolved.get(&id).cloned().unwrap_or_default();
            if has_only_stopword_keywords(&record) {
                warn!(skill = %id, "Every keyword is a stopword; the skill cannot match by keyword");
            }

            for keyword in record.keywords.iter().chain(&record.keyword_words) {
                let words = keyword.split(' ').count();
                index.max_phrase_words = index.max_phrase_words.max(words);
                let _ = index
                    .keyword_index
                    .entry(keyword.clone())
                    .or_default()
                    .insert(id.clone());
            }
            for term in &record.description_terms {
                let _ = index
                    .description_index
                    .entry(term.clone())
                    .or_default()
                    .insert(id.clone());
            }
            if record.is_mode_agnostic() {
                let _ = index.mode_agnostic.insert(id.clone());
            }
            for mode in &record.modes {
                let _ = index.mode_index.entry(mode.clone()).or_default().insert(id.clone());
            }
            for glob in globs {
                let _ = builder.add(glob);
                index.pattern_owners.push(id.clone());
            }

            let _ = index.records.insert(id, record);
        }

        index.patterns = builder.build()?;

        info!(
            generation,
            skills = index.records.len(),
            rejected = index.rejected.len(),
            patterns = index.pattern_owners.len(),
            "Skill index built"
        );
        Ok(index)
    }

    /// Generation number this index was built for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Look up a skill by id.
    pub fn get(&self, id: &str) -> Option<&SkillRecord> {
        self.records.get(id)
    }

    /// Whether a skill with this id is indexed.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// All records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SkillRecord> {
        self.records.values()
    }

    /// All ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &SkillId> {
        self.records.keys()
    }

    /// Number of indexed skills.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no skills.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Documents excluded in lenient mode, with the reason.
    pub fn rejected(&self) -> &[SchemaError] {
        &self.rejected
    }

    /// Longest keyword phrase, in words (at least 1).
    pub fn max_phrase_words(&self) -> usize {
        self.max_phrase_words
    }

    /// Skills with `term` as a keyword, a keyword phrase, or a word of a phrase.
    pub fn lookup_by_keyword(&self, term: &str) -> impl Iterator<Item = &SkillId> {
        self.keyword_index.get(term).into_iter().flatten()
    }

    /// Skills whose description mentions `term`.
    pub fn lookup_by_description_term(&self, term: &str) -> impl Iterator<Item = &SkillId> {
        self.description_index.get(term).into_iter().flatten()
    }

    /// Skills with a file pattern matching `path`.
    pub fn lookup_by_file_pattern(&self, path: &str) -> BTreeSet<&SkillId> {
        let path = normalize_path(path);
        self.patterns
            .matches(path.as_str())
            .into_iter()
            .filter_map(|i| self.pattern_owners.get(i))
            .collect()
    }

    /// Skills eligible under `mode`: mode-agnostic ones plus those declaring it.
    ///
    /// With no active mode only mode-agnostic skills are eligible.
    pub fn lookup_by_mode(&self, mode: Option<&str>) -> BTreeSet<&SkillId> {
        let mut eligible: BTreeSet<&SkillId> = self.mode_agnostic.iter().collect();
        if let Some(ids) = mode.and_then(|m| self.mode_index.get(&m.to_lowercase())) {
            eligible.extend(ids);
        }
        eligible
    }
}

/// Resolve a dependency reference against a set of ids.
///
/// Tries the exact id, then the referring skill's namespace, then a unique id
/// whose local name matches.
/// Whether the record declares keywords but none of them can ever match.
///
/// Single-word keywords that are stopwords are ignored by the matcher;
/// phrases still match as a whole.
fn has_only_stopword_keywords(record: &SkillRecord) -> bool {
    !record.keywords.is_empty()
        && record
            .keywords
            .iter()
            .all(|k| !k.contains(' ') && is_stopword(k))
}

fn resolve_reference<'a>(
    reference: &str,
    namespace: Option<&str>,
    ids: impl Iterator<Item = &'a SkillId> + Clone,
) -> Option<SkillId> {
    let reference = reference.trim().to_lowercase();

    if let Some(id) = ids.clone().find(|id| id.as_str() == reference) {
        return Some(id.clone());
    }
    if reference.contains(':') {
        return None;
    }
    if let Some(ns) = namespace {
        let qualified = format!("{ns}:{reference}");
        if let Some(id) = ids.clone().find(|id| id.as_str() == qualified) {
            return Some(id.clone());
        }
    }

    let mut by_local_name = ids.filter(|id| id.local_name() == reference);
    match (by_local_name.next(), by_local_name.next()) {
        (Some(id), None) => Some(id.clone()),
        _ => None,
    }
}

fn check_required(
    parsed: &ParsedSkill,
    accepted: &BTreeMap<SkillId, ParsedSkill>,
    rejected: &BTreeSet<SkillId>,
) -> std::result::Result<(), SchemaError> {
    let ns = parsed.namespace.as_deref();
    for reference in &parsed.required_refs {
        if resolve_reference(reference, ns, accepted.keys()).is_some() {
            continue;
        }
        let kind = match resolve_reference(reference, ns, rejected.iter()) {
            Some(dependency) => SchemaErrorKind::RejectedDependency { dependency },
            None => SchemaErrorKind::UnknownDependency {
                dependency: reference.clone(),
            },
        };
        return Err(SchemaError::new(&parsed.record.source, kind));
    }
    Ok(())
}

fn resolve_dependencies(parsed: &ParsedSkill, accepted: &BTreeMap<SkillId, ParsedSkill>) -> Dependencies {
    let ns = parsed.namespace.as_deref();
    let own = &parsed.record.id;
    let mut deps = Dependencies::default();

    for reference in &parsed.required_refs {
        if let Some(id) = resolve_reference(reference, ns, accepted.keys()) {
            if !deps.required.contains(&id) {
                deps.required.push(id);
            }
        }
    }

    for reference in &parsed.optional_refs {
        match resolve_reference(reference, ns, accepted.keys()) {
            Some(id) if &id == own => {
                debug!(skill = %own, "Ignoring optional self-reference");
            }
            Some(id) => {
                if !deps.required.contains(&id) && !deps.optional.contains(&id) {
                    deps.optional.push(id);
                }
            }
            None => {
                warn!(skill = %own, dependency = %reference, "Unknown optional dependency dropped");
            }
        }
    }

    deps
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
