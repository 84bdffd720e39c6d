//! Skill engine: generation publishing plus cached per-turn assembly.
//!
//! The current [`Generation`] is an `Arc` behind a lock that is held only
//! long enough to clone or swap the pointer. Turns in flight keep the
//! generation they started with; a rebuild that fails leaves the current
//! generation in place.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use quiver_settings::{IndexSettings, QuiverSettings};
use quiver_skills::{DependencyGraph, RawDocument, SkillIndex, build_graph, load_documents};
use tracing::{debug, error, info};

use crate::assembler::SerializedBundle;
use crate::cache::{AssemblyCache, CacheStats};
use crate::errors::Result;
use crate::fingerprint::fingerprint;
use crate::pipeline;
use crate::types::{ActivationContext, AssemblyResult};

/// An immutable, published skill set.
#[derive(Debug)]
pub struct Generation {
    /// Monotonically increasing generation number.
    pub number: u64,
    /// Metadata index.
    pub index: SkillIndex,
    /// Dependency graph over `index`.
    pub graph: DependencyGraph,
}

impl Generation {
    /// Generation with no skills.
    pub fn empty(number: u64) -> Self {
        Self {
            number,
            index: SkillIndex::empty(number),
            graph: DependencyGraph::default(),
        }
    }

    /// Build a generation from in-memory documents.
    pub fn build(documents: Vec<RawDocument>, settings: &IndexSettings, number: u64) -> Result<Self> {
        Self::build_with_errors(documents, Vec::new(), settings, number)
    }

    /// Build a generation from skill directories.
    pub fn from_dirs(dirs: &[PathBuf], settings: &IndexSettings, number: u64) -> Result<Self> {
        let loaded = load_documents(dirs, settings.max_skill_file_size);
        Self::build_with_errors(loaded.documents, loaded.errors, settings, number)
    }

    fn build_with_errors(
        documents: Vec<RawDocument>,
        errors: Vec<quiver_skills::SchemaError>,
        settings: &IndexSettings,
        number: u64,
    ) -> Result<Self> {
        let index = SkillIndex::build_with_errors(documents, errors, settings, number)?;
        let graph = build_graph(&index).inspect_err(|e| {
            error!(generation = number, error = %e, "Required dependency cycle");
        })?;
        Ok(Self { number, index, graph })
    }
}

/// Host-facing engine.
#[derive(Debug)]
pub struct SkillEngine {
    current: RwLock<Arc<Generation>>,
    cache: AssemblyCache,
    settings: QuiverSettings,
    rebuild_lock: Mutex<()>,
}

impl SkillEngine {
    /// Engine with an empty generation 0.
    pub fn new(settings: QuiverSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(Generation::empty(0))),
            cache: AssemblyCache::new(&settings.cache),
            settings,
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Engine using the process-wide settings, with the tracing subscriber
    /// installed at the configured level.
    pub fn from_global_settings() -> Self {
        let settings = quiver_settings::get_settings().clone();
        quiver_core::logging::init_subscriber(&settings.logging.level);
        Self::new(settings)
    }

    /// Engine loaded from `dirs` as generation 1.
    pub fn from_dirs(dirs: &[PathBuf], settings: QuiverSettings) -> Result<Self> {
        let engine = Self::new(settings);
        let _ = engine.rebuild_from_dirs(dirs)?;
        Ok(engine)
    }

    /// Settings the engine runs with.
    pub fn settings(&self) -> &QuiverSettings {
        &self.settings
    }

    /// Snapshot of the current generation.
    pub fn generation(&self) -> Arc<Generation> {
        Arc::clone(&self.current.read())
    }

    /// Rebuild from in-memory documents and publish. Returns the new number.
    pub fn rebuild(&self, documents: Vec<RawDocument>) -> Result<u64> {
        let _guard = self.rebuild_lock.lock();
        let number = self.generation().number + 1;
        let next = Generation::build(documents, &self.settings.index, number)?;
        Ok(self.publish(next))
    }

    /// Rebuild from skill directories and publish. Returns the new number.
    pub fn rebuild_from_dirs(&self, dirs: &[PathBuf]) -> Result<u64> {
        let _guard = self.rebuild_lock.lock();
        let number = self.generation().number + 1;
        let next = Generation::from_dirs(dirs, &self.settings.index, number)?;
        Ok(self.publish(next))
    }

    fn publish(&self, next: Generation) -> u64 {
        let number = next.number;
        let skills = next.index.len();
        *self.current.write() = Arc::new(next);
        self.cache.invalidate_all();
        info!(generation = number, skills, "Published skill generation");
        number
    }

    /// Allocation result for `ctx`, served from the cache when possible.
    pub fn resolve(&self, ctx: &ActivationContext) -> (Arc<Generation>, Arc<AssemblyResult>) {
        let generation = self.generation();
        let key = fingerprint(ctx, generation.number);

        if let Some(hit) = self.cache.get(&key) {
            debug!(fingerprint = %key, "Assembly cache hit");
            return (generation, hit);
        }
        debug!(fingerprint = %key, "Assembly cache miss");

        let result = Arc::new(pipeline::resolve(&generation, ctx, &self.settings));
        self.cache.put(key, Arc::clone(&result));
        (generation, result)
    }

    /// Serialized context bundle for `ctx`.
    pub fn assemble_context(&self, ctx: &ActivationContext) -> SerializedBundle {
        let (generation, result) = self.resolve(ctx);
        pipeline::render(&generation, &result)
    }

    /// Cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;

    fn doc(name: &str, yaml: &str) -> RawDocument {
        RawDocument::new(
            format!("{name}/SKILL.md"),
            format!("---\nname: {name}\nversion: 1.0.0\ndescription: About {name}\n{yaml}---\nUse {name} well.\n"),
        )
    }

    fn engine() -> SkillEngine {
        SkillEngine::new(QuiverSettings::default())
    }

    #[test]
    fn starts_empty() {
        let engine = engine();
        assert_eq!(engine.generation().number, 0);
        let bundle = engine.assemble_context(&ActivationContext::new("zod", 1000));
        assert!(bundle.is_empty());
    }

    #[test]
    fn global_settings_engine() {
        let engine = SkillEngine::from_global_settings();
        assert_eq!(engine.generation().number, 0);
        assert!(engine.settings().matcher.keyword_weight >= 0.0);
    }

    #[test]
    fn rebuild_publishes_next_generation() {
        let engine = engine();
        assert_eq!(engine.rebuild(vec![doc("zod", "keywords: [zod]\n")]).unwrap(), 1);
        assert_eq!(engine.rebuild(vec![doc("zod", "keywords: [zod]\n")]).unwrap(), 2);
        let bundle = engine.assemble_context(&ActivationContext::new("zod", 1000));
        assert_eq!(bundle.generation, 2);
        assert_eq!(bundle.entries.len(), 1);
    }

    #[test]
    fn failed_rebuild_keeps_previous_generation() {
        let engine = engine();
        let _ = engine.rebuild(vec![doc("zod", "keywords: [zod]\n")]).unwrap();

        let err = engine
            .rebuild(vec![
                doc("a", "dependencies:\n  required: [b]\n"),
                doc("b", "dependencies:\n  required: [a]\n"),
            ])
            .unwrap_err();
        assert!(matches!(err, EngineError::Cycle(_)));

        let err = engine.rebuild(vec![RawDocument::new("bad", "nope")]).unwrap_err();
        assert!(matches!(err, EngineError::Index(_)));

        let current = engine.generation();
        assert_eq!(current.number, 1);
        assert!(current.index.contains("zod"));
    }

    #[test]
    fn repeat_requests_hit_the_cache() {
        let engine = engine();
        let _ = engine.rebuild(vec![doc("zod", "keywords: [zod]\n")]).unwrap();
        let ctx = ActivationContext::new("zod", 1000);

        let first = engine.assemble_context(&ctx);
        let second = engine.assemble_context(&ctx);
        assert_eq!(first, second);
        let stats = engine.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn rebuild_invalidates_cache() {
        let engine = engine();
        let _ = engine.rebuild(vec![doc("zod", "keywords: [zod]\n")]).unwrap();
        let ctx = ActivationContext::new("zod", 1000);
        let _ = engine.assemble_context(&ctx);
        assert_eq!(engine.cache_stats().entries, 1);

        let _ = engine.rebuild(vec![doc("zod", "keywords: [zod]\n")]).unwrap();
        assert_eq!(engine.cache_stats().entries, 0);
        let _ = engine.assemble_context(&ctx);
        assert_eq!(engine.cache_stats().misses, 2);
    }

    #[test]
    fn in_flight_snapshot_survives_rebuild() {
        let engine = engine();
        let _ = engine.rebuild(vec![doc("old", "keywords: [old]\n")]).unwrap();
        let snapshot = engine.generation();
        let _ = engine.rebuild(vec![doc("new", "keywords: [new]\n")]).unwrap();

        assert!(snapshot.index.contains("old"));
        assert!(!engine.generation().index.contains("old"));
    }

    #[test]
    fn loads_from_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("forms/skills/zod");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("SKILL.md"),
            "---\nname: zod\nversion: 1.0.0\ndescription: Zod schemas\nkeywords: [zod]\n---\nBody.\n",
        )
        .unwrap();

        let engine = SkillEngine::from_dirs(&[tmp.path().to_path_buf()], QuiverSettings::default()).unwrap();
        assert_eq!(engine.generation().number, 1);
        let bundle = engine.assemble_context(&ActivationContext::new("zod", 1000));
        assert_eq!(bundle.entries[0].id.as_str(), "forms:zod");
    }
}
