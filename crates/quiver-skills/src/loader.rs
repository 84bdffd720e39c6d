//! Filesystem skill scanner.
//!
//! Walks skill roots for `SKILL.md` files and turns them into
//! [`RawDocument`]s. A file at `<plugin>/skills/<skill>/SKILL.md` is loaded
//! under the `plugin` namespace. Paths are visited in sorted order so that
//! duplicate-id resolution does not depend on directory iteration order.

use std::path::{Path, PathBuf};

use quiver_settings::IndexSettings;
use tracing::{debug, warn};

use crate::constants::{PLUGIN_SKILLS_DIR, SKILL_MD_FILENAME, SKIP_DIRS};
use crate::errors::{Result, SchemaError, SchemaErrorKind};
use crate::index::SkillIndex;
use crate::types::RawDocument;

/// Documents read from disk plus files that could not be read.
#[derive(Debug, Default)]
pub struct LoadResult {
    /// Readable documents, in sorted path order.
    pub documents: Vec<RawDocument>,
    /// Files that were found but could not be loaded.
    pub errors: Vec<SchemaError>,
}

/// Load every `SKILL.md` under `dirs`.
///
/// Non-existent roots are skipped with a debug log. Hidden directories and
/// build output directories are not descended into.
pub fn load_documents(dirs: &[PathBuf], max_file_size: u64) -> LoadResult {
    let mut result = LoadResult::default();

    for root in dirs {
        if !root.is_dir() {
            debug!(dir = %root.display(), "Skill root does not exist, skipping");
            continue;
        }

        let mut paths = find_skill_files(root);
        paths.sort();

        for path in paths {
            match load_document(root, &path, max_file_size) {
                Ok(doc) => {
                    debug!(source = %doc.source, namespace = ?doc.namespace, "Loaded skill document");
                    result.documents.push(doc);
                }
                Err(error) => {
                    warn!(error = %error, "Failed to load skill document");
                    result.errors.push(error);
                }
            }
        }
    }

    result
}

/// Load documents from `dirs` and build a [`SkillIndex`] from them.
///
/// Unreadable files count as schema errors: fatal in strict mode, rejected
/// in lenient mode.
pub fn load_index(dirs: &[PathBuf], settings: &IndexSettings, generation: u64) -> Result<SkillIndex> {
    let loaded = load_documents(dirs, settings.max_skill_file_size);
    SkillIndex::build_with_errors(loaded.documents, loaded.errors, settings, generation)
}

fn find_skill_files(root: &Path) -> Vec<PathBuf> {
    let walker = walkdir::WalkDir::new(root).follow_links(true);
    walker
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !SKIP_DIRS.contains(&name.as_ref())
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && e.file_name() == SKILL_MD_FILENAME)
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn load_document(root: &Path, path: &Path, max_file_size: u64) -> std::result::Result<RawDocument, SchemaError> {
    let source = path.to_string_lossy().into_owned();

    let size = std::fs::metadata(path)
        .map_err(|e| SchemaError::new(&source, SchemaErrorKind::Unreadable(e.to_string())))?
        .len();
    if size > max_file_size {
        return Err(SchemaError::new(
            source,
            SchemaErrorKind::FileTooLarge {
                size,
                max: max_file_size,
            },
        ));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| SchemaError::new(&source, SchemaErrorKind::Unreadable(e.to_string())))?;

    let doc = RawDocument::new(source, content);
    Ok(match plugin_namespace(root, path) {
        Some(ns) => doc.with_namespace(ns),
        None => doc,
    })
}

/// Namespace for `<plugin>/skills/<skill>/SKILL.md`, if the path has that shape.
fn plugin_namespace(root: &Path, path: &Path) -> Option<String> {
    let skill_dir = path.parent()?;
    let skills_dir = skill_dir.parent()?;
    if skills_dir.file_name()? != PLUGIN_SKILLS_DIR {
        return None;
    }
    let plugin_dir = skills_dir.parent()?;
    if !plugin_dir.starts_with(root) {
        return None;
    }
    plugin_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(ToString::to_string)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
