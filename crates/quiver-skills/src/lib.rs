//! # quiver-skills
//!
//! Skill documents, the metadata index, and the dependency graph.
//!
//! A skill is a `SKILL.md` file: YAML frontmatter (id, version, keywords,
//! file patterns, modes, dependencies) followed by a markdown body that is
//! split into progressively disclosed tiers.
//!
//! - [`parser`]: frontmatter validation and tier splitting
//! - [`loader`]: filesystem discovery of `SKILL.md` files
//! - [`index`]: immutable per-generation lookup tables
//! - [`graph`]: required/optional dependency edges and cycle rejection
//!
//! ## Crate Position
//!
//! Depends on: quiver-core, quiver-settings.
//! Depended on by: quiver-context.

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod graph;
pub mod index;
pub mod loader;
pub mod parser;
pub mod text;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use errors::{CycleError, IndexError, SchemaError, SchemaErrorKind};
pub use graph::{DependencyGraph, EdgeKind, build_graph};
pub use index::SkillIndex;
pub use loader::{LoadResult, load_documents, load_index};
pub use parser::{ParsedSkill, parse_document};
pub use types::{Dependencies, RawDocument, SkillRecord, Tier};
