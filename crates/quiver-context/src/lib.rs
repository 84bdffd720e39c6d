//! # quiver-context
//!
//! Per-turn skill activation and context assembly.
//!
//! - **Matcher**: scores skills against the turn's text, touched files and mode
//! - **Allocator**: admits skills tier by tier under a token ceiling
//! - **Assembler**: orders admitted skills by dependency depth and serializes them
//! - **Cache**: memoizes results by request fingerprint, cleared on rebuild
//! - **Engine**: publishes immutable generations and serves cached turns
//!
//! ## Crate Position
//!
//! Depends on: quiver-core, quiver-settings, quiver-skills.

#![deny(unsafe_code)]

pub mod allocator;
pub mod assembler;
pub mod cache;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod matcher;
pub mod pipeline;
pub mod types;

pub use allocator::{allocate, omit_cut_off};
pub use assembler::{BundleEntry, SerializedBundle, assemble};
pub use cache::{AssemblyCache, CacheStats};
pub use engine::{Generation, SkillEngine};
pub use errors::{EngineError, Result};
pub use fingerprint::fingerprint;
pub use matcher::{match_skills, split_at_limit};
pub use types::{
    ActivationContext, Admission, AdmittedSkill, AssemblyResult, Fingerprint, Omission,
    OmissionReason, ScoredCandidate, Signals,
};
