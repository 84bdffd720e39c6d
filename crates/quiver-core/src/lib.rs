//! # quiver-core
//!
//! Foundation types shared by every Quiver crate.
//!
//! - [`ids`]: the [`SkillId`] newtype used as the key of every index and graph
//! - [`tokens`]: byte-based token estimation for undeclared tier costs
//! - [`logging`]: `tracing` subscriber setup for hosts and tests
//!
//! ## Crate Position
//!
//! Standalone (no quiver crate dependencies).
//! Depended on by: quiver-skills, quiver-context.

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod tokens;

pub use ids::SkillId;
pub use tokens::{TIER_INSTRUCTIONS, TIER_METADATA, TIER_RESOURCES, estimate_tokens, tier_name};
