//! Shared constants for skill document handling.

/// Expected filename for skill definitions.
pub const SKILL_MD_FILENAME: &str = "SKILL.md";

/// Directory that holds a plugin's skills (`<plugin>/skills/<skill>/SKILL.md`).
pub const PLUGIN_SKILLS_DIR: &str = "skills";

/// Directories never descended into while scanning.
pub const SKIP_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "__pycache__"];

/// Maximum length of a skill id.
pub const MAX_ID_LEN: usize = 128;

/// Comment marker that starts the resources tier in a skill body.
pub const RESOURCES_MARKER: &str = "tier: resources";

/// Comment marker that may open the instructions tier (optional, stripped).
pub const INSTRUCTIONS_MARKER: &str = "tier: instructions";

/// Heading that starts the resources tier when no marker is used.
pub const RESOURCES_HEADING: &str = "## resources";
