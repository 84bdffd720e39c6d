//! Document builders shared by unit tests.

use crate::types::RawDocument;

/// A minimal valid document for `name` with extra frontmatter lines and a body.
pub(crate) fn doc_with(name: &str, extra_yaml: &str, body: &str) -> RawDocument {
    RawDocument::new(
        format!("{name}/SKILL.md"),
        format!("---\nname: {name}\nversion: 1.0.0\ndescription: The {name} skill\n{extra_yaml}---\n{body}"),
    )
}

/// A minimal valid document with no optional fields.
pub(crate) fn doc(name: &str) -> RawDocument {
    doc_with(name, "", "")
}

/// A document requiring `required` skills.
pub(crate) fn doc_requiring(name: &str, required: &[&str]) -> RawDocument {
    doc_with(
        name,
        &format!("dependencies:\n  required: [{}]\n", required.join(", ")),
        "",
    )
}
