//! Keyword normalization shared by the index and the matcher.
//!
//! Both sides must agree exactly on how text becomes tokens, otherwise a
//! keyword indexed as `next.js` would never meet a context token `next.js.`.

/// Words ignored when measuring keyword overlap and when mining descriptions.
pub const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "for", "from", "how",
    "i", "if", "in", "into", "is", "it", "its", "me", "my", "of", "on", "or", "our", "please",
    "should", "so", "that", "the", "their", "then", "this", "to", "up", "use", "using", "we",
    "what", "when", "which", "while", "will", "with", "you", "your",
];

/// Minimum length of a word mined from a description.
const MIN_DESCRIPTION_TERM_LEN: usize = 4;

/// Whether `word` (already lowercase) is a stopword.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Split text into lowercase tokens.
///
/// Letters, digits and `-_+#.` stay inside a token so names like `c++`,
/// `c#`, `node.js` and `react-hook-form` survive. Leading and trailing
/// `.`, `-` and `_` are trimmed (sentence punctuation, list dashes).
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | '+' | '#' | '.')))
        .map(|raw| raw.trim_matches(|c| matches!(c, '.' | '-' | '_')))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Normalize a keyword or trigger phrase: tokens joined by single spaces.
///
/// Returns `None` when nothing tokenizable remains.
pub fn normalize_keyword(keyword: &str) -> Option<String> {
    let tokens = tokenize(keyword);
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// Words from a description that are worth indexing as weak keywords.
pub fn description_terms(description: &str) -> Vec<String> {
    let mut terms: Vec<String> = tokenize(description)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_DESCRIPTION_TERM_LEN && !is_stopword(t))
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Normalize a file path for glob matching: forward slashes, no leading `./`.
pub fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
