//! Output file naming from descriptions.

use regex::{Captures, Regex};
use std::sync::OnceLock;

const MAX_SLUG: usize = 120;

/// Lowercase ASCII slug: word characters kept, runs of whitespace and
/// hyphens collapsed to one hyphen, at most 120 characters.
///
/// Non-ASCII characters are dropped rather than transliterated.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_hyphen = true;
        }
    }

    let trimmed = slug.trim_matches(|c| c == '-' || c == '_');
    trimmed.chars().take(MAX_SLUG).collect()
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{(prefix|index|slug|name)(?::0?(\d+)d)?\}").expect("static pattern")
    })
}

/// Render a rename pattern.
///
/// Placeholders: `{prefix}`, `{index}` or `{index:05d}` (zero padded),
/// `{slug}`, `{name}`. Unknown placeholders stay literal. Path separators
/// in the result are replaced so it is always a single file stem.
pub fn render_name(pattern: &str, prefix: &str, index: usize, slug: &str, name: &str) -> String {
    let rendered = placeholder().replace_all(pattern, |caps: &Captures| match &caps[1] {
        "prefix" => prefix.to_string(),
        "slug" => slug.to_string(),
        "name" => name.to_string(),
        _ => {
            let width = caps
                .get(2)
                .and_then(|w| w.as_str().parse::<usize>().ok())
                .unwrap_or(0);
            format!("{:0width$}", index, width = width)
        }
    });
    rendered.replace(['/', '\\'], "_")
}
