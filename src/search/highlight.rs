//! Query-term highlighting for result snippets

use regex::RegexBuilder;

/// Upper bound on highlighted keywords per query.
pub const MAX_KEYWORDS: usize = 10;

const ELLIPSIS: char = '…';

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "how", "in", "is",
    "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when", "where", "which",
    "why", "with",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Keywords worth highlighting: single words and adjacent two-word phrases
/// without stop words, longest first.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut keywords: Vec<String> = Vec::new();
    for word in &words {
        if word.chars().count() > 1 && !is_stop_word(word) {
            keywords.push((*word).to_string());
        }
    }
    for pair in words.windows(2) {
        if !is_stop_word(pair[0]) && !is_stop_word(pair[1]) {
            keywords.push(format!("{} {}", pair[0], pair[1]));
        }
    }

    // Stable sort keeps query order among equal lengths.
    keywords.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));
    let mut seen = std::collections::HashSet::new();
    keywords.retain(|k| seen.insert(k.clone()));
    keywords.truncate(MAX_KEYWORDS);
    keywords
}

/// Truncate to `max_chars`, preferring a word boundary in the last fifth,
/// and append an ellipsis when anything was cut.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();
    let boundary = cut
        .rfind(' ')
        .filter(|&byte_pos| cut[..byte_pos].chars().count() * 5 > max_chars * 4);
    let mut out = match boundary {
        Some(byte_pos) => cut[..byte_pos].to_string(),
        None => cut,
    };
    out.push(ELLIPSIS);
    out
}

/// Wrap case-insensitive keyword matches in `<em>` tags.
///
/// Longer keywords win where matches overlap. If no pattern can be built
/// the text comes back unchanged.
pub fn highlight_text(text: &str, keywords: &[String]) -> String {
    if keywords.is_empty() {
        return text.to_string();
    }

    let pattern = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re.replace_all(text, "<em>$0</em>").into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Snippet for display: truncated first, then highlighted, so tags are
/// never cut in half.
pub fn highlight_snippet(text: &str, keywords: &[String], max_chars: usize) -> String {
    highlight_text(&truncate_snippet(text, max_chars), keywords)
}
