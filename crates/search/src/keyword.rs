use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

/// Lowercased whitespace-separated query terms
#[must_use]
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordMatch {
    /// Fraction of query terms found in the text
    pub score: f32,
    pub matched_terms: Vec<String>,
}

impl KeywordMatch {
    #[must_use]
    pub fn is_match(&self) -> bool {
        !self.matched_terms.is_empty()
    }
}

/// Score `text` by the share of `terms` it contains (case-insensitive substring)
#[must_use]
pub fn keyword_match(terms: &[String], text: &str) -> KeywordMatch {
    if terms.is_empty() {
        return KeywordMatch::default();
    }
    let haystack = text.to_lowercase();
    let matched_terms: Vec<String> = terms
        .iter()
        .filter(|term| haystack.contains(term.as_str()))
        .cloned()
        .collect();
    KeywordMatch {
        score: matched_terms.len() as f32 / terms.len() as f32,
        matched_terms,
    }
}

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "being", "between", "both", "but", "could",
    "does", "each", "from", "have", "into", "just", "more", "most", "only", "other", "over",
    "same", "should", "some", "such", "than", "that", "their", "them", "then", "there", "these",
    "they", "this", "those", "through", "very", "were", "what", "when", "where", "which",
    "while", "will", "with", "would", "your",
];

/// Most frequent meaningful words across `texts`, most frequent first
#[must_use]
pub fn extract_key_terms<'a>(texts: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for text in texts {
        for word in text.unicode_words() {
            let word = word.to_lowercase();
            if word.chars().count() < 4
                || word.chars().all(|c| c.is_ascii_digit())
                || STOPWORDS.contains(&word.as_str())
            {
                continue;
            }
            let count = counts.entry(word.clone()).or_insert(0);
            if *count == 0 {
                first_seen.push(word);
            }
            *count += 1;
        }
    }
    // stable sort keeps first-seen order among equal counts
    first_seen.sort_by(|a, b| counts[b].cmp(&counts[a]));
    first_seen.truncate(limit);
    first_seen
}
