use crate::context::{RetrievalResult, TimeRange};
use codedocs_corpus::Corpus;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Sort descending by score; ties keep their current order
pub fn sort_by_score(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

fn matches_filter(result: &RetrievalResult, key: &str, expected: &str) -> bool {
    match key {
        "language" => result.language == expected,
        "category" => result.category == expected,
        "file_path" => result.file_path.contains(expected),
        _ => result.metadata.get(key).is_some_and(|v| v == expected),
    }
}

/// Keep results matching every filter
#[must_use]
pub fn filter_results(
    results: Vec<RetrievalResult>,
    filters: &BTreeMap<String, String>,
) -> Vec<RetrievalResult> {
    if filters.is_empty() {
        return results;
    }
    results
        .into_iter()
        .filter(|result| {
            filters
                .iter()
                .all(|(key, expected)| matches_filter(result, key, expected))
        })
        .collect()
}

/// Drop results whose document was modified outside `range`; undated documents pass
#[must_use]
pub fn filter_time_window(
    results: Vec<RetrievalResult>,
    range: &TimeRange,
    corpus: &Corpus,
) -> Vec<RetrievalResult> {
    results
        .into_iter()
        .filter(|result| {
            corpus
                .document(&result.document_id)
                .and_then(|doc| doc.modified_at)
                .map_or(true, |at| range.contains(at))
        })
        .collect()
}

/// Multiply scores by every boost whose key names the result's language or
/// category, or appears in its path
pub fn apply_boosts(results: &mut [RetrievalResult], boosts: &BTreeMap<String, f32>) {
    if boosts.is_empty() {
        return;
    }
    for result in results.iter_mut() {
        for (key, factor) in boosts {
            let applies = key.eq_ignore_ascii_case(&result.language)
                || key.eq_ignore_ascii_case(&result.category)
                || result.file_path.contains(key.as_str());
            if applies {
                result.score *= factor;
                result.relevance.boosts_applied.insert(key.clone(), *factor);
            }
        }
    }
    sort_by_score(results);
}

/// Cap results per file path at `max_per_file` once the list is longer than
/// that; `0` disables the cap
#[must_use]
pub fn diversify(results: Vec<RetrievalResult>, max_per_file: usize) -> Vec<RetrievalResult> {
    if max_per_file == 0 || results.len() <= max_per_file {
        return results;
    }
    let mut per_file: HashMap<String, usize> = HashMap::new();
    results
        .into_iter()
        .filter(|result| {
            let seen = per_file.entry(result.file_path.clone()).or_insert(0);
            *seen += 1;
            *seen <= max_per_file
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use codedocs_corpus::{Document, DocumentCategory};
    use pretty_assertions::assert_eq;

    fn result(chunk_id: &str, file_path: &str, language: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            document_id: file_path.to_string(),
            chunk_id: chunk_id.to_string(),
            file_path: file_path.to_string(),
            content: String::new(),
            score,
            language: language.to_string(),
            category: "code".to_string(),
            context: None,
            metadata: BTreeMap::from([("owner".to_string(), "core".to_string())]),
            relevance: Default::default(),
        }
    }

    fn ids(results: &[RetrievalResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk_id.as_str()).collect()
    }

    #[test]
    fn filters_are_anded() {
        let results = vec![
            result("a", "cmd/server/main.go", "Go", 0.9),
            result("b", "cmd/server/main.py", "Python", 0.8),
            result("c", "pkg/util.go", "Go", 0.7),
        ];
        let filters = BTreeMap::from([
            ("language".to_string(), "Go".to_string()),
            ("file_path".to_string(), "cmd/".to_string()),
            ("owner".to_string(), "core".to_string()),
        ]);

        assert_eq!(ids(&filter_results(results, &filters)), vec!["a"]);
    }

    #[test]
    fn unknown_metadata_key_excludes() {
        let filters = BTreeMap::from([("team".to_string(), "x".to_string())]);
        assert!(filter_results(vec![result("a", "a.go", "Go", 1.0)], &filters).is_empty());
    }

    #[test]
    fn diversity_caps_each_file() {
        let mut results = Vec::new();
        for file in ["a.go", "b.go"] {
            for i in 0..4 {
                results.push(result(&format!("{file}-{i}"), file, "Go", 1.0 - i as f32 * 0.1));
            }
        }
        sort_by_score(&mut results);

        let kept = diversify(results, 2);
        assert_eq!(kept.len(), 4);
        for file in ["a.go", "b.go"] {
            assert_eq!(kept.iter().filter(|r| r.file_path == file).count(), 2);
        }
        assert_eq!(ids(&kept), vec!["a.go-0", "b.go-0", "a.go-1", "b.go-1"]);
    }

    #[test]
    fn short_lists_are_not_diversified() {
        let results = vec![result("a", "a.go", "Go", 1.0), result("b", "a.go", "Go", 0.5)];
        assert_eq!(diversify(results, 2).len(), 2);
    }

    #[test]
    fn boosts_reorder_and_are_recorded() {
        let mut results = vec![
            result("py", "tool.py", "Python", 0.6),
            result("go", "main.go", "Go", 0.5),
        ];
        apply_boosts(&mut results, &BTreeMap::from([("go".to_string(), 2.0)]));

        assert_eq!(ids(&results), vec!["go", "py"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[0].relevance.boosts_applied.get("go"), Some(&2.0));
        assert!(results[1].relevance.boosts_applied.is_empty());
    }

    #[test]
    fn time_window_keeps_undated_documents() {
        let now = Utc::now();
        let corpus = Corpus::new(vec![
            Document::new("old.go", "old.go", "Go", DocumentCategory::Code)
                .with_modified_at(now - Duration::days(30)),
            Document::new("new.go", "new.go", "Go", DocumentCategory::Code)
                .with_modified_at(now - Duration::hours(1)),
            Document::new("undated.go", "undated.go", "Go", DocumentCategory::Code),
        ]);
        let results = vec![
            result("o", "old.go", "Go", 1.0),
            result("n", "new.go", "Go", 1.0),
            result("u", "undated.go", "Go", 1.0),
        ];
        let range = TimeRange {
            start: now - Duration::days(1),
            end: now,
        };

        assert_eq!(ids(&filter_time_window(results, &range, &corpus)), vec!["n", "u"]);
    }

    proptest::proptest! {
        #[test]
        fn diversity_never_exceeds_cap(
            files in proptest::collection::vec(0u8..4, 0..40),
            cap in 1usize..6,
        ) {
            let results: Vec<RetrievalResult> = files
                .iter()
                .enumerate()
                .map(|(i, f)| result(&i.to_string(), &format!("f{f}.rs"), "Rust", 1.0))
                .collect();
            let total = results.len();
            let kept = diversify(results, cap);

            if total <= cap {
                proptest::prop_assert_eq!(kept.len(), total);
            } else {
                let mut per_file: HashMap<&str, usize> = HashMap::new();
                for r in &kept {
                    *per_file.entry(r.file_path.as_str()).or_insert(0) += 1;
                }
                proptest::prop_assert!(per_file.values().all(|n| *n <= cap));
            }
            let order: Vec<usize> = kept.iter().map(|r| r.chunk_id.parse().unwrap()).collect();
            proptest::prop_assert!(order.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
