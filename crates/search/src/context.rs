use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Retrieval strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Semantic,
    Keyword,
    #[default]
    Hybrid,
    Structural,
}

impl QueryType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
            Self::Hybrid => "hybrid",
            Self::Structural => "structural",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            "keyword" => Ok(Self::Keyword),
            "hybrid" => Ok(Self::Hybrid),
            "structural" => Ok(Self::Structural),
            other => Err(format!(
                "unknown query type '{other}' (expected semantic, keyword, hybrid or structural)"
            )),
        }
    }
}

/// Inclusive modification-time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// One retrieval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub query: String,
    pub query_type: QueryType,
    pub max_results: usize,
    pub min_score: f32,
    /// `language`, `category`, `file_path` (substring) or any metadata key (exact)
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    /// Score multipliers keyed by language, category or path fragment
    #[serde(default)]
    pub boost_factors: BTreeMap<String, f32>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}

impl RetrievalContext {
    #[must_use]
    pub fn new(query: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            query: query.into(),
            query_type,
            max_results: 10,
            min_score: 0.0,
            filters: BTreeMap::new(),
            boost_factors: BTreeMap::new(),
            time_range: None,
        }
    }

    #[must_use]
    pub const fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    #[must_use]
    pub const fn min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn boost(mut self, key: impl Into<String>, factor: f32) -> Self {
        self.boost_factors.insert(key.into(), factor);
        self
    }

    #[must_use]
    pub const fn time_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.time_range = Some(TimeRange { start, end });
        self
    }
}

/// Surrounding chunks of a result inside its document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultContext {
    pub previous: Option<String>,
    pub next: Option<String>,
}

/// How a result's score came about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelevanceInfo {
    pub relevance_score: f32,
    pub semantic_score: f32,
    pub keyword_score: f32,
    pub structural_score: f32,
    pub matched_terms: Vec<String>,
    /// Structural concepts detected in the chunk ("function", "class", ...)
    pub matched_concepts: Vec<String>,
    pub boosts_applied: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub document_id: String,
    pub chunk_id: String,
    pub file_path: String,
    pub content: String,
    pub score: f32,
    pub language: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ResultContext>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub relevance: RelevanceInfo,
}
