use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend a candidate was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    GithubCode,
    ReplitGraphql,
    HuggingfaceIndex,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceId::GithubCode => "github-code",
            SourceId::ReplitGraphql => "replit-graphql",
            SourceId::HuggingfaceIndex => "huggingface-index",
        };
        f.write_str(name)
    }
}

/// A token matching a key shape that has not been verified yet. Exists only
/// within one run, until it is classified or dropped.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub key: String,
    pub source: SourceId,
    pub discovered_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(key: String, source: SourceId) -> Self {
        Self {
            key,
            source,
            discovered_at: Utc::now(),
        }
    }
}

/// What the provider's own endpoints report about a live key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFacts {
    pub gpt4_allowed: bool,
    pub plan: Option<String>,
    pub hard_limit_usd: Option<f64>,
    pub has_payment_method: Option<bool>,
    pub access_until: Option<DateTime<Utc>>,
}

/// Definitive outcome of a validation call. A transient failure is not a
/// classification; it surfaces as `Err` from the validator instead.
#[derive(Debug, Clone)]
pub enum Classification {
    Valid(KeyFacts),
    Invalid { reason: String },
}

/// Record persisted for every key that validated as live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyReport {
    pub key: String,
    pub source: SourceId,
    #[serde(flatten)]
    pub facts: KeyFacts,
    pub validated_at: DateTime<Utc>,
}

impl KeyReport {
    pub fn new(candidate: &Candidate, facts: KeyFacts) -> Self {
        Self {
            key: candidate.key.clone(),
            source: candidate.source,
            facts,
            validated_at: Utc::now(),
        }
    }
}

/// Pagination state for one adapter's query. Owned by the adapter, reset
/// every run, never persisted.
#[derive(Debug, Clone)]
pub struct SearchCursor {
    pub source: SourceId,
    pub query: String,
    pub page: u32,
    pub exhausted: bool,
}

impl SearchCursor {
    pub fn new(source: SourceId, query: String) -> Self {
        Self {
            source,
            query,
            page: 1,
            exhausted: false,
        }
    }

    pub fn advance(&mut self) {
        self.page += 1;
    }

    pub fn finish(&mut self) {
        self.exhausted = true;
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    /// Candidates surfaced by adapters, after in-pool deduplication.
    pub discovered: usize,
    pub unique_candidates: usize,
    /// Candidates dropped because a previous run already handled them.
    pub skipped_known: usize,
    pub valid: usize,
    pub invalid: usize,
    pub transient_errors: usize,
    pub persistence_failures: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_starts_at_first_page() {
        let cursor = SearchCursor::new(SourceId::GithubCode, "sk-or-v1-".to_string());
        assert_eq!(cursor.page, 1);
        assert!(!cursor.exhausted);
    }

    #[test]
    fn test_cursor_advance_and_finish() {
        let mut cursor = SearchCursor::new(SourceId::ReplitGraphql, "sk- openai".to_string());
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.page, 3);
        cursor.finish();
        assert!(cursor.exhausted);
    }

    #[test]
    fn test_key_report_roundtrip() {
        let candidate = Candidate::new("sk-test".to_string(), SourceId::HuggingfaceIndex);
        let report = KeyReport::new(
            &candidate,
            KeyFacts {
                gpt4_allowed: true,
                plan: Some("payg".to_string()),
                hard_limit_usd: Some(120.0),
                has_payment_method: Some(true),
                access_until: None,
            },
        );

        let json = serde_json::to_string(&report).unwrap();
        let parsed: KeyReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.key, "sk-test");
        assert_eq!(parsed.source, SourceId::HuggingfaceIndex);
        assert!(parsed.facts.gpt4_allowed);
    }
}
