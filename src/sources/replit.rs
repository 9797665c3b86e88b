use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::error::{KeySweepError, Result};
use crate::core::results::{SearchCursor, SourceId};
use crate::core::traits::SourceAdapter;
use crate::extract::TokenPattern;
use crate::pipeline::CandidatePool;
use crate::utils::{HttpClient, RetryPolicy};

/// Opaque search document posted to the backend; passed through, never
/// parsed locally.
const SEARCH_QUERY_TEMPLATE: &str = include_str!("../../graphql/SearchPageSearchResults.graphql");

const GRAPHQL_URL: &str = "https://replit.com/graphql";
const SORT_MODE: &str = "RecentlyModified";
const PAGE_SIZE: u32 = 10;

const BROWSER_HEADERS: [(&str, &str); 11] = [
    (
        "User-Agent",
        "Mozilla/5.0 (X11; Linux x86_64; rv:102.0) Gecko/20100101 Firefox/102.0",
    ),
    ("Accept", "*/*"),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Content-Type", "application/json"),
    ("x-requested-with", "XMLHttpRequest"),
    ("Sec-Fetch-Dest", "empty"),
    ("Sec-Fetch-Mode", "cors"),
    ("Sec-Fetch-Site", "same-origin"),
    ("Pragma", "no-cache"),
    ("Cache-Control", "no-cache"),
    ("Referrer", "https://replit.com/search"),
];

/// One parsed page of the GraphQL response.
enum PageOutcome {
    Candidates(Vec<String>),
    /// No result field and no error message: nothing on this page.
    Empty,
    /// The expected result field is missing but a message is present, which
    /// marks a server-side transient error.
    Transient(String),
}

/// Full-text search over the GraphQL endpoint. Pages are bounded per query
/// (a deliberate scope limit on this deep backend) and a transient backend
/// error on a page is retried once after a fixed delay.
pub struct ReplitGraphqlSearch {
    query: String,
    url: String,
    max_pages: u32,
    retry: RetryPolicy,
    pattern: TokenPattern,
}

impl ReplitGraphqlSearch {
    pub fn new(query: String, max_pages: u32) -> Self {
        Self {
            query,
            url: GRAPHQL_URL.to_string(),
            max_pages,
            retry: RetryPolicy::once_after(Duration::from_secs(5)),
            pattern: TokenPattern::fixed("sk-", 48),
        }
    }

    fn payload(&self, page: u32) -> Value {
        json!([{
            "operationName": "SearchPageSearchResults",
            "variables": {
                "options": {
                    "onlyCalculateHits": false,
                    "categories": ["Files"],
                    "query": self.query,
                    "categorySettings": {
                        "docs": {},
                        "files": {
                            "page": { "first": PAGE_SIZE, "after": page.to_string() },
                            "sort": SORT_MODE,
                            "exactMatch": false,
                            "myCode": false
                        }
                    }
                }
            },
            "query": SEARCH_QUERY_TEMPLATE,
        }])
    }

    async fn post_search(&self, page: u32) -> Result<Value> {
        let url = self.url.clone();
        let body = self.payload(page).to_string();
        let response = tokio::task::spawn_blocking(move || {
            let client = HttpClient::new();
            client.post(&url, &BROWSER_HEADERS, &body)
        })
        .await
        .map_err(|e| KeySweepError::Unknown(format!("task join error: {}", e)))??;

        if !response.is_success() {
            return Err(KeySweepError::SearchBackend(format!(
                "graphql search returned HTTP {}",
                response.status_code
            )));
        }
        response.json()
    }

    /// Fetch one page, retrying a transient backend error per the policy.
    /// A page that stays broken yields an empty result, not a failed run.
    async fn search_page(&self, page: u32) -> Result<Vec<String>> {
        retry_transient(&self.retry, page, || async move {
            let data = self.post_search(page).await?;
            Ok(parse_search_page(&data, &self.pattern))
        })
        .await
    }
}

/// Drive one page's fetch under the retry policy. A transient outcome is
/// retried until the policy's attempts run out, then resolves to an empty
/// page; candidate and empty outcomes resolve immediately.
async fn retry_transient<F, Fut>(policy: &RetryPolicy, page: u32, mut fetch: F) -> Result<Vec<String>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PageOutcome>>,
{
    for attempt in 0..policy.attempts() {
        match fetch().await? {
            PageOutcome::Candidates(keys) => return Ok(keys),
            PageOutcome::Empty => return Ok(Vec::new()),
            PageOutcome::Transient(message) => {
                if attempt + 1 < policy.attempts() {
                    warn!(
                        "graphql backend error on page {}: {} (retrying in {:?})",
                        page, message, policy.delay
                    );
                    tokio::time::sleep(policy.delay).await;
                } else {
                    warn!(
                        "graphql backend error on page {}: {} (giving up on this page)",
                        page, message
                    );
                }
            }
        }
    }
    Ok(Vec::new())
}

#[async_trait]
impl SourceAdapter for ReplitGraphqlSearch {
    fn source(&self) -> SourceId {
        SourceId::ReplitGraphql
    }

    async fn discover(&self, pool: Arc<CandidatePool>) -> Result<usize> {
        let mut cursor = SearchCursor::new(self.source(), self.query.clone());
        let mut inserted = 0;

        while cursor.page <= self.max_pages {
            debug!("graphql search page {}/{}", cursor.page, self.max_pages);
            let keys = self.search_page(cursor.page).await?;
            info!(
                "graphql page {}: {} matches (not yet validated)",
                cursor.page,
                keys.len()
            );

            for key in keys {
                if pool.insert(key, self.source()) {
                    inserted += 1;
                }
            }
            cursor.advance();
        }
        cursor.finish();

        Ok(inserted)
    }
}

fn parse_search_page(data: &Value, pattern: &TokenPattern) -> PageOutcome {
    let search = &data[0]["data"]["search"];
    if search.get("fileResults").is_none() {
        if let Some(message) = search.get("message").and_then(Value::as_str) {
            return PageOutcome::Transient(message.to_string());
        }
        return PageOutcome::Empty;
    }

    let mut keys: HashSet<String> = HashSet::new();
    if let Some(items) = search["fileResults"]["results"]["items"].as_array() {
        for item in items {
            if let Some(contents) = item["fileContents"].as_str() {
                keys.extend(pattern.extract(contents));
            }
        }
    }
    PageOutcome::Candidates(keys.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> TokenPattern {
        TokenPattern::fixed("sk-", 48)
    }

    fn key(fill: char) -> String {
        format!("sk-{}", fill.to_string().repeat(48))
    }

    #[test]
    fn test_parse_transient_error() {
        let data = json!([{"data": {"search": {"message": "try again later"}}}]);
        match parse_search_page(&data, &pattern()) {
            PageOutcome::Transient(message) => assert_eq!(message, "try again later"),
            _ => panic!("expected transient outcome"),
        }
    }

    #[test]
    fn test_parse_missing_results_without_message_is_empty() {
        let data = json!([{"data": {"search": {}}}]);
        assert!(matches!(
            parse_search_page(&data, &pattern()),
            PageOutcome::Empty
        ));
    }

    #[test]
    fn test_parse_extracts_distinct_keys_from_file_contents() {
        let a = key('a');
        let b = key('b');
        let data = json!([{"data": {"search": {"fileResults": {"results": {"items": [
            {"fileContents": format!("API_KEY={}\n", a)},
            {"fileContents": format!("x = '{}' # dup\ny = '{}'", a, b)},
        ]}}}}}]);

        match parse_search_page(&data, &pattern()) {
            PageOutcome::Candidates(keys) => {
                let keys: HashSet<String> = keys.into_iter().collect();
                assert_eq!(keys.len(), 2);
                assert!(keys.contains(&a));
                assert!(keys.contains(&b));
            }
            _ => panic!("expected candidates"),
        }
    }

    #[test]
    fn test_payload_carries_page_and_sort() {
        let adapter = ReplitGraphqlSearch::new("sk- openai".to_string(), 20);
        let payload = adapter.payload(7);
        let files = &payload[0]["variables"]["options"]["categorySettings"]["files"];
        assert_eq!(files["page"]["after"], "7");
        assert_eq!(files["sort"], SORT_MODE);
        assert_eq!(payload[0]["operationName"], "SearchPageSearchResults");
    }

    #[test]
    fn test_retry_policy_is_single_retry() {
        let adapter = ReplitGraphqlSearch::new("q".to_string(), 20);
        assert_eq!(adapter.retry.attempts(), 2);
        assert_eq!(adapter.retry.delay, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_page_that_stays_transient_is_fetched_twice_then_empty() {
        let policy = RetryPolicy {
            max_retries: 1,
            delay: Duration::ZERO,
        };
        let fetches = std::cell::Cell::new(0u32);

        let keys = retry_transient(&policy, 1, || {
            fetches.set(fetches.get() + 1);
            async { Ok(PageOutcome::Transient("overloaded".to_string())) }
        })
        .await
        .unwrap();

        assert!(keys.is_empty());
        assert_eq!(fetches.get(), 2);
    }

    #[tokio::test]
    async fn test_transient_then_candidates_yields_candidates() {
        let policy = RetryPolicy {
            max_retries: 1,
            delay: Duration::ZERO,
        };
        let fetches = std::cell::Cell::new(0u32);
        let expected = key('a');

        let keys = retry_transient(&policy, 1, || {
            let attempt = fetches.get();
            fetches.set(attempt + 1);
            let key = key('a');
            async move {
                if attempt == 0 {
                    Ok(PageOutcome::Transient("overloaded".to_string()))
                } else {
                    Ok(PageOutcome::Candidates(vec![key]))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(keys, vec![expected]);
        assert_eq!(fetches.get(), 2);
    }

    #[tokio::test]
    async fn test_immediate_candidates_need_one_fetch() {
        let policy = RetryPolicy {
            max_retries: 1,
            delay: Duration::from_secs(5),
        };
        let fetches = std::cell::Cell::new(0u32);

        let keys = retry_transient(&policy, 1, || {
            fetches.set(fetches.get() + 1);
            async { Ok(PageOutcome::Candidates(vec!["sk-x".to_string()])) }
        })
        .await
        .unwrap();

        assert_eq!(keys.len(), 1);
        assert_eq!(fetches.get(), 1);
    }
}
