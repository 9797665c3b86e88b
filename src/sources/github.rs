use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::error::{KeySweepError, Result};
use crate::core::results::{SearchCursor, SourceId};
use crate::core::traits::SourceAdapter;
use crate::extract::TokenPattern;
use crate::pipeline::CandidatePool;
use crate::utils::{HttpClient, HttpResponse, RateLimiter};

pub const DEFAULT_CODE_QUERY: &str = "sk-or-v1-";

#[derive(Debug, Deserialize)]
struct CodeSearchResponse {
    items: Vec<CodeSearchItem>,
}

#[derive(Debug, Deserialize)]
struct CodeSearchItem {
    html_url: String,
}

/// What one page of code-search results means for the pagination loop.
enum PageStep {
    /// Document URLs to fetch and extract from.
    Documents(Vec<String>),
    /// No further pages. The backend reports rate limiting and exhaustion the
    /// same way, so "end" must never be read as "query exhausted".
    End,
}

/// Code search: page through `/search/code`, rewrite each hit to its raw
/// contents URL, fetch the document and run the extractor over it.
pub struct GithubCodeSearch {
    token: String,
    query: String,
    base_url: String,
    pattern: TokenPattern,
    rate_limiter: RateLimiter,
}

impl GithubCodeSearch {
    pub fn new(token: String, rate_limit: Duration) -> Self {
        Self::with_config(
            token,
            DEFAULT_CODE_QUERY.to_string(),
            "https://api.github.com".to_string(),
            rate_limit,
        )
    }

    pub fn with_config(
        token: String,
        query: String,
        base_url: String,
        rate_limit: Duration,
    ) -> Self {
        Self {
            token,
            query,
            base_url,
            pattern: TokenPattern::delimited(DEFAULT_CODE_QUERY),
            rate_limiter: RateLimiter::with_delay(rate_limit),
        }
    }

    async fn fetch(&self, url: &str, authenticated: bool) -> Result<HttpResponse> {
        let token = authenticated.then(|| self.token.clone());
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            let client = HttpClient::new();
            let mut headers = vec![("User-Agent", "curl/7.68.0".to_string())];
            if let Some(token) = token {
                headers.push(("Authorization", format!("token {}", token)));
            }
            let header_refs: Vec<(&str, &str)> =
                headers.iter().map(|(k, v)| (*k, v.as_str())).collect();
            client.get(&url, &header_refs)
        })
        .await
        .map_err(|e| KeySweepError::Unknown(format!("task join error: {}", e)))?
    }

    async fn search_page(&self, cursor: &SearchCursor) -> Result<HttpResponse> {
        let url = format!(
            "{}/search/code?q={}&page={}",
            self.base_url,
            urlencode(&cursor.query),
            cursor.page
        );
        self.rate_limiter.wait().await;
        self.fetch(&url, true).await
    }
}

#[async_trait]
impl SourceAdapter for GithubCodeSearch {
    fn source(&self) -> SourceId {
        SourceId::GithubCode
    }

    async fn discover(&self, pool: Arc<CandidatePool>) -> Result<usize> {
        let mut cursor = SearchCursor::new(self.source(), self.query.clone());
        let mut inserted = 0;

        while !cursor.exhausted {
            let response = self.search_page(&cursor).await?;

            if !response.is_success() {
                if response.is_rate_limited() {
                    // Indistinguishable from exhaustion on this backend.
                    warn!(
                        "code search page {} returned HTTP {} (likely rate limited), stopping",
                        cursor.page, response.status_code
                    );
                } else {
                    info!(
                        "code search ended at page {} (HTTP {})",
                        cursor.page, response.status_code
                    );
                }
            }

            let urls = match parse_page(&response) {
                PageStep::Documents(urls) => urls,
                PageStep::End => {
                    cursor.finish();
                    break;
                }
            };
            debug!("code search page {}: {} documents", cursor.page, urls.len());

            for url in urls {
                let raw_url = to_raw_url(&url);
                let document = match self.fetch(&raw_url, false).await {
                    Ok(r) if r.is_success() => match r.text() {
                        Ok(text) => text,
                        Err(e) => {
                            debug!("skipping undecodable document {}: {}", raw_url, e);
                            continue;
                        }
                    },
                    Ok(r) => {
                        debug!("skipping document {} (HTTP {})", raw_url, r.status_code);
                        continue;
                    }
                    Err(e) => {
                        debug!("skipping document {}: {}", raw_url, e);
                        continue;
                    }
                };

                for key in self.pattern.extract(&document) {
                    if pool.insert(key, self.source()) {
                        inserted += 1;
                    }
                }
            }

            cursor.advance();
        }

        Ok(inserted)
    }
}

fn parse_page(response: &HttpResponse) -> PageStep {
    if !response.is_success() {
        return PageStep::End;
    }
    match response.json::<CodeSearchResponse>() {
        Ok(page) if !page.items.is_empty() => {
            PageStep::Documents(page.items.into_iter().map(|item| item.html_url).collect())
        }
        _ => PageStep::End,
    }
}

/// Rewrite a search hit's browsing URL into its raw-content equivalent.
fn to_raw_url(html_url: &str) -> String {
    html_url
        .replace("github.com", "raw.githubusercontent.com")
        .replace("/blob", "")
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(c),
            ' ' => out.push('+'),
            _ => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).as_bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_raw_url() {
        assert_eq!(
            to_raw_url("https://github.com/acme/app/blob/main/.env"),
            "https://raw.githubusercontent.com/acme/app/main/.env"
        );
    }

    #[test]
    fn test_urlencode() {
        assert_eq!(urlencode("sk-or-v1-"), "sk-or-v1-");
        assert_eq!(urlencode("sk- openai"), "sk-+openai");
        assert_eq!(urlencode("a@b"), "a%40b");
    }

    #[test]
    fn test_urlencode_multibyte_chars() {
        assert_eq!(urlencode("clé"), "cl%C3%A9");
        assert_eq!(urlencode("键"), "%E9%94%AE");
    }

    #[test]
    fn test_non_success_page_ends_pagination() {
        let response = HttpResponse {
            status_code: 403,
            body: Vec::new(),
        };
        assert!(matches!(parse_page(&response), PageStep::End));
    }

    #[test]
    fn test_success_page_yields_document_urls() {
        let response = HttpResponse {
            status_code: 200,
            body: br#"{"items":[{"html_url":"https://github.com/a/b/blob/main/x.py"},{"html_url":"https://github.com/c/d/blob/main/y.js"}]}"#.to_vec(),
        };
        match parse_page(&response) {
            PageStep::Documents(urls) => assert_eq!(urls.len(), 2),
            PageStep::End => panic!("expected documents"),
        }
    }

    #[test]
    fn test_empty_or_malformed_page_ends_pagination() {
        let empty = HttpResponse {
            status_code: 200,
            body: br#"{"items":[]}"#.to_vec(),
        };
        assert!(matches!(parse_page(&empty), PageStep::End));

        let malformed = HttpResponse {
            status_code: 200,
            body: b"not json".to_vec(),
        };
        assert!(matches!(parse_page(&malformed), PageStep::End));
    }
}
