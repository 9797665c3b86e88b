use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::core::error::{KeySweepError, Result};
use crate::core::results::SourceId;
use crate::core::traits::SourceAdapter;
use crate::pipeline::CandidatePool;
use crate::utils::HttpClient;

lazy_static! {
    /// The index highlights the matched prefix in its own markup span, so a
    /// key comes back split: `sk-X</span>` followed by the remaining 47
    /// characters.
    static ref HIGHLIGHT_SPLIT: Regex = Regex::new(r"(sk-\w)</span>([a-zA-Z0-9]{47})").unwrap();
}

const PAGE_LIMIT: u32 = 100;
const SKIP_OFFSETS: [u32; 2] = [0, 10];

/// Public full-text index search. Instead of paginating, the token alphabet
/// is crossed with a small set of skip offsets and every combination is
/// fetched as its own task; one failing combination never cancels the rest.
pub struct HuggingfaceIndexSearch {
    base_url: String,
}

impl HuggingfaceIndexSearch {
    pub fn new() -> Self {
        Self {
            base_url: "https://huggingface.co".to_string(),
        }
    }

    /// Every character a key can start with after its prefix.
    fn alphabet() -> impl Iterator<Item = char> {
        ('a'..='z').chain('A'..='Z').chain('0'..='9')
    }

    fn page_url(&self, first_char: char, skip: u32) -> String {
        format!(
            "{}/search/full-text?q=sk-{}&limit={}&skip={}",
            self.base_url, first_char, PAGE_LIMIT, skip
        )
    }
}

impl Default for HuggingfaceIndexSearch {
    fn default() -> Self {
        Self::new()
    }
}

// 124 combinations share the blocking pool; a hung page must not hold a
// thread for the default 30s.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

async fn fetch_page(url: String) -> Result<String> {
    let response = tokio::task::spawn_blocking(move || {
        let client = HttpClient::with_timeout(FETCH_TIMEOUT);
        client.get(&url, &[("User-Agent", "curl/7.68.0")])
    })
    .await
    .map_err(|e| KeySweepError::Unknown(format!("task join error: {}", e)))??;

    if !response.is_success() {
        return Err(KeySweepError::SearchBackend(format!(
            "full-text index returned HTTP {}",
            response.status_code
        )));
    }
    response.text()
}

/// Stitch highlighted keys back together out of the result markup.
fn stitch_keys(markup: &str) -> Vec<String> {
    HIGHLIGHT_SPLIT
        .captures_iter(markup)
        .map(|c| format!("{}{}", &c[1], &c[2]))
        .collect()
}

#[async_trait]
impl SourceAdapter for HuggingfaceIndexSearch {
    fn source(&self) -> SourceId {
        SourceId::HuggingfaceIndex
    }

    async fn discover(&self, pool: Arc<CandidatePool>) -> Result<usize> {
        let mut tasks = JoinSet::new();
        for skip in SKIP_OFFSETS {
            for ch in Self::alphabet() {
                let url = self.page_url(ch, skip);
                let pool = Arc::clone(&pool);
                tasks.spawn(async move {
                    let markup = fetch_page(url).await?;
                    let mut inserted = 0;
                    for key in stitch_keys(&markup) {
                        if pool.insert(key, SourceId::HuggingfaceIndex) {
                            inserted += 1;
                        }
                    }
                    Ok::<usize, KeySweepError>(inserted)
                });
            }
        }

        // Each alphabet x offset combination succeeds or fails on its own.
        let mut inserted = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(count)) => inserted += count,
                Ok(Err(e)) => debug!("index page failed: {}", e),
                Err(e) => warn!("index task panicked: {}", e),
            }
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stitch_keys_from_markup() {
        let tail = "a".repeat(47);
        let markup = format!(
            "<span class=\"hl\">sk-Q</span>{} other text <span>sk-R</span>{}",
            tail, tail
        );

        let keys = stitch_keys(&markup);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], format!("sk-Q{}", tail));
        assert_eq!(keys[0].len(), 51);
    }

    #[test]
    fn test_stitch_ignores_short_tails() {
        let markup = format!("<span>sk-Q</span>{}", "a".repeat(20));
        assert!(stitch_keys(&markup).is_empty());
    }

    #[test]
    fn test_alphabet_covers_lower_upper_digits() {
        let chars: Vec<char> = HuggingfaceIndexSearch::alphabet().collect();
        assert_eq!(chars.len(), 62);
        assert!(chars.contains(&'a'));
        assert!(chars.contains(&'Z'));
        assert!(chars.contains(&'0'));
    }

    #[test]
    fn test_page_url_shape() {
        let adapter = HuggingfaceIndexSearch::new();
        assert_eq!(
            adapter.page_url('a', 10),
            "https://huggingface.co/search/full-text?q=sk-a&limit=100&skip=10"
        );
    }
}
