use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::results::{Candidate, SourceId};

/// Per-run candidate set, write-shared by every adapter. Identity is the raw
/// token; the first source to surface a token wins.
#[derive(Default)]
pub struct CandidatePool {
    inner: Mutex<HashMap<String, Candidate>>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate. Returns true when the token was not present yet.
    pub fn insert(&self, key: String, source: SourceId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.contains_key(&key) {
            return false;
        }
        inner.insert(key.clone(), Candidate::new(key, source));
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every candidate out of the pool.
    pub fn drain(&self) -> Vec<Candidate> {
        self.inner
            .lock()
            .unwrap()
            .drain()
            .map(|(_, candidate)| candidate)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_novelty() {
        let pool = CandidatePool::new();
        assert!(pool.insert("sk-a".to_string(), SourceId::GithubCode));
        assert!(!pool.insert("sk-a".to_string(), SourceId::ReplitGraphql));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_first_source_wins() {
        let pool = CandidatePool::new();
        pool.insert("sk-a".to_string(), SourceId::HuggingfaceIndex);
        pool.insert("sk-a".to_string(), SourceId::GithubCode);

        let drained = pool.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].source, SourceId::HuggingfaceIndex);
        assert!(pool.is_empty());
    }
}
