//! Pure token extraction.
//!
//! A [`TokenPattern`] turns raw text into the set of distinct substrings that
//! look like a secret key. Two shapes cover every backend in the pipeline.

use regex::Regex;
use std::collections::HashSet;

/// Lexical shape of a secret token.
#[derive(Debug, Clone)]
pub struct TokenPattern {
    regex: Regex,
    captures: bool,
}

impl TokenPattern {
    /// Prefix followed by exactly `len` characters from `[A-Za-z0-9]`. Used
    /// where the backend's key format has a rigid length.
    pub fn fixed(prefix: &str, len: usize) -> Self {
        let regex = Regex::new(&format!("{}[A-Za-z0-9]{{{}}}", regex::escape(prefix), len))
            .expect("fixed token pattern is a valid regex");
        Self {
            regex,
            captures: false,
        }
    }

    /// Prefix followed by a greedy run of URL/body-safe characters, ending at
    /// a backtick, quote, newline or the end of the input. The terminator is
    /// never part of the returned token.
    pub fn delimited(prefix: &str) -> Self {
        let regex = Regex::new(&format!(
            "({}[A-Za-z0-9._-]+)(?:[`\"'\n]|$)",
            regex::escape(prefix)
        ))
        .expect("delimited token pattern is a valid regex");
        Self {
            regex,
            captures: true,
        }
    }

    /// Collect every distinct token in `text`. Pure; overlapping and repeated
    /// matches collapse by exact string equality.
    pub fn extract(&self, text: &str) -> HashSet<String> {
        if self.captures {
            self.regex
                .captures_iter(text)
                .map(|c| c[1].to_string())
                .collect()
        } else {
            self.regex
                .find_iter(text)
                .map(|m| m.as_str().to_string())
                .collect()
        }
    }
}
