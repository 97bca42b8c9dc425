//! Assigned-identifier extraction
//!
//! The application never returns a new record's id in a structured way:
//! it shows up as a query parameter on the post-redirect URL, or buried in
//! the response HTML as an attribute or key=value pair. Both are probed in
//! order, URL first; failing both is NOT a submission failure, the record
//! is just excluded from backfill.

use demoseed_common::{Error, Result};
use regex::{Regex, RegexBuilder};
use url::Url;

/// Identifier extraction strategy for one entity kind
#[derive(Debug)]
pub struct IdRules {
    url_params: Vec<String>,
    content_patterns: Vec<Regex>,
}

impl IdRules {
    /// Compile a rule set. Content patterns match case-insensitively and
    /// must capture the numeric id as group 1.
    pub fn compile(url_params: &[String], content_patterns: &[String]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(content_patterns.len());
        for pattern in content_patterns {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::Config(format!("invalid id pattern '{pattern}': {e}")))?;
            compiled.push(regex);
        }
        Ok(IdRules {
            url_params: url_params.to_vec(),
            content_patterns: compiled,
        })
    }

    /// URL parameters first, then the response body; first hit wins.
    pub fn extract(&self, final_url: &str, body: &str) -> Option<i64> {
        self.from_url(final_url).or_else(|| self.from_content(body))
    }

    fn from_url(&self, raw_url: &str) -> Option<i64> {
        let url = Url::parse(raw_url).ok()?;
        for param in &self.url_params {
            for (name, value) in url.query_pairs() {
                if name.as_ref() == param.as_str() {
                    if let Ok(id) = value.parse::<i64>() {
                        return Some(id);
                    }
                }
            }
        }
        None
    }

    fn from_content(&self, content: &str) -> Option<i64> {
        for pattern in &self.content_patterns {
            let id = pattern
                .captures(content)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<i64>().ok());
            if id.is_some() {
                return id;
            }
        }
        None
    }
}
