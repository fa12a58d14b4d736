//! URL match patterns.
//!
//! Patterns have the form `<scheme>://<host>/<path>`:
//!
//! - scheme: `*` (http or https), `http`, `https`, `file`, `ftp` or `app`
//! - host: `*` (any host), `*.example.com` (the domain and its subdomains)
//!   or a literal host
//! - path: `*` (anything, including nothing), a literal path where `*` globs
//!   any run of characters, or empty
//!
//! `<all_urls>` matches every http(s), file, ftp and app URL.
//!
//! Compiling never panics. [`MatchPattern::parse`] reports malformed patterns
//! for validation; [`UrlMatcher::compile`] turns them into a matcher that
//! never matches.

use std::fmt;

use regex::Regex;

use crate::error::ValidationError;

pub const ALL_URLS: &str = "<all_urls>";

const SCHEMES: [&str; 5] = ["http", "https", "file", "ftp", "app"];

/// A validated, compiled match pattern.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    source: String,
    regex: Regex,
}

impl MatchPattern {
    pub fn parse(pattern: &str) -> Result<Self, ValidationError> {
        let expr = to_regex(pattern).ok_or_else(|| ValidationError::InvalidPattern(pattern.to_string()))?;
        let regex = Regex::new(&expr).map_err(|_| ValidationError::InvalidPattern(pattern.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Result of compiling a possibly-invalid pattern.
#[derive(Debug, Clone)]
pub enum UrlMatcher {
    Pattern(MatchPattern),
    /// The pattern was malformed; nothing matches.
    Never,
}

impl UrlMatcher {
    pub fn compile(pattern: &str) -> Self {
        match MatchPattern::parse(pattern) {
            Ok(p) => UrlMatcher::Pattern(p),
            Err(_) => UrlMatcher::Never,
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlMatcher::Pattern(p) => p.matches(url),
            UrlMatcher::Never => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, UrlMatcher::Pattern(_))
    }
}

/// The union of several patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    matchers: Vec<UrlMatcher>,
}

impl PatternSet {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            matchers: patterns.into_iter().map(UrlMatcher::compile).collect(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(url))
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

fn to_regex(pattern: &str) -> Option<String> {
    if pattern == ALL_URLS {
        return Some("^(?i:https?|file|ftp|app)://".to_string());
    }

    let (scheme, rest) = pattern.split_once("://")?;
    let scheme = scheme.to_ascii_lowercase();
    let scheme_expr = if scheme == "*" {
        "https?".to_string()
    } else if SCHEMES.contains(&scheme.as_str()) {
        regex::escape(&scheme)
    } else {
        return None;
    };

    let (host, path) = match rest.split_once('/') {
        Some((host, path)) => (host, path),
        None => (rest, ""),
    };

    let host_expr = if host == "*" {
        "[^/]*".to_string()
    } else if let Some(domain) = host.strip_prefix("*.") {
        if domain.is_empty() || domain.contains('*') {
            return None;
        }
        format!(r"(?:[^/]*\.)?{}", regex::escape(domain))
    } else if host.contains('*') {
        return None;
    } else {
        regex::escape(host)
    };

    let path_expr = if path.is_empty() {
        "/?".to_string()
    } else if path == "*" {
        "(?:/.*)?".to_string()
    } else {
        let globbed = path
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        format!("/{globbed}")
    };

    Some(format!("^(?i:{scheme_expr}://{host_expr}){path_expr}$"))
}
