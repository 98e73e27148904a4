use std::fmt;

use serde::{Deserialize, Serialize};

/// One publication as exchanged between the fetchers, the merger and the output file.
///
/// Field order is the key order of the persisted JSON, which the website reads as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub url: Option<String>,
    pub source: Provenance,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl Publication {
    pub fn new(title: impl Into<String>, source: Provenance) -> Self {
        Publication {
            title: title.into(),
            year: 0,
            url: None,
            source,
            venue: None,
            authors: Vec::new(),
        }
    }

    /// Deduplication key of this record.
    pub fn key(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Where a record came from. Anything that is neither ORCID nor Google Scholar survives a
/// round-trip through the output file untouched (e.g. hand-written entries).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Provenance {
    Orcid,
    GoogleScholar,
    Other(String),
}

impl Provenance {
    pub fn as_str(&self) -> &str {
        match self {
            Provenance::Orcid => "ORCID",
            Provenance::GoogleScholar => "Google Scholar",
            Provenance::Other(s) => s,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Provenance {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ORCID" => Provenance::Orcid,
            "Google Scholar" => Provenance::GoogleScholar,
            _ => Provenance::Other(s),
        }
    }
}

impl From<Provenance> for String {
    fn from(p: Provenance) -> Self {
        match p {
            Provenance::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// Reduce a title to its comparison key: alphanumeric characters only, lower-cased.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Parse a year field. Only an all-digit string (after trimming) counts; anything else is 0.
pub fn parse_year(s: &str) -> i32 {
    let t = s.trim();
    if t.is_empty() || !t.chars().all(|c| c.is_ascii_digit()) {
        return 0;
    }
    t.parse().unwrap_or(0)
}

/// Split an author string as Scholar renders it.
///
/// BibTeX-style `" and "` separators take precedence; otherwise the string is treated as a
/// comma-separated list.
pub fn split_authors(s: &str) -> Vec<String> {
    let t = s.trim();
    let parts: Vec<&str> = if t.contains(" and ") {
        t.split(" and ").collect()
    } else {
        t.split(',').collect()
    };
    parts
        .into_iter()
        .map(normalize_ws)
        .filter(|n| !n.is_empty())
        .collect()
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}
