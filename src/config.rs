use std::{path::PathBuf, time::Duration};

use crate::cli::{Cli, SourceKind};

pub const AUTHOR_NAME: &str = "Patrycja Lebiecka-Johansen";
pub const ORCID_ID: &str = "0000-0001-8931-453X";
pub const GOOGLE_SCHOLAR_ID: &str = "272CSLUAAAAJ";
pub const OUTPUT_FILE: &str = "assets/data/publications.json";

pub const ORCID_API: &str = "https://pub.orcid.org/v3.0";
pub const SCHOLAR_BASE: &str = "https://scholar.google.com";

/// Everything one run needs to know. Nothing in the pipeline reads globals, so tests build
/// their own `Config` pointing at temporary files.
#[derive(Debug, Clone)]
pub struct Config {
    /// The subject's display name. Also used as the Scholar search term when no Scholar id is
    /// set, and as the fallback author of records that arrive without one.
    pub author_name: String,
    pub orcid_id: String,
    pub scholar_id: Option<String>,
    pub output: PathBuf,
    /// Seed the merge with the previously written output and never overwrite those records.
    pub keep_existing: bool,
    pub skip: Vec<SourceKind>,
    /// Pause between two Scholar publication detail requests.
    pub scholar_delay: Duration,
    pub orcid_api: String,
    pub scholar_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            author_name: AUTHOR_NAME.to_string(),
            orcid_id: ORCID_ID.to_string(),
            scholar_id: Some(GOOGLE_SCHOLAR_ID.to_string()),
            output: PathBuf::from(OUTPUT_FILE),
            keep_existing: true,
            skip: Vec::new(),
            scholar_delay: Duration::from_millis(1000),
            orcid_api: ORCID_API.to_string(),
            scholar_base: SCHOLAR_BASE.to_string(),
        }
    }
}

impl Config {
    pub fn is_enabled(&self, source: SourceKind) -> bool {
        !self.skip.contains(&source)
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        let mut config = Config::default();
        if let Some(author) = cli.author {
            config.author_name = author;
        }
        if let Some(orcid) = cli.orcid {
            config.orcid_id = orcid;
        }
        if cli.by_name {
            config.scholar_id = None;
        } else if let Some(id) = cli.scholar_id {
            config.scholar_id = Some(id);
        }
        if let Some(output) = cli.output {
            config.output = output;
        }
        if cli.fresh {
            config.keep_existing = false;
        }
        if let Some(ms) = cli.delay_ms {
            config.scholar_delay = Duration::from_millis(ms);
        }
        config.skip = cli.skip;
        config
    }
}
