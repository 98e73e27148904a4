use std::{fmt, path::PathBuf, str::FromStr};

use clap::Parser;

use crate::fetch::orcid::validate_orcid_id;

/// Fetch a researcher's publications from ORCID and Google Scholar and write them as one
/// deduplicated JSON list.
///
/// Run without arguments to use the built-in profile.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Display name of the researcher
    #[arg(long, value_name = "NAME")]
    pub author: Option<String>,

    /// ORCID iD, e.g. 0000-0002-1825-0097
    #[arg(long, value_name = "ID", value_parser = parse_orcid)]
    pub orcid: Option<String>,

    /// Google Scholar author id (the `user=` parameter of a profile URL)
    #[arg(long, value_name = "ID", conflicts_with = "by_name")]
    pub scholar_id: Option<String>,

    /// Look the author up on Google Scholar by name instead of by id
    #[arg(long)]
    pub by_name: bool,

    /// Where to write the merged list
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Ignore the existing output file instead of keeping its entries
    #[arg(long)]
    pub fresh: bool,

    /// Do not query this source (repeatable)
    #[arg(long, value_name = "SOURCE")]
    pub skip: Vec<SourceKind>,

    /// Pause between Google Scholar publication requests, in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,
}

/// An upstream service the pipeline can query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Orcid,
    Scholar,
}

impl FromStr for SourceKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "orcid" => Ok(SourceKind::Orcid),
            "scholar" | "google-scholar" => Ok(SourceKind::Scholar),
            other => Err(format!("unknown source `{other}` (expected `orcid` or `scholar`)")),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Orcid => f.write_str("ORCID"),
            SourceKind::Scholar => f.write_str("Google Scholar"),
        }
    }
}

fn parse_orcid(s: &str) -> Result<String, String> {
    let s = s.trim();
    if validate_orcid_id(s) {
        Ok(s.to_string())
    } else {
        Err(format!("`{s}` is not a valid ORCID iD"))
    }
}
