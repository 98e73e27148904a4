use std::{fmt, time::Duration};

use crate::publication::{Provenance, Publication};

pub mod orcid;
pub mod scholar;

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.10 Safari/605.1.1";

/// A metadata source the pipeline can pull publications from.
///
/// `Err` means the source as a whole failed (unreachable, author unknown, bad status). Entries
/// that could not be used are reported in [`Harvest::skipped`] instead, so an `Ok` harvest with
/// no publications genuinely means "nothing found".
pub trait Fetcher {
    fn provenance(&self) -> Provenance;
    fn fetch(&self) -> anyhow::Result<Harvest>;
}

/// What one source produced.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Harvest {
    pub publications: Vec<Publication>,
    pub skipped: Vec<Skipped>,
}

/// A record that was dropped, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub what: String,
    pub reason: String,
}

impl Skipped {
    pub fn new(what: impl Into<String>, reason: impl fmt::Display) -> Self {
        Skipped {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// Blocking agent shared by the fetchers. Non-2xx responses are returned as responses so callers
/// can report the status themselves.
pub fn agent(timeout: Duration) -> ureq::Agent {
    let cfg = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(5)))
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(cfg)
}
