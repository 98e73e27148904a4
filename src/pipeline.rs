use std::path::PathBuf;

use crate::{
    cli::SourceKind,
    config::Config,
    fetch::{Fetcher, Harvest},
    merge::{MergePolicy, merge},
    publication::Provenance,
    report, store,
};

/// How one source ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Fetched { count: usize, skipped: usize },
    Failed(String),
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: Provenance,
    pub status: SourceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub sources: Vec<SourceReport>,
    pub kept: usize,
    /// Number of records written, or `None` when the output was left untouched.
    pub written: Option<usize>,
    pub output: PathBuf,
}

/// Load → fetch ORCID → fetch Scholar → merge → save.
///
/// Source failures are recorded in the summary and never abort the run. The only errors
/// returned are those reading a previous output file or writing the new one.
pub fn run(config: &Config, orcid: &dyn Fetcher, scholar: &dyn Fetcher) -> anyhow::Result<RunSummary> {
    let persisted = if config.keep_existing {
        let loaded = store::load(&config.output)?;
        for s in &loaded.skipped {
            report::skip(&s.what, &s.reason);
        }
        loaded.publications
    } else {
        Vec::new()
    };
    let kept = persisted.len();

    let mut sources = Vec::new();
    let mut fetched = Vec::new();
    for (kind, fetcher) in [(SourceKind::Orcid, orcid), (SourceKind::Scholar, scholar)] {
        let (status, harvest) = collect(config, kind, fetcher);
        sources.push(SourceReport {
            source: fetcher.provenance(),
            status,
        });
        fetched.push(harvest.publications);
    }

    let all_failed = sources
        .iter()
        .filter(|s| s.status != SourceStatus::Disabled)
        .all(|s| matches!(s.status, SourceStatus::Failed(_)));
    let any_enabled = sources.iter().any(|s| s.status != SourceStatus::Disabled);
    if any_enabled && all_failed && persisted.is_empty() {
        report::warn(format!(
            "every source failed; leaving {} unchanged",
            config.output.display()
        ));
        return Ok(RunSummary {
            sources,
            kept,
            written: None,
            output: config.output.clone(),
        });
    }

    let merged = merge(
        MergePolicy::default(),
        persisted,
        fetched,
        Some(config.author_name.clone()),
    );
    store::save(&config.output, &merged)?;

    Ok(RunSummary {
        sources,
        kept,
        written: Some(merged.len()),
        output: config.output.clone(),
    })
}

/// Run one fetcher and downgrade a failure to an empty contribution.
fn collect(config: &Config, kind: SourceKind, fetcher: &dyn Fetcher) -> (SourceStatus, Harvest) {
    if !config.is_enabled(kind) {
        report::step(format!("skipping {kind}"));
        return (SourceStatus::Disabled, Harvest::default());
    }
    report::step(format!("fetching {kind}"));
    match fetcher.fetch() {
        Ok(harvest) => {
            let status = SourceStatus::Fetched {
                count: harvest.publications.len(),
                skipped: harvest.skipped.len(),
            };
            (status, harvest)
        }
        Err(e) => {
            report::error(format!("{kind}: {e:#}"));
            (SourceStatus::Failed(format!("{e:#}")), Harvest::default())
        }
    }
}
