use clap::Parser;

use crate::{
    cli::Cli,
    config::Config,
    fetch::{
        orcid::OrcidFetcher,
        scholar::{AuthorQuery, HtmlScholarClient, ScholarFetcher},
    },
    pipeline::SourceStatus,
};

mod cli;
mod config;
mod doi;
mod fetch;
mod merge;
mod pipeline;
mod publication;
mod report;
mod store;

fn main() -> anyhow::Result<()> {
    let config = Config::from(Cli::parse());

    let orcid = OrcidFetcher::new(&config.orcid_api, &config.orcid_id);
    let query = match &config.scholar_id {
        Some(id) => AuthorQuery::Id(id.clone()),
        None => AuthorQuery::Name(config.author_name.clone()),
    };
    let scholar = ScholarFetcher::new(
        HtmlScholarClient::new(&config.scholar_base)?,
        query,
        config.scholar_delay,
    );

    let summary = pipeline::run(&config, &orcid, &scholar)?;

    for source in &summary.sources {
        match &source.status {
            SourceStatus::Fetched { count, skipped } => report::tally(&source.source, *count, *skipped),
            SourceStatus::Failed(reason) => report::info(format!("{}: failed ({reason})", source.source)),
            SourceStatus::Disabled => {}
        }
    }
    if summary.kept > 0 {
        report::info(format!("{} publications carried over from the previous run", summary.kept));
    }
    match summary.written {
        Some(n) => println!("Saved {n} publications to {}", summary.output.display()),
        None => println!("No publications saved; {} left unchanged", summary.output.display()),
    }
    Ok(())
}
