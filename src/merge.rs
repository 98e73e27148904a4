use std::collections::HashMap;

use crate::{
    doi::is_resolver_url,
    publication::{Provenance, Publication},
};

/// Which source wins when several report the same title.
///
/// Ordering is the priority: sources are merged in this order, the first record for a title
/// becomes the base entry and later ones may only fill in what it lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Previously persisted records (possibly edited by hand) first, then Google Scholar, which
    /// carries author lists and venues, then ORCID, which mostly contributes DOI links.
    #[default]
    PersistedFirst,
}

/// Origin of a batch handed to the [`Merger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Batch {
    Persisted,
    Fetched(SourceRank),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRank {
    Scholar,
    Orcid,
}

impl MergePolicy {
    /// Merge order of the fetched sources.
    pub fn order(self) -> &'static [Batch] {
        match self {
            MergePolicy::PersistedFirst => &[
                Batch::Persisted,
                Batch::Fetched(SourceRank::Scholar),
                Batch::Fetched(SourceRank::Orcid),
            ],
        }
    }

    pub fn rank_of(provenance: &Provenance) -> Option<SourceRank> {
        match provenance {
            Provenance::GoogleScholar => Some(SourceRank::Scholar),
            Provenance::Orcid => Some(SourceRank::Orcid),
            Provenance::Other(_) => None,
        }
    }
}

struct Entry {
    publication: Publication,
    /// Loaded from the previous output; never modified.
    pinned: bool,
}

/// Working map of the merge, keyed by normalized title, remembering insertion order.
pub struct Merger {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    fallback_author: Option<String>,
}

impl Merger {
    /// `fallback_author` is given to fresh records that arrive without any author.
    pub fn new(fallback_author: Option<String>) -> Self {
        Merger {
            entries: Vec::new(),
            index: HashMap::new(),
            fallback_author,
        }
    }

    /// Seed with previously persisted records. The first record for a title is kept verbatim and
    /// later records for that title are dropped.
    pub fn pin(&mut self, persisted: impl IntoIterator<Item = Publication>) {
        for publication in persisted {
            let key = publication.key();
            if self.index.contains_key(&key) {
                continue;
            }
            self.index.insert(key, self.entries.len());
            self.entries.push(Entry {
                publication,
                pinned: true,
            });
        }
    }

    /// Merge freshly fetched records.
    pub fn add(&mut self, fetched: impl IntoIterator<Item = Publication>) {
        for mut incoming in fetched {
            let key = incoming.key();
            match self.index.get(&key) {
                Some(&i) => {
                    let entry = &mut self.entries[i];
                    if !entry.pinned {
                        enrich(&mut entry.publication, incoming);
                    }
                }
                None => {
                    if incoming.authors.is_empty()
                        && let Some(name) = &self.fallback_author
                    {
                        incoming.authors.push(name.clone());
                    }
                    self.index.insert(key, self.entries.len());
                    self.entries.push(Entry {
                        publication: incoming,
                        pinned: false,
                    });
                }
            }
        }
    }

    /// The merged list, newest first. The sort is stable, so records of the same year stay in
    /// merge order.
    pub fn finish(self) -> Vec<Publication> {
        let mut out: Vec<Publication> = self.entries.into_iter().map(|e| e.publication).collect();
        out.sort_by(|a, b| b.year.cmp(&a.year));
        out
    }
}

/// Fill gaps of `existing` from `incoming`. A DOI resolver link replaces any other link; nothing
/// else that is already present is overwritten.
fn enrich(existing: &mut Publication, incoming: Publication) {
    let take_url = match (&existing.url, &incoming.url) {
        (None, Some(_)) => true,
        (Some(current), Some(url)) => !is_resolver_url(current) && is_resolver_url(url),
        _ => false,
    };
    if take_url {
        existing.url = incoming.url;
    }
    if existing.venue.is_none() {
        existing.venue = incoming.venue;
    }
    if existing.year == 0 {
        existing.year = incoming.year;
    }
}

/// Merge the given batches under `policy`. Fetched records are routed by their provenance;
/// records of any other provenance are merged after the ranked sources.
pub fn merge(
    policy: MergePolicy,
    persisted: Vec<Publication>,
    fetched: Vec<Vec<Publication>>,
    fallback_author: Option<String>,
) -> Vec<Publication> {
    let mut merger = Merger::new(fallback_author);
    let mut fetched: Vec<Publication> = fetched.into_iter().flatten().collect();
    let mut persisted = Some(persisted);

    for batch in policy.order() {
        match batch {
            Batch::Persisted => {
                if let Some(p) = persisted.take() {
                    merger.pin(p);
                }
            }
            Batch::Fetched(rank) => {
                let (now, later): (Vec<_>, Vec<_>) = fetched
                    .into_iter()
                    .partition(|p| MergePolicy::rank_of(&p.source) == Some(*rank));
                merger.add(now);
                fetched = later;
            }
        }
    }
    merger.add(fetched);
    merger.finish()
}
