use std::{fmt, thread, time::Duration};

use anyhow::{Context, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::{
    fetch::{Fetcher, Harvest, Skipped, USER_AGENT, agent},
    publication::{Provenance, Publication, normalize_ws, parse_year, split_authors},
    report,
};

const TIMEOUT: Duration = Duration::from_secs(15);
const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 20;

/// A Google Scholar profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorProfile {
    pub id: String,
    pub name: String,
}

/// One row of a profile's publication list. Author lists there are truncated, so every row is
/// filled with a detail request before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationStub {
    /// `citation_for_view` key of the detail page.
    pub citation_id: String,
    pub title: String,
    pub year: i32,
    pub venue: Option<String>,
}

/// Fields of a publication's detail page, as shown there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationDetail {
    pub title: Option<String>,
    pub url: Option<String>,
    pub authors: Option<String>,
    pub date: Option<String>,
    pub venue: Option<String>,
}

/// Access to Google Scholar. There is no official API; keeping the scraping behind this trait
/// lets the fetcher run against canned data and lets the scraper change without touching the
/// mapping.
pub trait ScholarClient {
    fn search_author_by_name(&self, name: &str) -> anyhow::Result<Option<AuthorProfile>>;
    fn search_author_by_id(&self, id: &str) -> anyhow::Result<Option<AuthorProfile>>;
    fn publications(&self, author: &AuthorProfile) -> anyhow::Result<Vec<PublicationStub>>;
    fn fill(&self, stub: &PublicationStub) -> anyhow::Result<PublicationDetail>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorQuery {
    Id(String),
    Name(String),
}

impl fmt::Display for AuthorQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorQuery::Id(id) => write!(f, "author id {id}"),
            AuthorQuery::Name(name) => write!(f, "author \"{name}\""),
        }
    }
}

pub struct ScholarFetcher<C> {
    client: C,
    query: AuthorQuery,
    delay: Duration,
}

impl<C: ScholarClient> ScholarFetcher<C> {
    pub fn new(client: C, query: AuthorQuery, delay: Duration) -> Self {
        ScholarFetcher {
            client,
            query,
            delay,
        }
    }
}

impl<C: ScholarClient> Fetcher for ScholarFetcher<C> {
    fn provenance(&self) -> Provenance {
        Provenance::GoogleScholar
    }

    fn fetch(&self) -> anyhow::Result<Harvest> {
        let author = match &self.query {
            AuthorQuery::Id(id) => self.client.search_author_by_id(id),
            AuthorQuery::Name(name) => self.client.search_author_by_name(name),
        }
        .with_context(|| format!("failed to look up {} on Google Scholar", self.query))?
        .ok_or_else(|| anyhow!("{} not found on Google Scholar", self.query))?;
        report::info(format!("found profile {} ({})", author.name, author.id));

        let stubs = self
            .client
            .publications(&author)
            .with_context(|| format!("failed to list publications of {}", author.name))?;

        let bar = report::progress(stubs.len(), "scholar");
        let mut harvest = Harvest::default();
        for (i, stub) in stubs.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            bar.set_message(stub.title.clone());
            match self.client.fill(stub) {
                Ok(detail) => harvest.publications.push(to_publication(stub, detail)),
                Err(e) => {
                    let skipped =
                        Skipped::new(format!("Scholar publication \"{}\"", stub.title), format!("{e:#}"));
                    bar.suspend(|| report::skip(&skipped.what, &skipped.reason));
                    harvest.skipped.push(skipped);
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();
        Ok(harvest)
    }
}

/// Combine a list row with its detail page. The detail page wins; the row fills gaps.
pub fn to_publication(stub: &PublicationStub, detail: PublicationDetail) -> Publication {
    let title = detail
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| stub.title.clone());
    let mut publication = Publication::new(title, Provenance::GoogleScholar);

    // Scholar dates look like "2020/5/12" or just "2020".
    let year = detail
        .date
        .as_deref()
        .and_then(|d| d.split('/').next())
        .map(parse_year)
        .unwrap_or(0);
    publication.year = if year != 0 { year } else { stub.year };

    publication.url = detail.url;
    publication.venue = detail.venue.or_else(|| stub.venue.clone());
    publication.authors = detail.authors.as_deref().map(split_authors).unwrap_or_default();
    publication
}

/// Scrapes the public `scholar.google.com/citations` pages.
pub struct HtmlScholarClient {
    base: Url,
    agent: ureq::Agent,
}

impl HtmlScholarClient {
    pub fn new(base: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base).with_context(|| format!("invalid Scholar base URL {base}"))?;
        Ok(HtmlScholarClient {
            base,
            agent: agent(TIMEOUT),
        })
    }

    fn citations_url(&self, params: &[(&str, &str)]) -> anyhow::Result<Url> {
        let mut url = self.base.join("/citations")?;
        url.query_pairs_mut()
            .append_pair("hl", "en")
            .extend_pairs(params);
        Ok(url)
    }

    /// Fetch a page; a 404 is `None`.
    fn get_page(&self, url: &Url) -> anyhow::Result<Option<String>> {
        let res = self
            .agent
            .get(url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept-Language", "en")
            .call()
            .with_context(|| format!("failed request for URL {url}"))?;

        let status = res.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if status.as_u16() == 429 {
            return Err(anyhow!("Google Scholar is rate limiting requests (HTTP 429)"));
        }
        if !status.is_success() {
            return Err(anyhow!("Google Scholar returned HTTP {} for {url}", status.as_u16()));
        }

        let body = res.into_body().read_to_string().context("read body")?;
        if is_captcha(&body) {
            return Err(anyhow!("Google Scholar answered with a CAPTCHA page"));
        }
        Ok(Some(body))
    }

    fn get(&self, url: &Url) -> anyhow::Result<String> {
        self.get_page(url)?
            .ok_or_else(|| anyhow!("Google Scholar returned HTTP 404 for {url}"))
    }
}

impl ScholarClient for HtmlScholarClient {
    fn search_author_by_name(&self, name: &str) -> anyhow::Result<Option<AuthorProfile>> {
        let url = self.citations_url(&[("view_op", "search_authors"), ("mauthors", name)])?;
        let html = self.get(&url)?;
        Ok(parse_author_search(&html))
    }

    fn search_author_by_id(&self, id: &str) -> anyhow::Result<Option<AuthorProfile>> {
        let url = self.citations_url(&[("user", id)])?;
        // Unknown profiles are a 404, not a failure.
        let Some(html) = self.get_page(&url)? else {
            return Ok(None);
        };
        Ok(parse_profile_name(&html).map(|name| AuthorProfile {
            id: id.to_string(),
            name,
        }))
    }

    fn publications(&self, author: &AuthorProfile) -> anyhow::Result<Vec<PublicationStub>> {
        let mut out = Vec::new();
        let page_size = PAGE_SIZE.to_string();
        for page in 0..MAX_PAGES {
            let cstart = (page * PAGE_SIZE).to_string();
            let url = self.citations_url(&[
                ("user", author.id.as_str()),
                ("cstart", cstart.as_str()),
                ("pagesize", page_size.as_str()),
                ("sortby", "pubdate"),
            ])?;
            let html = self.get(&url)?;
            let rows = parse_profile_rows(&html);
            let done = rows.len() < PAGE_SIZE;
            out.extend(rows);
            if done {
                break;
            }
        }
        Ok(out)
    }

    fn fill(&self, stub: &PublicationStub) -> anyhow::Result<PublicationDetail> {
        let url = self.citations_url(&[
            ("view_op", "view_citation"),
            ("citation_for_view", stub.citation_id.as_str()),
        ])?;
        let html = self.get(&url)?;
        let mut detail = parse_citation(&html);
        detail.url = detail
            .url
            .and_then(|href| absolutise(&self.base, &href).ok())
            .map(String::from);
        Ok(detail)
    }
}

// ----------------------------
// HTML extraction
// ----------------------------

static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)([a-zA-Z_:\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?is)<a\b([^>]*)>(.*?)</a>"#).unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?s)<[^>]*>"#).unwrap());
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});"#).unwrap());

static AUTHOR_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<h3\b[^>]*class\s*=\s*["']gs_ai_name["'][^>]*>(.*?)</h3>"#).unwrap());
static USER_PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[?&](?:amp;)?user=([A-Za-z0-9_-]+)"#).unwrap());
static PROFILE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<div\b[^>]*id\s*=\s*["']gsc_prf_in["'][^>]*>(.*?)</div>"#).unwrap());
static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<tr\b[^>]*class\s*=\s*["']gsc_a_tr["'][^>]*>(.*?)</tr>"#).unwrap());
static GRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<div\b[^>]*class\s*=\s*["']gs_gray["'][^>]*>(.*?)</div>"#).unwrap());
static OPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<span\b[^>]*class\s*=\s*["']gs_oph["'][^>]*>.*?</span>"#).unwrap());
static ROW_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<span\b[^>]*class\s*=\s*["'][^"']*\bgsc_a_h\b[^"']*["'][^>]*>(.*?)</span>"#).unwrap()
});
static CITATION_PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"citation_for_view=([^&"'\s]+)"#).unwrap());
static OCI_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<div\b[^>]*id\s*=\s*["']gsc_oci_title["'][^>]*>(.*?)</div>"#).unwrap());
static OCI_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<div\b[^>]*class\s*=\s*["']gsc_oci_field["'][^>]*>(.*?)</div>\s*<div\b[^>]*class\s*=\s*["']gsc_oci_value["'][^>]*>(.*?)</div>"#,
    )
    .unwrap()
});

/// Detail page field labels that name where a work appeared, in order of preference.
const VENUE_FIELDS: &[&str] = &["journal", "conference", "book", "source", "publisher"];

fn is_captcha(html: &str) -> bool {
    html.contains("gs_captcha") || html.contains("id=\"captcha-form\"") || html.contains("not a robot")
}

/// First author hit on a `view_op=search_authors` page.
pub fn parse_author_search(html: &str) -> Option<AuthorProfile> {
    AUTHOR_NAME_RE.captures_iter(html).find_map(|c| {
        let inner = c.get(1)?.as_str();
        let anchor = ANCHOR_RE.captures(inner)?;
        let href = attr_value(anchor.get(1)?.as_str(), "href")?;
        let id = USER_PARAM_RE.captures(&href)?.get(1)?.as_str().to_string();
        let name = text_of(anchor.get(2)?.as_str());
        Some(AuthorProfile { id, name })
    })
}

/// Display name on a profile page.
pub fn parse_profile_name(html: &str) -> Option<String> {
    PROFILE_NAME_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| text_of(m.as_str()))
        .filter(|n| !n.is_empty())
}

/// Publication rows of one profile page. Rows without a title link (e.g. the "no articles"
/// placeholder) are ignored.
pub fn parse_profile_rows(html: &str) -> Vec<PublicationStub> {
    ROW_RE
        .captures_iter(html)
        .filter_map(|c| parse_profile_row(c.get(1)?.as_str()))
        .collect()
}

fn parse_profile_row(row: &str) -> Option<PublicationStub> {
    let (attrs, title) = ANCHOR_RE.captures_iter(row).find_map(|a| {
        let attrs = a.get(1)?.as_str();
        let class = attr_value(attrs, "class")?;
        class
            .split_whitespace()
            .any(|c| c == "gsc_a_at")
            .then(|| (attrs.to_string(), a.get(2).map(|m| m.as_str()).unwrap_or_default()))
    })?;

    let href = attr_value(&attrs, "href")?;
    let citation_id = CITATION_PARAM_RE.captures(&href)?.get(1)?.as_str().to_string();
    let title = text_of(title);
    if title.is_empty() {
        return None;
    }

    let venue = GRAY_RE
        .captures_iter(row)
        .nth(1)
        .and_then(|c| c.get(1))
        .map(|m| text_of(&OPH_RE.replace_all(m.as_str(), "")))
        .filter(|v| !v.is_empty());

    let year = ROW_YEAR_RE
        .captures(row)
        .and_then(|c| c.get(1))
        .map(|m| parse_year(&text_of(m.as_str())))
        .unwrap_or(0);

    Some(PublicationStub {
        citation_id,
        title,
        year,
        venue,
    })
}

/// Fields of a `view_op=view_citation` page.
pub fn parse_citation(html: &str) -> PublicationDetail {
    let mut detail = PublicationDetail::default();

    if let Some(inner) = OCI_TITLE_RE.captures(html).and_then(|c| c.get(1)) {
        let inner = inner.as_str();
        if let Some(anchor) = ANCHOR_RE.captures(inner) {
            detail.url = anchor
                .get(1)
                .and_then(|a| attr_value(a.as_str(), "href"))
                .filter(|h| !h.is_empty());
        }
        detail.title = Some(text_of(inner)).filter(|t| !t.is_empty());
    }

    let mut venues: Vec<(usize, String)> = Vec::new();
    for c in OCI_FIELD_RE.captures_iter(html) {
        let (Some(field), Some(value)) = (c.get(1), c.get(2)) else {
            continue;
        };
        let field = text_of(field.as_str()).to_ascii_lowercase();
        let value = text_of(value.as_str());
        if value.is_empty() {
            continue;
        }
        match field.as_str() {
            "authors" | "inventors" => {
                detail.authors.get_or_insert(value);
            }
            "publication date" => {
                detail.date.get_or_insert(value);
            }
            other => {
                if let Some(rank) = VENUE_FIELDS.iter().position(|f| *f == other) {
                    venues.push((rank, value));
                }
            }
        }
    }
    detail.venue = venues.into_iter().min_by_key(|(rank, _)| *rank).map(|(_, v)| v);
    detail
}

fn attr_value(attrs: &str, key: &str) -> Option<String> {
    ATTR_RE.captures_iter(attrs).find_map(|cap| {
        if !cap[1].eq_ignore_ascii_case(key) {
            return None;
        }
        cap.get(2)
            .or_else(|| cap.get(3))
            .map(|m| decode_entities(m.as_str()))
    })
}

/// Visible text of an HTML fragment: tags removed, entities decoded, whitespace collapsed.
fn text_of(fragment: &str) -> String {
    normalize_ws(&decode_entities(&TAG_RE.replace_all(fragment, "")))
}

fn decode_entities(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let ent = &caps[1];
            let decoded = if let Some(hex) = ent.strip_prefix("#x").or_else(|| ent.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = ent.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match ent {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    "hellip" => Some('…'),
                    "ndash" => Some('–'),
                    "mdash" => Some('—'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn absolutise(base: &Url, cand: &str) -> anyhow::Result<Url> {
    match Url::parse(cand) {
        Ok(u) => Ok(u),
        Err(_) => base
            .join(cand)
            .with_context(|| format!("cannot resolve link {cand}")),
    }
}
