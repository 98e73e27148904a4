use std::time::Duration;

use anyhow::{Context, anyhow};
use serde_json::Value;

use crate::{
    doi::Doi,
    fetch::{Fetcher, Harvest, Skipped, USER_AGENT, agent},
    publication::{Provenance, Publication, parse_year},
    report,
};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Work summaries of one ORCID record, via the public API.
pub struct OrcidFetcher {
    api: String,
    orcid_id: String,
}

impl OrcidFetcher {
    pub fn new(api: impl Into<String>, orcid_id: impl Into<String>) -> Self {
        OrcidFetcher {
            api: api.into(),
            orcid_id: orcid_id.into(),
        }
    }

    fn works_url(&self) -> String {
        format!("{}/{}/works", self.api.trim_end_matches('/'), self.orcid_id)
    }
}

impl Fetcher for OrcidFetcher {
    fn provenance(&self) -> Provenance {
        Provenance::Orcid
    }

    fn fetch(&self) -> anyhow::Result<Harvest> {
        let url = self.works_url();
        let res = agent(TIMEOUT)
            .get(url.as_str())
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()
            .with_context(|| format!("failed request for ORCID works of {}", self.orcid_id))?;

        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!(
                "ORCID returned HTTP {} for {}",
                status.as_u16(),
                self.orcid_id
            ));
        }

        let body = res
            .into_body()
            .read_to_string()
            .context("failed to read ORCID response body")?;
        let json: Value =
            serde_json::from_str(&body).context("ORCID response is not valid JSON")?;

        let harvest = parse_works(&json);
        for s in &harvest.skipped {
            report::skip(&s.what, &s.reason);
        }
        Ok(harvest)
    }
}

/// Map an ORCID `works` document to publications.
///
/// Every group lists the same work as reported by different sources. All summaries are kept; the
/// merge collapses repeated titles onto the first and fills its gaps from the others.
pub fn parse_works(json: &Value) -> Harvest {
    let mut harvest = Harvest::default();

    let groups = json.get("group").and_then(Value::as_array);
    for (gi, group) in groups.into_iter().flatten().enumerate() {
        let summaries = group.get("work-summary").and_then(Value::as_array);
        for (si, summary) in summaries.into_iter().flatten().enumerate() {
            match parse_summary(summary) {
                Ok(publication) => harvest.publications.push(publication),
                Err(e) => harvest.skipped.push(Skipped::new(
                    describe_summary(summary, gi, si),
                    format!("{e:#}"),
                )),
            }
        }
    }
    harvest
}

/// One work summary. Fails only when the title is missing.
pub fn parse_summary(summary: &Value) -> anyhow::Result<Publication> {
    let title = summary
        .pointer("/title/title/value")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing title"))?;

    let mut publication = Publication::new(title, Provenance::Orcid);

    publication.year = match summary.pointer("/publication-date/year/value") {
        Some(Value::String(s)) => parse_year(s),
        Some(Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()).unwrap_or(0),
        _ => 0,
    };

    publication.url = summary
        .pointer("/url/value")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if publication.url.is_none()
        && let Some(doi) = external_doi(summary)
    {
        publication.url = Some(doi.to_url());
    }

    publication.venue = summary
        .pointer("/journal-title/value")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(publication)
}

/// First DOI among the summary's external identifiers.
fn external_doi(summary: &Value) -> Option<Doi> {
    summary
        .pointer("/external-ids/external-id")
        .and_then(Value::as_array)?
        .iter()
        .filter(|id| {
            id.get("external-id-type")
                .and_then(Value::as_str)
                .is_some_and(|t| t.eq_ignore_ascii_case("doi"))
        })
        .find_map(|id| {
            id.pointer("/external-id-normalized/value")
                .and_then(Value::as_str)
                .or_else(|| id.get("external-id-value").and_then(Value::as_str))
                .and_then(Doi::parse)
        })
}

fn describe_summary(summary: &Value, group: usize, index: usize) -> String {
    match summary.get("put-code").and_then(Value::as_i64) {
        Some(code) => format!("ORCID work {code}"),
        None => format!("ORCID group {group} summary {index}"),
    }
}

/// Check the shape and the ISO 7064 MOD 11-2 check character of an ORCID iD.
pub fn validate_orcid_id(id: &str) -> bool {
    let blocks: Vec<&str> = id.split('-').collect();
    if blocks.len() != 4 || blocks.iter().any(|b| b.len() != 4 || !b.is_ascii()) {
        return false;
    }
    let chars: Vec<char> = blocks.concat().chars().collect();
    let (body, check) = chars.split_at(15);
    if !body.iter().all(char::is_ascii_digit) {
        return false;
    }
    let total = body
        .iter()
        .filter_map(|c| c.to_digit(10))
        .fold(0, |acc, d| (acc + d) * 2);
    let expected = match (12 - total % 11) % 11 {
        10 => 'X',
        n => char::from_digit(n, 10).unwrap_or('?'),
    };
    check[0] == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fetch::testing::serve,
        merge::{MergePolicy, merge},
    };
    use serde_json::json;

    fn summary(title: Option<&str>, year: Option<&str>, url: Option<&str>, doi: Option<&str>) -> Value {
        let mut s = json!({ "put-code": 1 });
        if let Some(t) = title {
            s["title"] = json!({ "title": { "value": t } });
        }
        if let Some(y) = year {
            s["publication-date"] = json!({ "year": { "value": y } });
        }
        s["url"] = match url {
            Some(u) => json!({ "value": u }),
            None => Value::Null,
        };
        if let Some(d) = doi {
            s["external-ids"] = json!({
                "external-id": [
                    { "external-id-type": "issn", "external-id-value": "1234-5678" },
                    { "external-id-type": "doi", "external-id-value": d }
                ]
            });
        }
        s
    }

    #[test]
    fn doi_becomes_resolver_url() {
        let p = parse_summary(&summary(Some("Deep Learning for X"), Some("2020"), None, Some("10.1/abc")))
            .unwrap();
        assert_eq!(p.title, "Deep Learning for X");
        assert_eq!(p.year, 2020);
        assert_eq!(p.url.as_deref(), Some("https://doi.org/10.1/abc"));
        assert_eq!(p.source, Provenance::Orcid);
        assert!(p.authors.is_empty());
    }

    #[test]
    fn direct_url_wins_over_doi() {
        let p = parse_summary(&summary(
            Some("T"),
            Some("2020"),
            Some("https://example.org/paper"),
            Some("10.1/abc"),
        ))
        .unwrap();
        assert_eq!(p.url.as_deref(), Some("https://example.org/paper"));
    }

    #[test]
    fn normalized_doi_is_preferred() {
        let s = json!({
            "title": { "title": { "value": "T" } },
            "external-ids": { "external-id": [{
                "external-id-type": "DOI",
                "external-id-value": "https://doi.org/10.1/ABC",
                "external-id-normalized": { "value": "10.1/abc" }
            }]}
        });
        let p = parse_summary(&s).unwrap();
        assert_eq!(p.url.as_deref(), Some("https://doi.org/10.1/abc"));
    }

    #[test]
    fn missing_or_bad_year_is_zero() {
        let p = parse_summary(&summary(Some("T"), None, None, None)).unwrap();
        assert_eq!(p.year, 0);
        let p = parse_summary(&summary(Some("T"), Some("circa 2020"), None, None)).unwrap();
        assert_eq!(p.year, 0);
        assert_eq!(p.url, None);
    }

    #[test]
    fn venue_from_journal_title() {
        let mut s = summary(Some("T"), Some("2021"), None, None);
        s["journal-title"] = json!({ "value": "Journal of X" });
        assert_eq!(parse_summary(&s).unwrap().venue.as_deref(), Some("Journal of X"));
        s["journal-title"] = Value::Null;
        assert_eq!(parse_summary(&s).unwrap().venue, None);
    }

    #[test]
    fn missing_title_is_skipped_and_processing_continues() {
        let doc = json!({
            "group": [
                { "work-summary": [summary(None, Some("2019"), None, None)] },
                { "work-summary": [summary(Some("Second"), Some("2018"), None, None)] }
            ]
        });
        let harvest = parse_works(&doc);
        assert_eq!(harvest.publications.len(), 1);
        assert_eq!(harvest.publications[0].title, "Second");
        assert_eq!(harvest.skipped.len(), 1);
        assert_eq!(harvest.skipped[0].what, "ORCID work 1");
        assert!(harvest.skipped[0].reason.contains("missing title"));
    }

    #[test]
    fn sparse_first_summary_is_filled_by_later_one() {
        let mut rich = summary(Some("Deep Learning for X"), Some("2020"), None, Some("10.1/abc"));
        rich["journal-title"] = json!({ "value": "Journal of X" });
        let doc = json!({
            "group": [{ "work-summary": [
                summary(Some("Deep Learning for X"), Some("2020"), None, None),
                rich
            ]}]
        });
        let harvest = parse_works(&doc);
        assert_eq!(harvest.publications.len(), 2);

        let merged = merge(MergePolicy::default(), vec![], vec![harvest.publications], None);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].url.as_deref(), Some("https://doi.org/10.1/abc"));
        assert_eq!(merged[0].venue.as_deref(), Some("Journal of X"));
        assert_eq!(merged[0].year, 2020);
    }

    #[test]
    fn empty_document_yields_empty_harvest() {
        assert_eq!(parse_works(&json!({})), Harvest::default());
        assert_eq!(parse_works(&json!({ "group": [] })), Harvest::default());
    }

    #[test]
    fn any_doi_yields_resolver_url() {
        proptest::proptest!(|(doi in "10\\.[0-9]{1,9}/[A-Za-z0-9][-._;()/:A-Za-z0-9]{0,30}[A-Za-z0-9]", title in "[A-Za-z][A-Za-z ]{0,30}")| {
            let p = parse_summary(&summary(Some(title.as_str()), Some("2000"), None, Some(doi.as_str()))).unwrap();
            proptest::prop_assert_eq!(p.url, Some(format!("https://doi.org/{doi}")));
        })
    }

    #[test]
    fn orcid_check_digit() {
        assert!(validate_orcid_id("0000-0001-8931-453X"));
        assert!(validate_orcid_id("0000-0002-1825-0097"));
        assert!(!validate_orcid_id("0000-0002-1825-0098"));
        assert!(!validate_orcid_id("0000000218250097"));
        assert!(!validate_orcid_id("000a-0002-1825-0097"));
        assert!(!validate_orcid_id(""));
    }

    const WORKS_JSON: &str = r#"{"group":[{"work-summary":[{"put-code":7,"title":{"title":{"value":"Served Work"}},"publication-date":{"year":{"value":"2022"}}}]}]}"#;

    #[test]
    fn works_are_fetched_over_http() {
        let base = serve(vec![(200, WORKS_JSON)]);
        let harvest = OrcidFetcher::new(base, "0000-0002-1825-0097").fetch().unwrap();
        assert_eq!(harvest.publications.len(), 1);
        assert_eq!(harvest.publications[0].title, "Served Work");
        assert_eq!(harvest.publications[0].year, 2022);
    }

    #[test]
    fn error_status_fails_the_source() {
        let base = serve(vec![(500, "upstream down")]);
        let err = OrcidFetcher::new(base, "0000-0002-1825-0097").fetch().unwrap_err();
        assert!(err.to_string().contains("HTTP 500"), "{err:#}");
    }

    #[test]
    fn non_json_body_fails_the_source() {
        let base = serve(vec![(200, "<html>maintenance</html>")]);
        let err = OrcidFetcher::new(base, "0000-0002-1825-0097").fetch().unwrap_err();
        assert!(format!("{err:#}").contains("not valid JSON"));
    }
}
