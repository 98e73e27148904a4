use once_cell::sync::Lazy;
use regex::Regex;

const RESOLVER: &str = "https://doi.org/";

/// A DOI as reported by a metadata source, stripped of textual and resolver prefixes.
///
/// ORCID normalises most DOIs already, but hand-entered works still show up as `doi:...` or as
/// full resolver links, so those wrappers are peeled off here. Anything that remains is kept as
/// the DOI; registries do not agree on a stricter syntax than "prefix/suffix".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doi(String);

impl Doi {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut s = raw.trim();

        if let Some(rest) = s
            .strip_prefix("doi:")
            .or_else(|| s.strip_prefix("DOI:"))
            .or_else(|| s.strip_prefix("urn:doi:"))
            .or_else(|| s.strip_prefix("URN:DOI:"))
        {
            s = rest.trim_start();
        }

        if let Some(rest) = s
            .strip_prefix("https://doi.org/")
            .or_else(|| s.strip_prefix("http://doi.org/"))
            .or_else(|| s.strip_prefix("https://dx.doi.org/"))
            .or_else(|| s.strip_prefix("http://dx.doi.org/"))
        {
            s = rest;
        }

        // Sentence punctuation picked up from prose. Brackets stay; DOIs may end in `)`.
        s = s.trim_end_matches(['.', ',', ';']);

        if s.is_empty() {
            return None;
        }
        Some(Doi(s.to_string()))
    }

    /// Resolver link for this DOI, `https://doi.org/<doi>`, with the DOI appended verbatim.
    pub fn to_url(&self) -> String {
        format!("{RESOLVER}{}", self.0)
    }
}

/// Whether `url` points at a DOI resolver rather than a publisher or repository page.
pub fn is_resolver_url(url: &str) -> bool {
    static DOI_IN_URL: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)^https?://(?:dx\.)?doi\.org/\S+").unwrap());
    DOI_IN_URL.is_match(url.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::Strategy;

    // Generate a DOI core like "10.12345/ABC-123"
    fn doi_core() -> impl Strategy<Value = String> {
        (
            proptest::collection::vec(
                proptest::sample::select(('0'..='9').collect::<Vec<_>>()),
                1..=9,
            )
            .prop_map(|v| v.into_iter().collect::<String>()),
            "[A-Za-z0-9][-._;()<>/:A-Za-z0-9]{0,40}[A-Za-z0-9)>]",
        )
            .prop_map(|(digits, suffix)| format!("10.{digits}/{suffix}"))
    }

    #[test]
    fn to_url_uses_resolver() {
        let doi = Doi::parse("10.1/abc").unwrap();
        assert_eq!(doi.to_url(), "https://doi.org/10.1/abc");
    }

    #[test]
    fn to_url_is_plain_concatenation_for_generated_dois() {
        proptest::proptest!(|(full in doi_core())| {
            let doi = Doi::parse(&full).expect("should parse");
            proptest::prop_assert_eq!(doi.to_url(), format!("https://doi.org/{full}"));
        })
    }

    #[test]
    fn parse_with_textual_prefixes() {
        let prefixes = vec!["doi:", "DOI:", "urn:doi:", "URN:DOI:", "https://doi.org/", "http://dx.doi.org/"];
        proptest::proptest!(|(full in doi_core(), pre in proptest::sample::select(prefixes.clone()))| {
            let decorated = format!("{pre}{full}");
            let d = Doi::parse(&decorated).expect("should parse with prefix");
            proptest::prop_assert_eq!(d, Doi(full));
        })
    }

    #[test]
    fn parse_trims_trailing_punctuation() {
        assert_eq!(Doi::parse(" 10.1000/182. ").unwrap(), Doi("10.1000/182".into()));
    }

    #[test]
    fn parse_rejects_empty() {
        assert!(Doi::parse("").is_none());
        assert!(Doi::parse("doi:  ").is_none());
    }

    const SICI: &str = "10.1002/(SICI)1097-4636(199706)35:4<346::AID-JBM8>3.0.CO;2-I";

    #[test]
    fn to_url_keeps_sici_characters() {
        let doi = Doi::parse(SICI).unwrap();
        assert_eq!(doi.to_url(), format!("https://doi.org/{SICI}"));
    }

    #[test]
    fn parse_keeps_closing_bracket() {
        assert_eq!(
            Doi::parse("10.1000/table(2)").unwrap(),
            Doi("10.1000/table(2)".into())
        );
        assert_eq!(Doi::parse("doi:10.1000/182;").unwrap(), Doi("10.1000/182".into()));
    }

    #[test]
    fn resolver_urls_are_recognised() {
        assert!(is_resolver_url("https://doi.org/10.1/abc"));
        assert!(is_resolver_url("http://dx.doi.org/10.1/abc"));
        assert!(is_resolver_url("HTTPS://DOI.ORG/10.1/abc"));
        assert!(!is_resolver_url("https://arxiv.org/abs/1810.04805"));
        assert!(!is_resolver_url("https://doi.org/"));
        assert!(!is_resolver_url("https://example.com/?u=https://doi.org/10.1/x"));
    }
}
