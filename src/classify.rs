//! URL classification and canonicalization.
//!
//! Decides whether an archived URL is a listing page worth fetching, which
//! kind it is, and which site identifier it carries.

use std::collections::HashSet;

use regex::Regex;
use url::Url;

use crate::config::SiteProfile;
use crate::models::ContentCategory;

/// Outcome of classifying a content URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub category: ContentCategory,
    /// Numeric listing id for units, slug for aggregates.
    pub external_id: String,
}

/// Profile-driven URL classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    unit_re: Regex,
    aggregate_re: Regex,
    sale_segment: String,
    rejected: Vec<String>,
    reserved_slugs: HashSet<String>,
}

impl Classifier {
    pub fn new(profile: &SiteProfile) -> Result<Self, regex::Error> {
        let host = regex::escape(&profile.host.to_lowercase());
        let unit_re = Regex::new(&format!(
            r"(?i)^(?:https?://)?(?:www\.)?{}(?::\d+)?/({}|{})/(\d+)",
            host,
            regex::escape(&profile.sale_segment),
            regex::escape(&profile.rental_segment),
        ))?;
        let aggregate_re = Regex::new(&format!(
            r"(?i)^(?:https?://)?(?:www\.)?{}(?::\d+)?/{}/([\w-]+)",
            host,
            regex::escape(&profile.aggregate_segment),
        ))?;

        Ok(Self {
            unit_re,
            aggregate_re,
            sale_segment: profile.sale_segment.to_lowercase(),
            rejected: profile
                .rejected_substrings
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
            reserved_slugs: profile
                .reserved_slugs
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        })
    }

    /// Classify a URL, or `None` if it is not a content page.
    ///
    /// Deny-listed substrings win over path shape.
    pub fn classify(&self, url: &str) -> Option<Classified> {
        let lowered = url.to_lowercase();
        if self.rejected.iter().any(|s| lowered.contains(s.as_str())) {
            return None;
        }

        if let Some(caps) = self.unit_re.captures(url) {
            let category = if caps[1].eq_ignore_ascii_case(&self.sale_segment) {
                ContentCategory::UnitSale
            } else {
                ContentCategory::UnitRental
            };
            return Some(Classified {
                category,
                external_id: caps[2].to_string(),
            });
        }

        if let Some(caps) = self.aggregate_re.captures(url) {
            let slug = &caps[1];
            if self.reserved_slugs.contains(&slug.to_lowercase()) {
                return None;
            }
            return Some(Classified {
                category: ContentCategory::Aggregate,
                external_id: slug.to_string(),
            });
        }

        None
    }
}

/// Canonical form used as the queue key.
///
/// Lower-cases scheme and host, forces https, drops the default port, query
/// string, fragment and any trailing slash.
pub fn canonicalize(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(mut parsed) if parsed.has_host() => {
            if parsed.scheme() == "http" {
                let _ = parsed.set_scheme("https");
            }
            if parsed.port() == Some(443) {
                let _ = parsed.set_port(None);
            }
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.as_str().trim_end_matches('/').to_string()
        }
        _ => canonicalize_fallback(trimmed),
    }
}

fn canonicalize_fallback(url: &str) -> String {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    let url = url.trim_end_matches('/');
    match url.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("http://") => format!("https://{}", &url[7..]),
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(&SiteProfile::default()).unwrap()
    }

    #[test]
    fn test_classify_table() {
        let c = classifier();
        let cases: &[(&str, Option<(ContentCategory, &str)>)] = &[
            (
                "https://streeteasy.com/sale/12345",
                Some((ContentCategory::UnitSale, "12345")),
            ),
            (
                "http://www.streeteasy.com/rental/987",
                Some((ContentCategory::UnitRental, "987")),
            ),
            (
                "http://streeteasy.com:80/sale/555/",
                Some((ContentCategory::UnitSale, "555")),
            ),
            (
                "https://streeteasy.com/building/the-dakota",
                Some((ContentCategory::Aggregate, "the-dakota")),
            ),
            (
                "https://streeteasy.com/building/the-dakota/12a",
                Some((ContentCategory::Aggregate, "the-dakota")),
            ),
            ("https://streeteasy.com/building/search", None),
            ("https://streeteasy.com/building/featured", None),
            ("https://streeteasy.com/sale/abc", None),
            ("https://streeteasy.com/agents/bob", None),
            ("https://example.com/sale/12345", None),
            ("https://streeteasy.com/sale/12345?foo=bar", None),
            ("https://streeteasy.com/building/the-dakota/reviews", None),
        ];

        for (url, expected) in cases {
            let got = c.classify(url).map(|c| (c.category, c.external_id));
            let expected = expected.map(|(cat, id)| (cat, id.to_string()));
            assert_eq!(got, expected, "classify({})", url);
        }
    }

    #[test]
    fn test_search_rejected_regardless_of_shape() {
        let c = classifier();
        assert!(c.classify("https://streeteasy.com/sale/12345/search").is_none());
        assert!(c.classify("https://streeteasy.com/search/sale/1").is_none());
        assert!(c.classify("https://streeteasy.com/building/SEARCH").is_none());
    }

    #[test]
    fn test_canonicalize() {
        let cases = [
            ("http://StreetEasy.com/sale/1/", "https://streeteasy.com/sale/1"),
            ("https://streeteasy.com/sale/1?x=1#top", "https://streeteasy.com/sale/1"),
            ("HTTP://www.streeteasy.com:80/rental/2", "https://www.streeteasy.com/rental/2"),
            ("https://streeteasy.com:443/building/foo//", "https://streeteasy.com/building/foo"),
            ("https://streeteasy.com/building/Foo", "https://streeteasy.com/building/Foo"),
        ];
        for (input, expected) in cases {
            assert_eq!(canonicalize(input), expected, "canonicalize({})", input);
        }
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        for url in [
            "http://streeteasy.com/sale/1/",
            "https://www.streeteasy.com/building/x?y",
            "not a url/",
        ] {
            let once = canonicalize(url);
            assert_eq!(canonicalize(&once), once);
        }
    }

    #[test]
    fn test_canonicalize_fallback() {
        assert_eq!(canonicalize("streeteasy.com/sale/1/?a"), "streeteasy.com/sale/1");
    }
}
