//! Child unit links on aggregate (building) pages.

use std::collections::HashSet;

use regex::Regex;

use super::ExtractError;
use crate::classify::canonicalize;
use crate::config::SiteProfile;

#[derive(Debug, Clone)]
pub struct ChildLinkExtractor {
    pattern: Regex,
    host: String,
}

impl ChildLinkExtractor {
    pub fn new(profile: &SiteProfile) -> Result<Self, ExtractError> {
        let host = profile.host.to_lowercase();
        let pattern = Regex::new(&format!(
            r"(?i)(?:https?://(?:www\.)?{})?/({}|{})/(\d+)",
            regex::escape(&host),
            regex::escape(&profile.rental_segment),
            regex::escape(&profile.sale_segment),
        ))?;
        Ok(Self { pattern, host })
    }

    /// Unit URLs referenced by the page, first occurrence order, without the page itself.
    pub fn extract(&self, content: &str, page_url: &str) -> Vec<String> {
        let own = host_agnostic(&canonicalize(page_url));
        let mut seen = HashSet::new();
        self.pattern
            .captures_iter(content)
            .map(|caps| {
                format!(
                    "https://www.{}/{}/{}",
                    self.host,
                    caps[1].to_lowercase(),
                    &caps[2]
                )
            })
            .filter(|url| host_agnostic(url) != own)
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }
}

fn host_agnostic(url: &str) -> String {
    url.replacen("://www.", "://", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_links_are_canonical_and_unique() {
        let links = ChildLinkExtractor::new(&SiteProfile::default()).unwrap();
        let html = r#"
            <a href="/sale/101">Unit 1A</a>
            <a href="https://streeteasy.com/rental/202?featured=1">Unit 2B</a>
            <a href="http://www.streeteasy.com/sale/101">Unit 1A again</a>
            <a href="/building/the-dakota">Self</a>
            <a href="/sale/abc">Bad</a>
        "#;
        assert_eq!(
            links.extract(html, "https://streeteasy.com/building/the-dakota"),
            vec![
                "https://www.streeteasy.com/sale/101",
                "https://www.streeteasy.com/rental/202"
            ]
        );
    }

    #[test]
    fn test_own_url_excluded() {
        let links = ChildLinkExtractor::new(&SiteProfile::default()).unwrap();
        let html = r#"<a href="/sale/7">me</a><a href="/sale/8">other</a>"#;
        assert_eq!(
            links.extract(html, "https://streeteasy.com/sale/7"),
            vec!["https://www.streeteasy.com/sale/8"]
        );
    }
}
