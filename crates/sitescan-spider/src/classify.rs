use serde::{Deserialize, Serialize};
use sitescan_types::{PageCrawlResult, PageType, Tier};
use url::Url;

/// Slug tables driving tier and page-type decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Path segments marking primary service pages (tier 1).
    pub primary_service_slugs: Vec<String>,
    /// Path segments marking key conversion landings (tier 1).
    pub key_landing_slugs: Vec<String>,
    /// Path segments marking secondary pages (tier 2).
    pub secondary_slugs: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            primary_service_slugs: ["services", "solutions", "products", "what-we-do"]
                .map(String::from)
                .to_vec(),
            key_landing_slugs: ["pricing", "quote", "get-started", "book"]
                .map(String::from)
                .to_vec(),
            secondary_slugs: [
                "contact",
                "about",
                "locations",
                "location",
                "service-area",
                "areas-we-serve",
                "team",
                "staff",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

/// Deterministic page classifier.
///
/// Works from the URL alone when no crawl snapshot is available (the
/// orchestrator uses that form to pre-budget the frontier) and refines with
/// the snapshot's title when one is. Same inputs always yield the same
/// `(Tier, PageType)`; the orchestrator's budget planning depends on that.
#[derive(Debug, Clone, Default)]
pub struct PageClassifier {
    config: ClassifierConfig,
}

impl PageClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, url: &Url, crawl: Option<&PageCrawlResult>) -> (Tier, PageType) {
        (self.tier(url, crawl), self.page_type(url))
    }

    /// Tiering rules, evaluated top to bottom, first match wins.
    fn tier(&self, url: &Url, crawl: Option<&PageCrawlResult>) -> Tier {
        let segments = path_segments(url);

        // 1. Homepage, primary service slug, or a service-bearing title.
        if is_home_path(&segments)
            || has_any_slug(&segments, &self.config.primary_service_slugs)
            || self.title_names_a_service(crawl)
        {
            return Tier::T1;
        }

        // 2. Key conversion landings.
        if has_any_slug(&segments, &self.config.key_landing_slugs) {
            return Tier::T1;
        }

        // 3. Contact/about/location band and secondary service patterns.
        if has_any_slug(&segments, &self.config.secondary_slugs)
            || self.is_secondary_service_path(&segments)
        {
            return Tier::T2;
        }

        // 4. Everything else: blog posts, archives, legal, press.
        Tier::T3
    }

    /// Page type is derived from the same slug sets, independently of tier.
    fn page_type(&self, url: &Url) -> PageType {
        let segments = path_segments(url);

        if is_home_path(&segments) {
            return PageType::Home;
        }
        if has_any_slug(&segments, &["service-area".into(), "areas-we-serve".into()]) {
            return PageType::ServiceArea;
        }
        if has_any_slug(&segments, &["location".into(), "locations".into()]) {
            return PageType::Location;
        }
        if has_any_slug(&segments, &["contact".into(), "contact-us".into()]) {
            return PageType::Contact;
        }
        if has_any_slug(&segments, &["about".into(), "about-us".into(), "team".into(), "staff".into()]) {
            return PageType::About;
        }
        if has_any_slug(&segments, &self.config.primary_service_slugs) {
            return PageType::Service;
        }
        if has_any_slug(&segments, &["blog".into(), "news".into(), "articles".into(), "post".into(), "posts".into()]) {
            return PageType::Blog;
        }
        if has_any_slug(&segments, &["privacy".into(), "privacy-policy".into(), "terms".into(), "legal".into(), "imprint".into()]) {
            return PageType::Legal;
        }
        PageType::Other
    }

    /// Brand+service title pattern: the page title names one of the primary
    /// service terms. Only usable when a crawl snapshot is present.
    fn title_names_a_service(&self, crawl: Option<&PageCrawlResult>) -> bool {
        let Some(title) = crawl.and_then(|c| c.title.as_deref()) else {
            return false;
        };
        let title = title.to_ascii_lowercase();
        self.config
            .primary_service_slugs
            .iter()
            .any(|slug| title.contains(&slug.replace('-', " ")) || title.contains(slug.as_str()))
    }

    /// A secondary service pattern: a service-like parent with a child slug,
    /// e.g. `/services/<anything>` already matched tier 1, but
    /// `/industries/<x>` or `/work/<x>` reads as a secondary offering page.
    fn is_secondary_service_path(&self, segments: &[String]) -> bool {
        segments
            .first()
            .map(|first| matches!(first.as_str(), "industries" | "work" | "portfolio" | "case-studies"))
            .unwrap_or(false)
    }
}

fn path_segments(url: &Url) -> Vec<String> {
    url.path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
        .collect()
}

fn is_home_path(segments: &[String]) -> bool {
    match segments {
        [] => true,
        [only] => only.starts_with("index."),
        _ => false,
    }
}

fn has_any_slug(segments: &[String], slugs: &[String]) -> bool {
    segments.iter().any(|seg| slugs.iter().any(|s| s == seg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PageClassifier {
        PageClassifier::default()
    }

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid URL")
    }

    #[test]
    fn homepage_is_t1_home() {
        let c = classifier();
        assert_eq!(c.classify(&url("https://example.com/"), None), (Tier::T1, PageType::Home));
        assert_eq!(c.classify(&url("https://example.com"), None), (Tier::T1, PageType::Home));
        assert_eq!(
            c.classify(&url("https://example.com/index.html"), None),
            (Tier::T1, PageType::Home)
        );
    }

    #[test]
    fn service_and_landing_pages_are_t1() {
        let c = classifier();
        assert_eq!(
            c.classify(&url("https://example.com/services/plumbing"), None).0,
            Tier::T1
        );
        assert_eq!(c.classify(&url("https://example.com/pricing"), None).0, Tier::T1);
        assert_eq!(c.classify(&url("https://example.com/get-started"), None).0, Tier::T1);
    }

    #[test]
    fn contact_page_is_t2_contact() {
        let c = classifier();
        assert_eq!(
            c.classify(&url("https://example.com/contact"), None),
            (Tier::T2, PageType::Contact)
        );
    }

    #[test]
    fn blog_post_is_t3_blog() {
        let c = classifier();
        assert_eq!(
            c.classify(&url("https://example.com/blog/post-17"), None),
            (Tier::T3, PageType::Blog)
        );
    }

    #[test]
    fn legal_page_is_t3_legal() {
        let c = classifier();
        assert_eq!(
            c.classify(&url("https://example.com/privacy-policy"), None),
            (Tier::T3, PageType::Legal)
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let c = classifier();
        let target = url("https://example.com/areas-we-serve/springfield");
        let first = c.classify(&target, None);
        for _ in 0..10 {
            assert_eq!(c.classify(&target, None), first);
        }
        assert_eq!(first, (Tier::T2, PageType::ServiceArea));
    }

    #[test]
    fn tier_and_page_type_are_independent() {
        let c = classifier();
        // A location page is T2 by slug but typed Location, not Contact.
        let (tier, page_type) = c.classify(&url("https://example.com/locations/downtown"), None);
        assert_eq!(tier, Tier::T2);
        assert_eq!(page_type, PageType::Location);
    }
}
