use regex::Regex;
use sitescan_types::{PageRecord, PageType, Tier};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Shared site-wide knowledge handed to every rule.
///
/// Built once per audit from the full page set; rules never see each
/// other's output, only this snapshot.
#[derive(Debug, Clone, Default)]
pub struct SiteContext {
    pub page_count: usize,
    /// Every crawled page is tier 3 (a pure archive site). Drives the
    /// aggregator's demotion pass.
    pub all_t3: bool,
    pub has_sitemap: bool,
    pub has_contact_page: bool,
    pub has_about_page: bool,
    pub has_privacy_page: bool,
    pub any_page_has_form: bool,
    /// Distinct phone numbers (digits only) seen across the site.
    pub phone_variants: Vec<String>,
    /// Titles appearing on more than one page, with their counts.
    pub duplicate_titles: Vec<(String, usize)>,
    /// Meta descriptions appearing on more than one page, with counts.
    pub duplicate_descriptions: Vec<(String, usize)>,
}

impl SiteContext {
    pub fn build(pages: &[PageRecord], has_sitemap: bool) -> Self {
        let mut titles: HashMap<String, usize> = HashMap::new();
        let mut descriptions: HashMap<String, usize> = HashMap::new();
        let mut phones: Vec<String> = Vec::new();

        let mut ctx = SiteContext {
            page_count: pages.len(),
            all_t3: !pages.is_empty() && pages.iter().all(|p| p.tier == Tier::T3),
            has_sitemap,
            ..SiteContext::default()
        };

        for page in pages {
            match page.page_type {
                PageType::Contact => ctx.has_contact_page = true,
                PageType::About => ctx.has_about_page = true,
                PageType::Legal => ctx.has_privacy_page = true,
                _ => {}
            }
            if page.crawl.forms_count > 0 {
                ctx.any_page_has_form = true;
            }
            if let Some(title) = &page.crawl.title {
                *titles.entry(title.clone()).or_insert(0) += 1;
            }
            if let Some(description) = &page.crawl.meta_description {
                *descriptions.entry(description.clone()).or_insert(0) += 1;
            }
            for phone in extract_phones(&page.crawl.visible_text) {
                if !phones.contains(&phone) {
                    phones.push(phone);
                }
            }
        }

        ctx.phone_variants = phones;
        ctx.duplicate_titles = duplicates(titles);
        ctx.duplicate_descriptions = duplicates(descriptions);
        ctx
    }
}

fn duplicates(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut dupes: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    dupes.sort();
    dupes
}

/// Extract phone numbers as digit strings. North-American and generic
/// international shapes; good enough for NAP consistency, not validation.
pub fn extract_phones(text: &str) -> Vec<String> {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    let regex = PHONE.get_or_init(|| {
        Regex::new(r"(?:\+?\d{1,2}[\s.-]?)?(?:\(\d{3}\)|\d{3})[\s.-]?\d{3}[\s.-]?\d{4}")
            .unwrap_or_else(|e| panic!("phone regex is malformed: {}", e))
    });

    regex
        .find_iter(text)
        .map(|m| m.as_str().chars().filter(|c| c.is_ascii_digit()).collect::<String>())
        .filter(|digits| (10..=12).contains(&digits.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitescan_types::{FetchError, FetchMode, PageCrawlResult, UrlKey};

    fn record(path: &str, tier: Tier, page_type: PageType, text: &str) -> PageRecord {
        let key = UrlKey::parse(&format!("https://example.com{}", path)).expect("key");
        let mut crawl = PageCrawlResult::failed(key, FetchMode::Http, FetchError::Timeout);
        crawl.fetch_error = None;
        crawl.visible_text = text.to_string();
        crawl.word_count = text.split_whitespace().count();
        PageRecord {
            crawl,
            tier,
            page_type,
        }
    }

    #[test]
    fn phone_extraction_normalizes_formats() {
        let phones = extract_phones("Call (612) 555-0117 or 612.555.0117 today");
        assert_eq!(phones, vec!["6125550117", "6125550117"]);
        assert!(extract_phones("just words 123").is_empty());
    }

    #[test]
    fn context_flags_page_presence_and_archives() {
        let pages = vec![
            record("/", Tier::T1, PageType::Home, "Call (612) 555-0117"),
            record("/contact", Tier::T2, PageType::Contact, "Call (612) 555-0199"),
        ];
        let ctx = SiteContext::build(&pages, true);
        assert!(ctx.has_contact_page);
        assert!(!ctx.all_t3);
        assert!(ctx.has_sitemap);
        assert_eq!(ctx.phone_variants.len(), 2);

        let archive = vec![
            record("/blog/a", Tier::T3, PageType::Blog, "post"),
            record("/blog/b", Tier::T3, PageType::Blog, "post"),
        ];
        assert!(SiteContext::build(&archive, false).all_t3);
    }

    #[test]
    fn duplicate_titles_are_counted() {
        let mut a = record("/x", Tier::T3, PageType::Other, "");
        let mut b = record("/y", Tier::T3, PageType::Other, "");
        let mut c = record("/z", Tier::T3, PageType::Other, "");
        a.crawl.title = Some("Same".to_string());
        b.crawl.title = Some("Same".to_string());
        c.crawl.title = Some("Unique".to_string());
        let ctx = SiteContext::build(&[a, b, c], false);
        assert_eq!(ctx.duplicate_titles, vec![("Same".to_string(), 2)]);
    }
}
