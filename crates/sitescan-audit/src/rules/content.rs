use crate::context::SiteContext;
use crate::rule::Rule;
use sitescan_types::{
    AuditFactor, Evidence, FactorCategory, Importance, PageRecord, PageType, Verdict,
};

/// Word count under which a content page reads as thin.
const THIN_WORDS: usize = 300;

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(WordCountThin),
        Box::new(ImgAltMissing),
        Box::new(ImgDimensionsMissing),
        Box::new(EmptyAnchorText),
        Box::new(DuplicateTitle),
        Box::new(DuplicateDescription),
    ]
}

struct WordCountThin;

impl Rule for WordCountThin {
    fn id(&self) -> &'static str {
        "content.word_count.thin"
    }
    fn name(&self) -> &'static str {
        "Sufficient body content"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::ContentQuality
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        // Contact, legal, and location pages are legitimately short.
        if matches!(
            page.page_type,
            PageType::Contact | PageType::Legal | PageType::Location
        ) {
            return vec![self.page_factor(page, Evidence::new(), Verdict::NotApplicable)];
        }
        let words = page.crawl.word_count;
        let verdict = if words < THIN_WORDS {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(
            page,
            Evidence::new()
                .set("word_count", words as u64)
                .set("threshold", THIN_WORDS as u64),
            verdict,
        )]
    }
}

/// Summarized per page: one factor counting images without alt text.
struct ImgAltMissing;

impl Rule for ImgAltMissing {
    fn id(&self) -> &'static str {
        "content.img.alt.missing"
    }
    fn name(&self) -> &'static str {
        "Images carry alt text"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::ContentQuality
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let total = page.crawl.images.len();
        if total == 0 {
            return vec![self.page_factor(page, Evidence::new(), Verdict::NotApplicable)];
        }
        let missing = page
            .crawl
            .images
            .iter()
            .filter(|img| img.alt.as_deref().map(str::is_empty).unwrap_or(true))
            .count();
        let verdict = if missing > 0 {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self
            .page_factor(
                page,
                Evidence::new()
                    .set("images_total", total as u64)
                    .set("images_missing_alt", missing as u64),
                verdict,
            )
            .with_notes(format!("{} of {} images lack alt text", missing, total))]
    }
}

struct ImgDimensionsMissing;

impl Rule for ImgDimensionsMissing {
    fn id(&self) -> &'static str {
        "content.img.dimensions.missing"
    }
    fn name(&self) -> &'static str {
        "Images declare dimensions"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::ContentQuality
    }
    fn importance(&self) -> Importance {
        Importance::Low
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let total = page.crawl.images.len();
        if total == 0 {
            return vec![self.page_factor(page, Evidence::new(), Verdict::NotApplicable)];
        }
        let missing = page
            .crawl
            .images
            .iter()
            .filter(|img| img.width.is_none() || img.height.is_none())
            .count();
        let verdict = if missing > 0 {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(
            page,
            Evidence::new()
                .set("images_total", total as u64)
                .set("images_missing_dimensions", missing as u64),
            verdict,
        )]
    }
}

/// Per-link emission; the catalog's ceiling summarizes the overflow.
struct EmptyAnchorText;

impl Rule for EmptyAnchorText {
    fn id(&self) -> &'static str {
        "content.link.anchor.empty"
    }
    fn name(&self) -> &'static str {
        "Links have anchor text"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::ContentQuality
    }
    fn importance(&self) -> Importance {
        Importance::Low
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let empty: Vec<&str> = page
            .crawl
            .internal_links
            .iter()
            .filter(|link| link.anchor_text.trim().is_empty())
            .map(|link| link.href.as_str())
            .collect();
        if empty.is_empty() {
            return vec![self.page_factor(
                page,
                Evidence::new().set("links_checked", page.crawl.internal_links.len() as u64),
                Verdict::Pass,
            )];
        }
        empty
            .into_iter()
            .map(|href| {
                self.page_factor(
                    page,
                    Evidence::new().set("href", href),
                    Verdict::Deficient,
                )
                .with_notes(format!("link to {} has no anchor text", href))
            })
            .collect()
    }
}

struct DuplicateTitle;

impl Rule for DuplicateTitle {
    fn id(&self) -> &'static str {
        "content.title.duplicate"
    }
    fn name(&self) -> &'static str {
        "Titles unique across the site"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::ContentQuality
    }
    fn check_site(&self, ctx: &SiteContext) -> Vec<AuditFactor> {
        if ctx.page_count < 2 {
            return vec![self.factor(Evidence::new(), Verdict::NotApplicable)];
        }
        if ctx.duplicate_titles.is_empty() {
            return vec![self.factor(
                Evidence::new().set("duplicate_groups", 0),
                Verdict::Pass,
            )];
        }
        ctx.duplicate_titles
            .iter()
            .map(|(title, count)| {
                self.factor(
                    Evidence::new()
                        .set("title", title.clone())
                        .set("pages_sharing", *count as u64),
                    Verdict::Deficient,
                )
                .with_notes(format!("{} pages share the title \"{}\"", count, title))
            })
            .collect()
    }
}

struct DuplicateDescription;

impl Rule for DuplicateDescription {
    fn id(&self) -> &'static str {
        "content.meta_description.duplicate"
    }
    fn name(&self) -> &'static str {
        "Meta descriptions unique across the site"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::ContentQuality
    }
    fn check_site(&self, ctx: &SiteContext) -> Vec<AuditFactor> {
        if ctx.page_count < 2 {
            return vec![self.factor(Evidence::new(), Verdict::NotApplicable)];
        }
        if ctx.duplicate_descriptions.is_empty() {
            return vec![self.factor(
                Evidence::new().set("duplicate_groups", 0),
                Verdict::Pass,
            )];
        }
        ctx.duplicate_descriptions
            .iter()
            .map(|(description, count)| {
                self.factor(
                    Evidence::new()
                        .set("description", description.clone())
                        .set("pages_sharing", *count as u64),
                    Verdict::Deficient,
                )
            })
            .collect()
    }
}
