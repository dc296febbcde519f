use crate::context::{extract_phones, SiteContext};
use crate::rule::Rule;
use sitescan_types::{
    AuditFactor, Evidence, FactorCategory, Importance, PageRecord, PageType, Verdict,
};

/// Distinct phone variants beyond which the site's NAP reads inconsistent.
const PHONE_VARIANT_LIMIT: usize = 2;

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(PhoneMissing),
        Box::new(NapConsistency),
        Box::new(ContactFormMissing),
        Box::new(ContactPageMissing),
        Box::new(AboutPageMissing),
        Box::new(LocalBusinessSchemaMissing),
        Box::new(PrivacyPolicyMissing),
    ]
}

/// Conversion surfaces should show a phone number.
struct PhoneMissing;

impl Rule for PhoneMissing {
    fn id(&self) -> &'static str {
        "local.nap.phone.missing"
    }
    fn name(&self) -> &'static str {
        "Phone number visible"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::LocalSeoEeat
    }
    fn importance(&self) -> Importance {
        Importance::High
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        if !matches!(
            page.page_type,
            PageType::Home | PageType::Contact | PageType::Location | PageType::ServiceArea
        ) {
            return vec![self.page_factor(page, Evidence::new(), Verdict::NotApplicable)];
        }
        let phones = extract_phones(&page.crawl.visible_text);
        let verdict = if phones.is_empty() {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(
            page,
            Evidence::new().set("phones_found", phones.len() as u64),
            verdict,
        )]
    }
}

struct NapConsistency;

impl Rule for NapConsistency {
    fn id(&self) -> &'static str {
        "local.nap.consistency"
    }
    fn name(&self) -> &'static str {
        "Phone number consistent site-wide"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::LocalSeoEeat
    }
    fn check_site(&self, ctx: &SiteContext) -> Vec<AuditFactor> {
        if ctx.phone_variants.is_empty() {
            // The per-page phone rule owns the missing case.
            return vec![self.factor(Evidence::new(), Verdict::NotApplicable)];
        }
        let variants = ctx.phone_variants.len();
        let verdict = if variants > PHONE_VARIANT_LIMIT {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self
            .factor(
                Evidence::new().set("phone_variants", variants as u64),
                verdict,
            )
            .with_notes(format!("{} distinct phone numbers found", variants))]
    }
}

/// A contact page without a working form loses the conversion it exists for.
struct ContactFormMissing;

impl Rule for ContactFormMissing {
    fn id(&self) -> &'static str {
        "local.contact.form.missing"
    }
    fn name(&self) -> &'static str {
        "Contact form present"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::LocalSeoEeat
    }
    fn importance(&self) -> Importance {
        Importance::High
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.page_type != PageType::Contact {
            return Vec::new();
        }
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let functional = page.crawl.forms_count > 0 && page.crawl.form_input_count > 0;
        let verdict = if functional {
            Verdict::Pass
        } else {
            Verdict::Deficient
        };
        vec![self.page_factor(
            page,
            Evidence::new()
                .set("forms_count", page.crawl.forms_count as u64)
                .set("form_input_count", page.crawl.form_input_count as u64),
            verdict,
        )]
    }
}

struct ContactPageMissing;

impl Rule for ContactPageMissing {
    fn id(&self) -> &'static str {
        "local.contact.page.missing"
    }
    fn name(&self) -> &'static str {
        "Contact page exists"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::LocalSeoEeat
    }
    fn check_site(&self, ctx: &SiteContext) -> Vec<AuditFactor> {
        let verdict = if ctx.has_contact_page {
            Verdict::Pass
        } else {
            Verdict::Deficient
        };
        vec![self.factor(
            Evidence::new().set("contact_page_found", ctx.has_contact_page),
            verdict,
        )]
    }
}

struct AboutPageMissing;

impl Rule for AboutPageMissing {
    fn id(&self) -> &'static str {
        "local.about.page.missing"
    }
    fn name(&self) -> &'static str {
        "About page exists"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::LocalSeoEeat
    }
    fn importance(&self) -> Importance {
        Importance::Low
    }
    fn check_site(&self, ctx: &SiteContext) -> Vec<AuditFactor> {
        let verdict = if ctx.has_about_page {
            Verdict::Pass
        } else {
            Verdict::Deficient
        };
        vec![self.factor(
            Evidence::new().set("about_page_found", ctx.has_about_page),
            verdict,
        )]
    }
}

/// The homepage should declare LocalBusiness or Organization structured data.
struct LocalBusinessSchemaMissing;

impl Rule for LocalBusinessSchemaMissing {
    fn id(&self) -> &'static str {
        "local.schema.localbusiness.missing"
    }
    fn name(&self) -> &'static str {
        "LocalBusiness structured data present"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::LocalSeoEeat
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.page_type != PageType::Home {
            return Vec::new();
        }
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let found = page.crawl.json_ld_types.iter().any(|t| {
            t.eq_ignore_ascii_case("LocalBusiness")
                || t.eq_ignore_ascii_case("Organization")
                || t.ends_with("Business")
        });
        let verdict = if found { Verdict::Pass } else { Verdict::Deficient };
        vec![self.page_factor(
            page,
            Evidence::new()
                .set("json_ld_types", page.crawl.json_ld_types.join(","))
                .set("schema_found", found),
            verdict,
        )]
    }
}

/// Sites that collect data through forms need a reachable privacy policy.
struct PrivacyPolicyMissing;

impl Rule for PrivacyPolicyMissing {
    fn id(&self) -> &'static str {
        "legal.privacy.missing"
    }
    fn name(&self) -> &'static str {
        "Privacy policy page exists"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::LocalSeoEeat
    }
    fn importance(&self) -> Importance {
        Importance::High
    }
    fn check_site(&self, ctx: &SiteContext) -> Vec<AuditFactor> {
        if !ctx.any_page_has_form {
            return vec![self.factor(Evidence::new(), Verdict::NotApplicable)];
        }
        let verdict = if ctx.has_privacy_page {
            Verdict::Pass
        } else {
            Verdict::Deficient
        };
        vec![self
            .factor(
                Evidence::new()
                    .set("privacy_page_found", ctx.has_privacy_page)
                    .set("site_collects_data", true),
                verdict,
            )
            .with_notes("site collects data through forms")]
    }
}
