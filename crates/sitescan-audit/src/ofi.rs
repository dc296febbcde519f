use sitescan_types::{AuditFactor, FactorStatus, PageType, Tier};
use std::collections::HashSet;
use tracing::trace;

/// Core Web Vitals "poor" thresholds; factors carrying these measurements
/// in their evidence trip the visibility criterion.
const LCP_POOR_MS: f64 = 4000.0;
const CLS_POOR: f64 = 0.25;
const INP_POOR_MS: f64 = 500.0;

/// Factor ids measuring something search engines directly index or rank on.
const SEO_VISIBILITY_IDS: &[&str] = &[
    "technical.title.missing",
    "technical.title.length",
    "technical.meta_description.missing",
    "technical.h1.missing",
    "technical.canonical.missing",
    "technical.robots.noindex",
    "technical.sitemap.missing",
    "local.schema.localbusiness.missing",
];

/// Factor ids measuring something that materially breaks interaction.
const UX_IMPACT_IDS: &[&str] = &[
    "ux.viewport.missing",
    "ux.tap_targets.small",
    "ux.contrast.cta",
    "ux.form.labels.missing",
    "technical.availability",
];

/// Conversion-relevant factor ids for the business-value criterion.
const CONVERSION_IDS: &[&str] = &[
    "local.nap.phone.missing",
    "local.contact.form.missing",
    "content.word_count.thin",
];

/// Factor ids indicating a security or legal exposure.
const COMPLIANCE_IDS: &[&str] = &[
    "security.https.missing",
    "security.tls.invalid",
    "security.mixed_content.form",
    "legal.privacy.missing",
];

/// Critical ids that no shipped rule emits yet but that the escalation
/// contract reserves for measurement-sourced factors.
const RESERVED_CRITICAL_IDS: &[&str] = &["ux.cwv.lcp.poor"];

/// The deterministic priority matrix.
///
/// Re-examines every non-passing factor against four boolean criteria and
/// escalates to `PriorityOfi` when at least two hold, or when the factor's
/// id is in the Critical Set and the page is tier 1 or 2. Holds no per-run
/// state; for a given `(factor, tier)` the answer never changes.
///
/// Passing and not-applicable factors are returned untouched: the engine
/// only escalates deficiencies, it never promotes an `Ok` or `NA`.
#[derive(Debug, Clone)]
pub struct OfiClassifier {
    critical: HashSet<String>,
}

impl OfiClassifier {
    /// `critical` is the catalog's declared Critical Set, keyed by rule id.
    /// Name- or description-based matching is deliberately impossible here.
    pub fn new(mut critical: HashSet<String>) -> Self {
        critical.extend(RESERVED_CRITICAL_IDS.iter().map(|id| id.to_string()));
        Self { critical }
    }

    pub fn classify(&self, factor: &AuditFactor) -> FactorStatus {
        match factor.status {
            FactorStatus::Ok | FactorStatus::NotApplicable => factor.status,
            FactorStatus::Ofi | FactorStatus::PriorityOfi => self.reexamine(factor),
        }
    }

    fn reexamine(&self, factor: &AuditFactor) -> FactorStatus {
        let criteria = [
            self.seo_visibility_impact(factor),
            self.user_experience_impact(factor),
            self.business_value_impact(factor),
            self.compliance_risk(factor),
        ];
        let k = criteria.iter().filter(|c| **c).count();

        let tier_escalates = matches!(factor.tier_of_page, Some(Tier::T1) | Some(Tier::T2));
        let is_critical = self.critical.contains(&factor.id);

        trace!(
            id = %factor.id,
            k = k,
            critical = is_critical,
            tier = ?factor.tier_of_page,
            "Priority matrix evaluated"
        );

        if k >= 2 || (is_critical && tier_escalates) {
            FactorStatus::PriorityOfi
        } else {
            FactorStatus::Ofi
        }
    }

    /// Criterion 1: search engines explicitly rely on the measured signal,
    /// or a Core Web Vital is beyond its documented "poor" threshold.
    fn seo_visibility_impact(&self, factor: &AuditFactor) -> bool {
        if SEO_VISIBILITY_IDS.contains(&factor.id.as_str()) {
            return true;
        }
        factor
            .evidence
            .get_f64("lcp_ms")
            .map(|v| v > LCP_POOR_MS)
            .unwrap_or(false)
            || factor
                .evidence
                .get_f64("cls")
                .map(|v| v > CLS_POOR)
                .unwrap_or(false)
            || factor
                .evidence
                .get_f64("inp_ms")
                .map(|v| v > INP_POOR_MS)
                .unwrap_or(false)
    }

    /// Criterion 2: the deficiency materially breaks interaction.
    fn user_experience_impact(&self, factor: &AuditFactor) -> bool {
        UX_IMPACT_IDS.contains(&factor.id.as_str())
    }

    /// Criterion 3: the factor sits on a tier-1 page, or on a conversion
    /// page and concerns a conversion-relevant element.
    fn business_value_impact(&self, factor: &AuditFactor) -> bool {
        if factor.tier_of_page == Some(Tier::T1) {
            return true;
        }
        let conversion_page = matches!(
            factor.page_type_of_page,
            Some(PageType::Contact) | Some(PageType::Service) | Some(PageType::Location)
        );
        conversion_page && CONVERSION_IDS.contains(&factor.id.as_str())
    }

    /// Criterion 4: security or legal exposure.
    fn compliance_risk(&self, factor: &AuditFactor) -> bool {
        COMPLIANCE_IDS.contains(&factor.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RuleCatalog;
    use sitescan_types::{Evidence, FactorCategory, UrlKey, Verdict};

    fn classifier() -> OfiClassifier {
        OfiClassifier::new(RuleCatalog::default().critical_ids())
    }

    fn deficient(id: &str, tier: Tier, page_type: PageType) -> AuditFactor {
        AuditFactor::new(id, FactorCategory::TechnicalSeo, id, Evidence::new(), Verdict::Deficient)
            .for_page(
                UrlKey::parse("https://example.com/p").expect("key"),
                tier,
                page_type,
            )
    }

    #[test]
    fn critical_factor_on_t1_escalates() {
        let factor = deficient("technical.h1.missing", Tier::T1, PageType::Home);
        assert_eq!(classifier().classify(&factor), FactorStatus::PriorityOfi);
    }

    #[test]
    fn critical_factor_on_t2_escalates() {
        let factor = deficient("security.https.missing", Tier::T2, PageType::Contact);
        assert_eq!(classifier().classify(&factor), FactorStatus::PriorityOfi);
    }

    #[test]
    fn critical_factor_on_t3_needs_two_criteria() {
        // Meta description on a T3 blog page: visibility criterion only.
        let factor = deficient("technical.meta_description.missing", Tier::T3, PageType::Blog);
        assert_eq!(classifier().classify(&factor), FactorStatus::Ofi);
    }

    #[test]
    fn two_criteria_escalate_without_critical_membership() {
        // Phone missing on a contact page: business value (conversion page +
        // conversion element) plus... only one criterion. Stays OFI.
        let phone = deficient("local.nap.phone.missing", Tier::T2, PageType::Contact);
        assert_eq!(classifier().classify(&phone), FactorStatus::Ofi);

        // Same deficiency on the T1 homepage with a privacy angle is not
        // possible; use mixed content on a T1 page instead: compliance +
        // business value.
        let mixed = deficient("security.mixed_content.form", Tier::T1, PageType::Home);
        assert_eq!(classifier().classify(&mixed), FactorStatus::PriorityOfi);
    }

    #[test]
    fn ok_and_na_are_never_promoted() {
        let ok = AuditFactor::new(
            "technical.h1.missing",
            FactorCategory::TechnicalSeo,
            "H1",
            Evidence::new().set("h1_count", 1),
            Verdict::Pass,
        )
        .for_page(UrlKey::parse("https://example.com/").expect("key"), Tier::T1, PageType::Home);
        assert_eq!(classifier().classify(&ok), FactorStatus::Ok);

        let na = AuditFactor::new(
            "technical.h1.missing",
            FactorCategory::TechnicalSeo,
            "H1",
            Evidence::new(),
            Verdict::NotApplicable,
        );
        assert_eq!(classifier().classify(&na), FactorStatus::NotApplicable);
    }

    #[test]
    fn poor_lcp_evidence_trips_the_visibility_criterion() {
        let mut factor = deficient("ux.page_weight.heavy", Tier::T3, PageType::Blog);
        factor.evidence = Evidence::new().set("lcp_ms", 5200.0);
        // Visibility via CWV threshold is one criterion; page weight has no
        // other, so a T3 page stays OFI.
        assert_eq!(classifier().classify(&factor), FactorStatus::Ofi);

        let mut t1 = deficient("ux.cwv.lcp.poor", Tier::T1, PageType::Home);
        t1.evidence = Evidence::new().set("lcp_ms", 5200.0);
        // Reserved critical id on a T1 page escalates.
        assert_eq!(classifier().classify(&t1), FactorStatus::PriorityOfi);
    }

    #[test]
    fn classification_is_deterministic() {
        let factor = deficient("technical.title.missing", Tier::T2, PageType::About);
        let first = classifier().classify(&factor);
        for _ in 0..20 {
            assert_eq!(classifier().classify(&factor), first);
        }
    }
}
