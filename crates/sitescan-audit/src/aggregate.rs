use crate::context::SiteContext;
use sitescan_types::{AuditFactor, AuditSummary, FactorCategory, FactorStatus};
use std::collections::HashMap;
use tracing::debug;

/// Category weights for the overall score. Renormalized when a category has
/// no applicable factors.
const CATEGORY_WEIGHTS: [(FactorCategory, f64); 4] = [
    (FactorCategory::ContentQuality, 0.30),
    (FactorCategory::TechnicalSeo, 0.30),
    (FactorCategory::LocalSeoEeat, 0.20),
    (FactorCategory::UxPerformance, 0.20),
];

/// Tier-weighted scoring and the cross-factor demotion pass.
#[derive(Debug, Default)]
pub struct Aggregator;

impl Aggregator {
    /// Demote every `PriorityOfi` back to `Ofi` when the site has no
    /// conversion surface at all (every crawled page is tier 3). Keeps
    /// archive-only sites from drowning in escalations.
    pub fn demote_for_pure_archive(&self, factors: &mut [AuditFactor], ctx: &SiteContext) {
        if !ctx.all_t3 {
            return;
        }
        let mut demoted = 0;
        for factor in factors.iter_mut() {
            if factor.status == FactorStatus::PriorityOfi {
                factor.status = FactorStatus::Ofi;
                demoted += 1;
            }
        }
        if demoted > 0 {
            debug!(demoted, "Demoted escalations on an all-tier-3 site");
        }
    }

    /// Status counts plus the tier-weighted category and overall scores.
    ///
    /// Per category: `100 · Σ w(f)·ok(f) / Σ w(f)·applicable(f)` with
    /// `w(f)` the page tier weight (site-wide factors weigh 1). Categories
    /// with no applicable factors are dropped and the remaining category
    /// weights renormalized to sum to one.
    pub fn summarize(&self, factors: &[AuditFactor]) -> AuditSummary {
        let mut summary = AuditSummary::count_statuses(factors);

        let mut ok_weight: HashMap<FactorCategory, f64> = HashMap::new();
        let mut applicable_weight: HashMap<FactorCategory, f64> = HashMap::new();

        for factor in factors {
            if factor.status == FactorStatus::NotApplicable {
                continue;
            }
            let weight = factor
                .tier_of_page
                .map(|tier| tier.weight() as f64)
                .unwrap_or(1.0);
            *applicable_weight.entry(factor.category).or_insert(0.0) += weight;
            if factor.status == FactorStatus::Ok {
                *ok_weight.entry(factor.category).or_insert(0.0) += weight;
            }
        }

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (category, weight) in CATEGORY_WEIGHTS {
            let Some(denominator) = applicable_weight.get(&category).filter(|d| **d > 0.0) else {
                continue;
            };
            let numerator = ok_weight.get(&category).copied().unwrap_or(0.0);
            let score = 100.0 * numerator / denominator;
            summary.per_category_score.insert(category, score);
            weighted_sum += weight * score;
            weight_total += weight;
        }

        summary.weighted_score = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        };
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitescan_types::{Evidence, PageType, Tier, UrlKey, Verdict};

    fn factor(
        id: &str,
        category: FactorCategory,
        verdict: Verdict,
        tier: Option<Tier>,
    ) -> AuditFactor {
        let factor = AuditFactor::new(id, category, id, Evidence::new(), verdict);
        match tier {
            Some(tier) => factor.for_page(
                UrlKey::parse("https://example.com/p").expect("key"),
                tier,
                PageType::Other,
            ),
            None => factor,
        }
    }

    #[test]
    fn counts_are_conserved_through_summarize() {
        let factors = vec![
            factor("a", FactorCategory::TechnicalSeo, Verdict::Pass, Some(Tier::T1)),
            factor("b", FactorCategory::TechnicalSeo, Verdict::Deficient, Some(Tier::T2)),
            factor("c", FactorCategory::ContentQuality, Verdict::NotApplicable, None),
        ];
        let summary = Aggregator.summarize(&factors);
        assert_eq!(
            summary.ok + summary.ofi + summary.priority_ofi + summary.na,
            summary.total
        );
    }

    #[test]
    fn tier_weights_skew_the_category_score() {
        // T1 pass (weight 3) against T3 fail (weight 1): 75, not 50.
        let factors = vec![
            factor("a", FactorCategory::TechnicalSeo, Verdict::Pass, Some(Tier::T1)),
            factor("b", FactorCategory::TechnicalSeo, Verdict::Deficient, Some(Tier::T3)),
        ];
        let summary = Aggregator.summarize(&factors);
        let score = summary.per_category_score[&FactorCategory::TechnicalSeo];
        assert!((score - 75.0).abs() < f64::EPSILON);
        assert!((summary.weighted_score - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_categories_are_dropped_and_weights_renormalized() {
        // Only TechnicalSeo (0.30) and UxPerformance (0.20) have factors;
        // their scores are 100 and 0, so overall = 0.3/0.5 * 100 = 60.
        let factors = vec![
            factor("a", FactorCategory::TechnicalSeo, Verdict::Pass, Some(Tier::T2)),
            factor("b", FactorCategory::UxPerformance, Verdict::Deficient, Some(Tier::T2)),
        ];
        let summary = Aggregator.summarize(&factors);
        assert_eq!(summary.per_category_score.len(), 2);
        assert!((summary.weighted_score - 60.0).abs() < 1e-9);
    }

    #[test]
    fn all_na_yields_zero_score_not_panic() {
        let factors = vec![factor(
            "a",
            FactorCategory::TechnicalSeo,
            Verdict::NotApplicable,
            None,
        )];
        let summary = Aggregator.summarize(&factors);
        assert_eq!(summary.weighted_score, 0.0);
        assert!(summary.per_category_score.is_empty());
    }

    #[test]
    fn pure_archive_sites_are_demoted() {
        use sitescan_types::{FetchError, FetchMode, PageCrawlResult, PageRecord};

        let key = UrlKey::parse("https://example.com/blog/a").expect("key");
        let mut crawl = PageCrawlResult::failed(key, FetchMode::Http, FetchError::Timeout);
        crawl.fetch_error = None;
        let pages = vec![PageRecord {
            crawl,
            tier: Tier::T3,
            page_type: PageType::Blog,
        }];
        let ctx = SiteContext::build(&pages, false);

        let mut factors = vec![factor(
            "a",
            FactorCategory::TechnicalSeo,
            Verdict::Deficient,
            Some(Tier::T3),
        )];
        factors[0].status = FactorStatus::PriorityOfi;

        Aggregator.demote_for_pure_archive(&mut factors, &ctx);
        assert_eq!(factors[0].status, FactorStatus::Ofi);
    }
}
