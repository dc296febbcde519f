use crate::page::{PageType, Tier};
use crate::url_key::UrlKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Thematic analyzer a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorCategory {
    ContentQuality,
    TechnicalSeo,
    LocalSeoEeat,
    UxPerformance,
}

impl FactorCategory {
    pub const ALL: [FactorCategory; 4] = [
        FactorCategory::ContentQuality,
        FactorCategory::TechnicalSeo,
        FactorCategory::LocalSeoEeat,
        FactorCategory::UxPerformance,
    ];
}

/// Outcome of one check on one page (or site-wide).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorStatus {
    Ok,
    Ofi,
    PriorityOfi,
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Importance {
    Low,
    Medium,
    High,
}

/// What a rule concluded from its evidence.
///
/// This is the only path to a factor status: there is deliberately no
/// constructor that accepts a status directly, so a rule cannot emit a
/// verdict it did not compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Deficient,
    NotApplicable,
}

/// Structured measurements backing a verdict.
///
/// Rules fill this with the raw numbers and selectors that motivated their
/// verdict; the classification engine reads it back out when re-evaluating
/// the factor against the priority matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Evidence(Map<String, Value>);

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The unit of analysis output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFactor {
    /// Stable slug, e.g. `technical.h1.missing`.
    pub id: String,
    pub category: FactorCategory,
    pub name: String,
    pub description: String,
    /// Human-readable evidence summary.
    pub notes: String,
    pub status: FactorStatus,
    pub importance: Importance,
    pub evidence: Evidence,
    /// Absent for site-wide factors.
    pub page_url: Option<UrlKey>,
    /// Value copies of the page's classification for weighting and
    /// escalation; not back-pointers.
    pub tier_of_page: Option<Tier>,
    pub page_type_of_page: Option<PageType>,
    pub computed_at: DateTime<Utc>,
}

impl AuditFactor {
    /// Build a factor from a rule's evidence and verdict.
    ///
    /// The status is derived here and nowhere else: `Pass -> Ok`,
    /// `Deficient -> Ofi`, `NotApplicable -> NotApplicable`. Escalation to
    /// `PriorityOfi` is the classification engine's job.
    pub fn new(
        id: impl Into<String>,
        category: FactorCategory,
        name: impl Into<String>,
        evidence: Evidence,
        verdict: Verdict,
    ) -> Self {
        let status = match verdict {
            Verdict::Pass => FactorStatus::Ok,
            Verdict::Deficient => FactorStatus::Ofi,
            Verdict::NotApplicable => FactorStatus::NotApplicable,
        };
        Self {
            id: id.into(),
            category,
            name: name.into(),
            description: String::new(),
            notes: String::new(),
            status,
            importance: Importance::Medium,
            evidence,
            page_url: None,
            tier_of_page: None,
            page_type_of_page: None,
            computed_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    pub fn for_page(mut self, url: UrlKey, tier: Tier, page_type: PageType) -> Self {
        self.page_url = Some(url);
        self.tier_of_page = Some(tier);
        self.page_type_of_page = Some(page_type);
        self
    }

    /// Whether the factor counts toward a category score denominator.
    pub fn is_applicable(&self) -> bool {
        self.status != FactorStatus::NotApplicable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_derived_from_verdict_only() {
        let evidence = Evidence::new().set("h1_count", 0);
        let factor = AuditFactor::new(
            "technical.h1.missing",
            FactorCategory::TechnicalSeo,
            "H1 heading present",
            evidence,
            Verdict::Deficient,
        );
        assert_eq!(factor.status, FactorStatus::Ofi);
        assert_eq!(factor.evidence.get_u64("h1_count"), Some(0));
    }

    #[test]
    fn passing_verdict_yields_ok() {
        let factor = AuditFactor::new(
            "technical.title.missing",
            FactorCategory::TechnicalSeo,
            "Title present",
            Evidence::new().set("title_length", 30),
            Verdict::Pass,
        );
        assert_eq!(factor.status, FactorStatus::Ok);
        assert!(factor.is_applicable());
    }

    #[test]
    fn not_applicable_is_excluded_from_scoring() {
        let factor = AuditFactor::new(
            "content.word_count.thin",
            FactorCategory::ContentQuality,
            "Word count",
            Evidence::new(),
            Verdict::NotApplicable,
        );
        assert!(!factor.is_applicable());
    }

    #[test]
    fn evidence_accessors_round_trip() {
        let evidence = Evidence::new()
            .set("ratio", 0.42)
            .set("flag", true)
            .set("selector", "div#root");
        assert_eq!(evidence.get_f64("ratio"), Some(0.42));
        assert_eq!(evidence.get_bool("flag"), Some(true));
        assert_eq!(evidence.get_str("selector"), Some("div#root"));
        assert_eq!(evidence.get_u64("missing"), None);
    }
}
