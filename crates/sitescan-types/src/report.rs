use crate::factor::{AuditFactor, FactorCategory, FactorStatus};
use crate::page::PageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle of an audit run.
///
/// Transitions are one-way: `Queued -> Running -> Completed | Failed`.
/// Budget exhaustion and cancellation both finalize as `Completed`; only a
/// seed that stays unreachable after retries produces `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    Queued,
    Running,
    Completed,
    Failed { reason: String },
}

impl AuditStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuditStatus::Completed | AuditStatus::Failed { .. })
    }
}

/// Status counts and weighted scores for a finished run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditSummary {
    pub ok: usize,
    pub ofi: usize,
    pub priority_ofi: usize,
    pub na: usize,
    pub total: usize,
    /// Overall 0-100 score, category-weighted.
    pub weighted_score: f64,
    pub per_category_score: HashMap<FactorCategory, f64>,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub duration_ms: u64,
}

impl AuditSummary {
    /// Tally status counts from a factor list. Scores are filled in by the
    /// aggregator, which owns the weighting rules.
    pub fn count_statuses(factors: &[AuditFactor]) -> Self {
        let mut summary = Self::default();
        for factor in factors {
            match factor.status {
                FactorStatus::Ok => summary.ok += 1,
                FactorStatus::Ofi => summary.ofi += 1,
                FactorStatus::PriorityOfi => summary.priority_ofi += 1,
                FactorStatus::NotApplicable => summary.na += 1,
            }
        }
        summary.total = factors.len();
        summary
    }
}

/// The aggregate a finished run hands to persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub id: String,
    pub root_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: AuditStatus,
    /// Set when the frontier still held admissible URLs at the page budget.
    pub reached_max_pages: bool,
    pub pages: Vec<PageRecord>,
    pub factors: Vec<AuditFactor>,
    pub summary: AuditSummary,
}

impl AuditReport {
    pub fn queued(id: impl Into<String>, root_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            root_url: root_url.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: AuditStatus::Queued,
            reached_max_pages: false,
            pages: Vec::new(),
            factors: Vec::new(),
            summary: AuditSummary::default(),
        }
    }
}
