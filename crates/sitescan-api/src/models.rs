use serde::{Deserialize, Serialize};
use sitescan_types::{AuditReport, AuditStatus};

/// Request body for submitting an audit.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAuditBody {
    pub url: String,
    #[serde(default)]
    pub options: AuditOptions,
}

/// Recognized audit options; unset fields fall back to the engine defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditOptions {
    pub max_pages: Option<usize>,
    pub max_time_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub headless_pool: Option<usize>,
    pub per_host_rps: Option<f64>,
    pub respect_robots: Option<bool>,
    pub include_subdomains: Option<bool>,
    pub user_agent_suffix: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitAuditResponse {
    pub audit_id: String,
}

/// Poll response: lifecycle status, and the full report once `Completed`.
#[derive(Debug, Serialize)]
pub struct PollAuditResponse {
    pub audit_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AuditReport>,
}

#[derive(Debug, Serialize)]
pub struct ListAuditsResponse {
    pub audit_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAuditsQuery {
    /// Filter by lifecycle status name, e.g. `completed`.
    pub status: Option<String>,
}

/// Flatten the lifecycle enum into the wire shape.
pub fn status_label(status: &AuditStatus) -> (String, Option<String>) {
    match status {
        AuditStatus::Queued => ("queued".to_string(), None),
        AuditStatus::Running => ("running".to_string(), None),
        AuditStatus::Completed => ("completed".to_string(), None),
        AuditStatus::Failed { reason } => ("failed".to_string(), Some(reason.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_flatten_failure_reason() {
        assert_eq!(status_label(&AuditStatus::Queued).0, "queued");
        let (label, reason) = status_label(&AuditStatus::Failed {
            reason: "seed unreachable".to_string(),
        });
        assert_eq!(label, "failed");
        assert_eq!(reason.as_deref(), Some("seed unreachable"));
    }

    #[test]
    fn options_deserialize_with_all_fields_absent() {
        let body: SubmitAuditBody =
            serde_json::from_str(r#"{"url": "https://example.com"}"#).expect("deserializes");
        assert!(body.options.max_pages.is_none());
        assert!(body.options.respect_robots.is_none());
    }
}
