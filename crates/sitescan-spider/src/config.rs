use crate::budget::BudgetConfig;
use crate::classify::ClassifierConfig;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sitescan_fetch::{FetchConfig, RobotsConfig};
use std::time::Duration;

/// Tunables for one crawl run. Everything lives here; there is no global
/// mutable crawler state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Worker task count.
    pub concurrency: usize,
    /// Cap on simultaneous browser contexts; zero disables the headless
    /// backend entirely.
    pub headless_pool: usize,
    /// Peak request rate per host; the politeness gate spaces request
    /// starts at `1/per_host_rps` seconds minimum.
    pub per_host_rps: f64,
    /// Concurrent in-flight requests per origin.
    pub max_concurrent_per_host: usize,
    pub respect_robots: bool,
    pub include_subdomains: bool,
    /// Appended to the advertised user agent.
    pub user_agent_suffix: Option<String>,
    pub budget: BudgetConfig,
    pub fetch: FetchConfig,
    pub classifier: ClassifierConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            headless_pool: 4,
            per_host_rps: 4.0,
            max_concurrent_per_host: 2,
            respect_robots: true,
            include_subdomains: false,
            user_agent_suffix: None,
            budget: BudgetConfig::default(),
            fetch: FetchConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.budget.max_pages == 0 {
            bail!("max_pages must be at least 1");
        }
        if self.budget.max_time.is_zero() {
            bail!("max_time_ms must be positive");
        }
        if self.per_host_rps <= 0.0 {
            bail!("per_host_rps must be positive");
        }
        if self.headless_pool > 32 {
            bail!("headless_pool above 32 is not supported");
        }
        Ok(())
    }

    /// Minimum spacing between request starts to one host.
    pub fn min_host_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.per_host_rps)
    }

    /// Full user agent with the optional suffix appended.
    pub fn user_agent(&self) -> String {
        match &self.user_agent_suffix {
            Some(suffix) if !suffix.is_empty() => {
                format!("{} {}", self.fetch.user_agent, suffix)
            }
            _ => self.fetch.user_agent.clone(),
        }
    }

    pub fn robots_config(&self) -> RobotsConfig {
        RobotsConfig {
            respect_robots: self.respect_robots,
            user_agent: self.user_agent(),
            ..RobotsConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_match_contract() {
        let config = CrawlConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.headless_pool, 4);
        assert_eq!(config.budget.max_pages, 50);
        assert_eq!(config.budget.max_time, Duration::from_secs(900));
        assert_eq!(config.min_host_interval(), Duration::from_millis(250));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = CrawlConfig {
            concurrency: 0,
            ..CrawlConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn suffix_extends_user_agent() {
        let config = CrawlConfig {
            user_agent_suffix: Some("tenant-42".to_string()),
            ..CrawlConfig::default()
        };
        assert!(config.user_agent().ends_with("tenant-42"));
    }
}
