use crate::errors::ApiError;
use crate::models::{AuditOptions, SubmitAuditBody};
use sitescan_spider::CrawlConfig;
use std::time::Duration;
use url::Url;

/// Ceiling on the page budget a caller may request.
const MAX_PAGES_CEILING: usize = 500;
/// Ceiling on the wall clock a caller may request (1 hour).
const MAX_TIME_MS_CEILING: u64 = 3_600_000;
const MAX_CONCURRENCY: usize = 32;
const MAX_HEADLESS_POOL: usize = 16;
const MAX_UA_SUFFIX_LEN: usize = 120;

/// Validate a submission before any fetch happens. Returns the parsed seed
/// and the run configuration derived from the options.
pub fn validate_submit(body: &SubmitAuditBody) -> Result<(Url, CrawlConfig), ApiError> {
    let seed = parse_seed(&body.url)?;
    let config = build_config(&body.options)?;
    Ok((seed, config))
}

fn parse_seed(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("url must not be empty"));
    }
    let url = Url::parse(trimmed).map_err(|e| ApiError::invalid_url(trimmed, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::invalid_url(
            trimmed,
            "only http and https seeds are supported",
        ));
    }
    if url.host_str().is_none() {
        return Err(ApiError::invalid_url(trimmed, "seed has no host"));
    }
    Ok(url)
}

fn build_config(options: &AuditOptions) -> Result<CrawlConfig, ApiError> {
    let mut config = CrawlConfig::default();

    if let Some(max_pages) = options.max_pages {
        if max_pages == 0 || max_pages > MAX_PAGES_CEILING {
            return Err(ApiError::validation(format!(
                "max_pages must be between 1 and {}",
                MAX_PAGES_CEILING
            )));
        }
        config.budget.max_pages = max_pages;
    }
    if let Some(max_time_ms) = options.max_time_ms {
        if max_time_ms == 0 || max_time_ms > MAX_TIME_MS_CEILING {
            return Err(ApiError::validation(format!(
                "max_time_ms must be between 1 and {}",
                MAX_TIME_MS_CEILING
            )));
        }
        config.budget.max_time = Duration::from_millis(max_time_ms);
    }
    if let Some(concurrency) = options.concurrency {
        if concurrency == 0 || concurrency > MAX_CONCURRENCY {
            return Err(ApiError::validation(format!(
                "concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            )));
        }
        config.concurrency = concurrency;
    }
    if let Some(headless_pool) = options.headless_pool {
        if headless_pool > MAX_HEADLESS_POOL {
            return Err(ApiError::validation(format!(
                "headless_pool must be at most {}",
                MAX_HEADLESS_POOL
            )));
        }
        config.headless_pool = headless_pool;
    }
    if let Some(per_host_rps) = options.per_host_rps {
        if !(0.1..=50.0).contains(&per_host_rps) {
            return Err(ApiError::validation(
                "per_host_rps must be between 0.1 and 50",
            ));
        }
        config.per_host_rps = per_host_rps;
    }
    if let Some(respect_robots) = options.respect_robots {
        config.respect_robots = respect_robots;
    }
    if let Some(include_subdomains) = options.include_subdomains {
        config.include_subdomains = include_subdomains;
    }
    if let Some(suffix) = &options.user_agent_suffix {
        if suffix.len() > MAX_UA_SUFFIX_LEN || suffix.chars().any(|c| c.is_control()) {
            return Err(ApiError::validation("user_agent_suffix is not acceptable"));
        }
        config.user_agent_suffix = Some(suffix.clone());
    }

    config
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(url: &str) -> SubmitAuditBody {
        SubmitAuditBody {
            url: url.to_string(),
            options: AuditOptions::default(),
        }
    }

    #[test]
    fn accepts_a_plain_https_seed() {
        let (seed, config) = validate_submit(&body("https://example.com")).expect("validates");
        assert_eq!(seed.host_str(), Some("example.com"));
        assert_eq!(config.budget.max_pages, 50);
    }

    #[test]
    fn rejects_malformed_and_non_http_seeds() {
        assert!(validate_submit(&body("not a url")).is_err());
        assert!(validate_submit(&body("ftp://example.com")).is_err());
        assert!(validate_submit(&body("")).is_err());
    }

    #[test]
    fn rejects_out_of_range_options() {
        let mut over = body("https://example.com");
        over.options.max_pages = Some(10_000);
        assert!(validate_submit(&over).is_err());

        let mut zero = body("https://example.com");
        zero.options.concurrency = Some(0);
        assert!(validate_submit(&zero).is_err());
    }

    #[test]
    fn options_flow_into_the_config() {
        let mut custom = body("https://example.com");
        custom.options.max_pages = Some(10);
        custom.options.include_subdomains = Some(true);
        custom.options.headless_pool = Some(0);
        let (_, config) = validate_submit(&custom).expect("validates");
        assert_eq!(config.budget.max_pages, 10);
        assert!(config.include_subdomains);
        assert_eq!(config.headless_pool, 0);
    }
}
