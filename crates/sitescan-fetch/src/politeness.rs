use anyhow::{Context, Result};
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Per-origin politeness: a concurrency cap plus a minimum spacing between
/// request starts. A robots crawl-delay longer than the configured minimum
/// takes precedence.
#[derive(Debug)]
pub struct HostPoliteness {
    max_concurrent_per_host: usize,
    min_interval: Duration,
    /// Fractional jitter added to the spacing to avoid lockstep request
    /// trains against one origin.
    jitter_factor: f64,
    hosts: DashMap<String, Arc<HostGate>>,
}

#[derive(Debug)]
struct HostGate {
    semaphore: Arc<Semaphore>,
    last_start: Mutex<Option<Instant>>,
}

/// Held for the duration of one request to a host.
#[derive(Debug)]
pub struct PolitenessPermit {
    _permit: OwnedSemaphorePermit,
}

impl HostPoliteness {
    pub fn new(max_concurrent_per_host: usize, min_interval: Duration) -> Self {
        Self {
            max_concurrent_per_host,
            min_interval,
            jitter_factor: 0.1,
            hosts: DashMap::new(),
        }
    }

    /// Wait until a request to `host` may start, then return the permit that
    /// bounds in-flight requests to the host.
    pub async fn acquire(
        &self,
        host: &str,
        crawl_delay: Option<Duration>,
    ) -> Result<PolitenessPermit> {
        let gate = self
            .hosts
            .entry(host.to_string())
            .or_insert_with(|| {
                Arc::new(HostGate {
                    semaphore: Arc::new(Semaphore::new(self.max_concurrent_per_host)),
                    last_start: Mutex::new(None),
                })
            })
            .clone();

        let permit = gate
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Host politeness semaphore closed")?;

        let interval = self.spacing_with_jitter(crawl_delay);
        let wait = {
            let mut last_start = gate.last_start.lock().await;
            let now = Instant::now();
            let start_at = match *last_start {
                Some(previous) => (previous + interval).max(now),
                None => now,
            };
            *last_start = Some(start_at);
            start_at.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            debug!(host = %host, wait_ms = wait.as_millis() as u64, "Politeness delay before request");
            tokio::time::sleep(wait).await;
        }

        Ok(PolitenessPermit { _permit: permit })
    }

    fn spacing_with_jitter(&self, crawl_delay: Option<Duration>) -> Duration {
        let base = crawl_delay
            .filter(|delay| *delay > self.min_interval)
            .unwrap_or(self.min_interval);
        let jitter = base.as_secs_f64() * self.jitter_factor * rand::thread_rng().gen::<f64>();
        base + Duration::from_secs_f64(jitter)
    }
}
