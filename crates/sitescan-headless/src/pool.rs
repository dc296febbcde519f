use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use spider_chrome::{Browser, BrowserConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tempfile::TempDir;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for the browser-context pool.
#[derive(Clone, Debug)]
pub struct BrowserPoolConfig {
    /// Cap on simultaneous browser contexts.
    pub pool_size: usize,
    /// Contexts are recycled after this many pages to bound memory creep.
    pub recycle_after_uses: u64,
    /// Optional base directory for per-browser profile dirs; system temp
    /// when unset.
    pub profile_base_dir: Option<std::path::PathBuf>,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            recycle_after_uses: 32,
            profile_base_dir: None,
        }
    }
}

/// Counters for pool monitoring.
#[derive(Debug, Default)]
pub struct PoolStats {
    pub launched: AtomicU64,
    pub recycled: AtomicU64,
    pub launch_failures: AtomicU64,
}

/// One live browser with its CDP event loop and profile directory.
///
/// Chrome enforces a singleton lock per profile, so every instance gets its
/// own temp profile dir; the `TempDir` handle keeps it alive until the
/// browser is dropped.
struct PooledBrowser {
    id: String,
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    created_at: Instant,
    uses: u64,
    _temp_dir: TempDir,
}

impl Drop for PooledBrowser {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

struct PoolInner {
    config: BrowserPoolConfig,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<PooledBrowser>>,
    stats: PoolStats,
}

/// Semaphore-bounded pool of browser contexts shared by one run's workers.
#[derive(Clone)]
pub struct BrowserPool {
    inner: Arc<PoolInner>,
}

impl BrowserPool {
    pub fn new(config: BrowserPoolConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.pool_size));
        Self {
            inner: Arc::new(PoolInner {
                config,
                semaphore,
                idle: Mutex::new(Vec::new()),
                stats: PoolStats::default(),
            }),
        }
    }

    /// Check out a context, launching one if no idle browser is available.
    /// Waits on the pool semaphore when all contexts are in use; cancelling
    /// the wait releases nothing because nothing was acquired.
    pub async fn checkout(&self) -> Result<BrowserCheckout> {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Browser pool semaphore closed")?;

        let reusable = {
            let mut idle = self.inner.idle.lock().unwrap_or_else(|e| e.into_inner());
            idle.pop()
        };

        let browser = match reusable {
            Some(mut pooled) => {
                pooled.uses += 1;
                debug!(browser_id = %pooled.id, uses = pooled.uses, "Reusing pooled browser");
                pooled
            }
            None => self.launch().await?,
        };

        Ok(BrowserCheckout {
            browser: Some(browser),
            inner: self.inner.clone(),
            _permit: permit,
        })
    }

    async fn launch(&self) -> Result<PooledBrowser> {
        let id = Uuid::new_v4().to_string();
        let temp_dir = match &self.inner.config.profile_base_dir {
            Some(base) => TempDir::new_in(base)
                .map_err(|e| anyhow!("Failed to create profile dir in {:?}: {}", base, e))?,
            None => TempDir::new().context("Failed to create profile dir")?,
        };

        let browser_config = BrowserConfig::builder()
            .user_data_dir(temp_dir.path())
            .arg("--deny-permission-prompts")
            .arg("--disable-background-networking")
            .arg("--disable-extensions")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            self.inner.stats.launch_failures.fetch_add(1, Ordering::Relaxed);
            anyhow!("Failed to launch browser: {}", e)
        })?;

        // The CDP event stream must be polled for the browser to make
        // progress; the task dies with the browser.
        let task_id = id.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!(browser_id = %task_id, "Browser event stream closed");
                    break;
                }
            }
        });

        self.inner.stats.launched.fetch_add(1, Ordering::Relaxed);
        info!(browser_id = %id, "Launched browser context");

        Ok(PooledBrowser {
            id,
            browser,
            handler_task,
            created_at: Instant::now(),
            uses: 1,
            _temp_dir: temp_dir,
        })
    }

    /// Idle contexts currently parked in the pool.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Permits currently available; equals `pool_size` when nothing is
    /// checked out.
    pub fn available_permits(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Close every idle browser. In-flight checkouts drain back and are
    /// dropped on return because the pool keeps no reference to them here.
    pub async fn shutdown(&self) {
        let drained: Vec<PooledBrowser> = {
            let mut idle = self.inner.idle.lock().unwrap_or_else(|e| e.into_inner());
            idle.drain(..).collect()
        };
        for mut pooled in drained {
            debug!(browser_id = %pooled.id, age_s = pooled.created_at.elapsed().as_secs(), "Closing browser");
            if let Err(e) = pooled.browser.close().await {
                warn!(browser_id = %pooled.id, error = %e, "Browser close failed");
            }
        }
        info!("Browser pool shut down");
    }
}

/// A checked-out browser context. Returning it to the pool happens on drop,
/// so a cancelled fetch still releases its context.
pub struct BrowserCheckout {
    browser: Option<PooledBrowser>,
    inner: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl BrowserCheckout {
    pub fn browser(&self) -> &Browser {
        // The option is only emptied in drop.
        &self.browser.as_ref().expect("checkout holds a browser").browser
    }
}

impl Drop for BrowserCheckout {
    fn drop(&mut self) {
        if let Some(pooled) = self.browser.take() {
            if pooled.uses >= self.inner.config.recycle_after_uses {
                self.inner.stats.recycled.fetch_add(1, Ordering::Relaxed);
                debug!(browser_id = %pooled.id, uses = pooled.uses, "Recycling browser at use limit");
                // Dropping the PooledBrowser aborts its handler task; the
                // process exits with the dropped Browser handle.
                return;
            }
            let mut idle = self.inner.idle.lock().unwrap_or_else(|e| e.into_inner());
            idle.push(pooled);
        }
    }
}
