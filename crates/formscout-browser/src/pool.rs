//! Fixed-size pool of isolated browser contexts.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use formscout_config::BrowserConfig;
use formscout_protocols::{BrowserContext, BrowserDriver, BrowserError, BrowserPage, ContextOptions};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One pool entry.
struct BrowserSlot {
    id: usize,
    context: Arc<dyn BrowserContext>,
    analysis_count: u64,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub size: usize,
    pub available: usize,
    pub in_use: usize,
    /// Highest number of slots ever held at once.
    pub peak_in_use: usize,
    pub total_acquisitions: u64,
    /// Completed analyses per slot id, for slots currently in the pool.
    pub analyses_per_slot: Vec<(usize, u64)>,
}

/// Hands out isolated browser contexts, at most one caller per slot.
///
/// A permit on the semaphore is taken before a slot is popped from the
/// ready queue, so the queue is never empty for a permit holder and no
/// slot is ever given to two callers.
pub struct BrowserPool {
    driver: Arc<dyn BrowserDriver>,
    ready: Mutex<VecDeque<BrowserSlot>>,
    semaphore: Semaphore,
    size: usize,
    in_use: AtomicUsize,
    peak_in_use: AtomicUsize,
    total_acquisitions: AtomicU64,
    closed: AtomicBool,
    contexts: Vec<Arc<dyn BrowserContext>>,
}

impl BrowserPool {
    /// Create `config.pool_size` contexts, each with a user agent drawn at
    /// random from `config.user_agents`.
    pub async fn new(
        driver: Arc<dyn BrowserDriver>,
        config: &BrowserConfig,
    ) -> Result<Self, BrowserError> {
        if config.pool_size == 0 {
            return Err(BrowserError::Launch("pool size must be at least 1".to_string()));
        }

        let mut contexts: Vec<Arc<dyn BrowserContext>> = Vec::with_capacity(config.pool_size);
        for _ in 0..config.pool_size {
            let options = ContextOptions {
                user_agent: pick_user_agent(&config.user_agents),
                navigation_timeout_ms: config.navigation_timeout_ms,
                ..Default::default()
            };
            match driver.new_context(options).await {
                Ok(context) => contexts.push(context),
                Err(e) => {
                    for context in &contexts {
                        if let Err(close_err) = context.close().await {
                            warn!("Failed to close context {}: {}", context.id(), close_err);
                        }
                    }
                    return Err(e);
                }
            }
        }

        let ready = contexts
            .iter()
            .enumerate()
            .map(|(id, context)| BrowserSlot {
                id,
                context: context.clone(),
                analysis_count: 0,
            })
            .collect();

        info!("Browser pool ready with {} contexts", config.pool_size);
        Ok(Self {
            driver,
            ready: Mutex::new(ready),
            semaphore: Semaphore::new(config.pool_size),
            size: config.pool_size,
            in_use: AtomicUsize::new(0),
            peak_in_use: AtomicUsize::new(0),
            total_acquisitions: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            contexts,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait for a free slot.
    ///
    /// Fails with [`BrowserError::Cancelled`] when `cancel` fires first and
    /// with [`BrowserError::PoolClosed`] once the pool is torn down.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<SlotGuard<'_>, BrowserError> {
        if self.is_closed() {
            return Err(BrowserError::PoolClosed);
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BrowserError::Cancelled),
            permit = self.semaphore.acquire() => permit.map_err(|_| BrowserError::PoolClosed)?,
        };

        let slot = self.ready.lock().pop_front().ok_or(BrowserError::PoolClosed)?;

        let in_use = self.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_use.fetch_max(in_use, Ordering::SeqCst);
        self.total_acquisitions.fetch_add(1, Ordering::SeqCst);
        debug!("Acquired browser slot {}", slot.id);

        Ok(SlotGuard {
            pool: self,
            slot: Some(slot),
            _permit: permit,
        })
    }

    fn release(&self, slot: BrowserSlot) {
        debug!("Released browser slot {}", slot.id);
        self.in_use.fetch_sub(1, Ordering::SeqCst);
        self.ready.lock().push_back(slot);
    }

    pub fn stats(&self) -> PoolStats {
        let mut analyses_per_slot: Vec<(usize, u64)> = self
            .ready
            .lock()
            .iter()
            .map(|s| (s.id, s.analysis_count))
            .collect();
        analyses_per_slot.sort_unstable();

        PoolStats {
            size: self.size,
            available: self.available(),
            in_use: self.in_use.load(Ordering::SeqCst),
            peak_in_use: self.peak_in_use.load(Ordering::SeqCst),
            total_acquisitions: self.total_acquisitions.load(Ordering::SeqCst),
            analyses_per_slot,
        }
    }

    /// Close every context and then the driver. Individual failures are
    /// logged and do not stop the rest; returns how many closes failed.
    pub async fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }
        self.semaphore.close();

        let mut failures = 0;
        for context in &self.contexts {
            if let Err(e) = context.close().await {
                warn!("Failed to close browser context {}: {}", context.id(), e);
                failures += 1;
            }
        }
        if let Err(e) = self.driver.close().await {
            warn!("Failed to close browser: {}", e);
            failures += 1;
        }

        info!(
            "Browser pool closed ({} contexts, {} failures)",
            self.contexts.len(),
            failures
        );
        failures
    }
}

fn pick_user_agent(candidates: &[String]) -> String {
    candidates
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_default()
}

/// Exclusive hold on one pool slot. The slot goes back to the pool when the
/// guard is dropped, including on error and cancellation paths.
pub struct SlotGuard<'a> {
    pool: &'a BrowserPool,
    slot: Option<BrowserSlot>,
    // Dropped after `Drop::drop` has returned the slot.
    _permit: SemaphorePermit<'a>,
}

impl SlotGuard<'_> {
    pub fn id(&self) -> usize {
        self.slot.as_ref().map(|s| s.id).unwrap_or_default()
    }

    pub fn context(&self) -> Option<&Arc<dyn BrowserContext>> {
        self.slot.as_ref().map(|s| &s.context)
    }

    pub fn user_agent(&self) -> &str {
        self.slot.as_ref().map(|s| s.context.user_agent()).unwrap_or("")
    }

    pub fn analysis_count(&self) -> u64 {
        self.slot.as_ref().map(|s| s.analysis_count).unwrap_or_default()
    }

    /// Open a fresh page in this slot's context.
    pub async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        match &self.slot {
            Some(slot) => slot.context.new_page().await,
            None => Err(BrowserError::PoolClosed),
        }
    }

    /// Count one finished analysis against this slot.
    pub fn record_analysis(&mut self) {
        if let Some(slot) = self.slot.as_mut() {
            slot.analysis_count += 1;
        }
    }

    /// Return the slot now instead of at end of scope.
    pub fn release(self) {}
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.release(slot);
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
