//! Synthetic progress for background removal.
//!
//! The segmentation call offers no intermediate callbacks, so progress is
//! estimated on a timer: fast at first, then slower, and never reaching 100
//! until the call actually resolves.
//!
//! The percentage lives in a [`ProgressMeter`] (a `watch` channel) owned by
//! the session. Each estimation run is tagged with a run id; a reset or a
//! newer run makes older tickers, finishes and decays no-ops, so a stale
//! timer can never write into the current run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ProgressConfig;

/// Compute the next estimated percentage from the current one.
///
/// Values at or above the ceiling are returned unchanged, so the estimate
/// can never move backwards or past the ceiling.
pub fn next_percent(current: u8, config: &ProgressConfig) -> u8 {
    if current >= config.ceiling {
        return current;
    }
    let step = if current < config.fast_until {
        config.fast_step
    } else {
        config.slow_step
    };
    current.saturating_add(step).min(config.ceiling)
}

/// Shared progress value observed by the UI.
#[derive(Clone)]
pub struct ProgressMeter {
    sender: Arc<watch::Sender<u8>>,
    run: Arc<AtomicU64>,
}

impl Default for ProgressMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressMeter {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self {
            sender: Arc::new(sender),
            run: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current percentage.
    pub fn get(&self) -> u8 {
        *self.sender.borrow()
    }

    /// Subscribe to percentage changes.
    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.sender.subscribe()
    }

    /// Invalidate any active run and drop the value to 0.
    pub fn reset(&self) {
        self.sender.send_modify(|p| {
            self.run.fetch_add(1, Ordering::SeqCst);
            *p = 0;
        });
    }

    /// Start a new run at 0 and return its id.
    fn begin_run(&self) -> u64 {
        let mut id = 0;
        self.sender.send_modify(|p| {
            id = self.run.fetch_add(1, Ordering::SeqCst) + 1;
            *p = 0;
        });
        id
    }

    fn is_current(&self, id: u64) -> bool {
        self.run.load(Ordering::SeqCst) == id
    }

    /// Apply `f` only while `id` is the active run. Returns whether the
    /// value changed.
    fn update_if_current(&self, id: u64, f: impl FnOnce(u8) -> u8) -> bool {
        self.sender.send_if_modified(|p| {
            if !self.is_current(id) {
                return false;
            }
            let next = f(*p);
            let changed = next != *p;
            *p = next;
            changed
        })
    }
}

/// Starts progress estimation runs.
pub struct ProgressEstimator {
    config: ProgressConfig,
}

impl ProgressEstimator {
    pub fn new(config: ProgressConfig) -> Self {
        Self { config }
    }

    /// Start estimating on `meter`. The returned guard must be finished when
    /// the underlying operation resolves; dropping it cancels the ticker.
    pub fn start(&self, meter: &ProgressMeter) -> ProgressGuard {
        let id = meter.begin_run();
        let ticker_meter = meter.clone();
        let config = self.config.clone();

        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.tick());
            interval.tick().await; // first tick completes immediately
            loop {
                interval.tick().await;
                if !ticker_meter.is_current(id) {
                    break;
                }
                ticker_meter.update_if_current(id, |p| next_percent(p, &config));
            }
        });

        tracing::trace!("Progress run {} started", id);
        ProgressGuard {
            meter: meter.clone(),
            id,
            ticker: Some(ticker),
            settle: self.config.settle(),
        }
    }
}

/// Scoped handle for one estimation run.
pub struct ProgressGuard {
    meter: ProgressMeter,
    id: u64,
    ticker: Option<JoinHandle<()>>,
    settle: std::time::Duration,
}

impl ProgressGuard {
    /// The operation resolved: stop ticking, jump to 100, and decay to 0
    /// after the settle delay.
    pub fn finish(mut self) {
        self.stop_ticker();
        self.meter.update_if_current(self.id, |_| 100);

        let meter = self.meter.clone();
        let id = self.id;
        let settle = self.settle;
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            meter.update_if_current(id, |p| if p == 100 { 0 } else { p });
        });
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        // Dropped without finish(): the operation was abandoned.
        if self.ticker.is_some() {
            self.stop_ticker();
            self.meter.update_if_current(self.id, |_| 0);
            tracing::trace!("Progress run {} cancelled", self.id);
        }
    }
}
