//! Polling scheduler implementation

use detection_stats::{render, SharedBoard};
use detector_client::DetectorBackend;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Configuration for the polling scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period between polls in milliseconds (default: 1000)
    pub interval_ms: u64,
    /// Timeout for a single counter request in milliseconds (default: 5000)
    pub timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            timeout_ms: 5000,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Both periods must be non-zero
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_ms == 0 {
            return Err("polling.interval_ms must be greater than 0".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("polling.timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Running totals across every poll loop this scheduler has started
#[derive(Debug, Default)]
pub struct PollCounters {
    ticks: AtomicU64,
    rendered: AtomicU64,
    skipped: AtomicU64,
    live_loops: AtomicUsize,
}

/// Point-in-time copy of [`PollCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollSnapshot {
    pub ticks: u64,
    /// Responses written to the board
    pub rendered: u64,
    /// Timeouts, transport errors and `success: false` replies
    pub skipped: u64,
    /// Poll loops currently running
    pub live_loops: usize,
}

impl PollCounters {
    pub fn snapshot(&self) -> PollSnapshot {
        PollSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            rendered: self.rendered.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            live_loops: self.live_loops.load(Ordering::Relaxed),
        }
    }
}

/// Marks a poll loop as live for as long as its task exists
struct LiveLoop(Arc<PollCounters>);

impl LiveLoop {
    fn enter(counters: Arc<PollCounters>) -> Self {
        counters.live_loops.fetch_add(1, Ordering::Relaxed);
        Self(counters)
    }
}

impl Drop for LiveLoop {
    fn drop(&mut self) {
        self.0.live_loops.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Handle of the recurring poll task. Dropping it cancels the task,
/// including a request that is still in flight.
struct PollTimer {
    username: String,
    task: JoinHandle<()>,
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Scheduler owning the single poll timer
pub struct PollingScheduler<B: DetectorBackend> {
    backend: Arc<B>,
    board: SharedBoard,
    config: SchedulerConfig,
    slot: Option<PollTimer>,
    counters: Arc<PollCounters>,
}

impl<B: DetectorBackend> PollingScheduler<B> {
    pub fn new(backend: Arc<B>, board: SharedBoard, config: SchedulerConfig) -> Self {
        info!(
            "Creating polling scheduler: interval={}ms, timeout={}ms",
            config.interval_ms, config.timeout_ms
        );
        Self {
            backend,
            board,
            config,
            slot: None,
            counters: Arc::new(PollCounters::default()),
        }
    }

    /// Start polling counters for `username`, replacing any running timer.
    ///
    /// The first request is issued one interval after the call. A tick
    /// waits for its request to finish, so requests never overlap.
    /// An invalid config is logged and no timer is started.
    pub fn start_polling(&mut self, username: &str) {
        if let Some(previous) = self.slot.take() {
            debug!("Cancelling previous poll timer for {}", previous.username);
            drop(previous);
        }

        if let Err(reason) = self.config.validate() {
            error!("Detection polling not started: {}", reason);
            return;
        }

        let backend = Arc::clone(&self.backend);
        let board = Arc::clone(&self.board);
        let counters = Arc::clone(&self.counters);
        let period = self.config.interval();
        let timeout = self.config.timeout();
        let task_username = username.to_string();

        let task = tokio::spawn(async move {
            let _live = LiveLoop::enter(Arc::clone(&counters));
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                poll_once(backend.as_ref(), &board, &counters, &task_username, timeout).await;
            }
        });

        info!(
            "Periodic detection polling started for {} every {}ms",
            username, self.config.interval_ms
        );
        self.slot = Some(PollTimer {
            username: username.to_string(),
            task,
        });
    }

    /// Cancel the poll timer if one is running. Safe to call repeatedly.
    pub fn stop_polling(&mut self) {
        match self.slot.take() {
            Some(timer) => {
                info!("Periodic detection polling stopped for {}", timer.username);
                drop(timer);
            }
            None => debug!("No poll timer to stop"),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.slot.as_ref().is_some_and(|timer| !timer.task.is_finished())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn counters(&self) -> PollSnapshot {
        self.counters.snapshot()
    }
}

impl<B: DetectorBackend> Drop for PollingScheduler<B> {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

/// One poll tick: fetch, and render only a successful reply.
/// Failures are skipped silently and the loop carries on.
async fn poll_once<B: DetectorBackend>(
    backend: &B,
    board: &SharedBoard,
    counters: &PollCounters,
    username: &str,
    timeout: Duration,
) {
    counters.ticks.fetch_add(1, Ordering::Relaxed);

    match tokio::time::timeout(timeout, backend.fetch_stats(username)).await {
        Ok(Ok(response)) if response.success => {
            let rendered = render(&response);
            board.write().await.apply(rendered);
            counters.rendered.fetch_add(1, Ordering::Relaxed);
            return;
        }
        Ok(Ok(response)) => debug!(
            "Detection stats not available: {}",
            response.message.as_deref().unwrap_or("no message")
        ),
        Ok(Err(e)) => debug!("Detection stats request failed: {}", e),
        Err(_) => debug!("Detection stats request timed out after {}ms", timeout.as_millis()),
    }
    counters.skipped.fetch_add(1, Ordering::Relaxed);
}
