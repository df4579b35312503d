//! Feed watcher
//!
//! Polls an append-only remote collection and hands only the newly appended
//! suffix to a handler. The collection is refetched in full on every cycle.
//!
//! Delivery is tracked by a single counter, the number of leading items
//! already delivered. It only moves forward, and only after a successful
//! dispatch, so a failed fetch or a failing handler leaves it where it was
//! and the same items are offered again on the next cycle.
//!
//! The counter lives in memory. A restarted watcher starts from zero and
//! redelivers every item currently present.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Boxed cause carried by watcher errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Source of the watched collection
#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Returns the full current collection, oldest first
    async fn fetch_all(&self) -> Result<Vec<Self::Item>, FetchError>;
}

/// Consumer of newly appended items
#[async_trait]
pub trait NewItemsHandler<T: Send + 'static>: Send + Sync + 'static {
    /// Receives the new suffix in feed order
    ///
    /// Returning an error (or panicking) while the watcher awaits completion
    /// leaves the items undelivered; they are offered again next cycle.
    async fn on_new_items(&self, items: Vec<T>) -> Result<(), HandlerError>;
}

#[derive(Debug, Error)]
#[error("feed fetch failed: {source}")]
pub struct FetchError {
    #[source]
    source: BoxError,
}

impl FetchError {
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self {
            source: cause.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(#[source] BoxError),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn new(cause: impl Into<BoxError>) -> Self {
        Self::Failed(cause.into())
    }
}

/// Watcher settings
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Spacing between the starts of consecutive poll cycles
    pub poll_interval: Duration,

    /// Await the handler before advancing. When false the handler is spawned
    /// and the items count as delivered once it is started.
    pub await_handler_completion: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            await_handler_completion: true,
        }
    }
}

/// What a single poll cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// This many new items were dispatched
    Delivered(usize),
    /// No growth since the last delivery (includes a shrunk feed)
    Unchanged,
    FetchFailed,
    HandlerFailed,
    /// Another cycle was already in flight
    Skipped,
}

/// Per-watcher delivery state
#[derive(Debug, Default)]
pub struct FeedState {
    last_seen: AtomicU64,
    in_flight: AtomicBool,
}

impl FeedState {
    pub fn last_seen_count(&self) -> u64 {
        self.last_seen.load(Ordering::Acquire)
    }

    fn advance(&self, count: u64) {
        self.last_seen.fetch_max(count, Ordering::AcqRel);
    }
}

/// Cleared on drop, so an early return or panic never leaves the watcher wedged
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Watches one feed and dispatches its growth to one handler
pub struct FeedWatcher<S, H> {
    source: S,
    handler: Arc<H>,
    config: WatcherConfig,
    state: Arc<FeedState>,
}

impl<S, H> FeedWatcher<S, H>
where
    S: FeedSource,
    H: NewItemsHandler<S::Item>,
{
    pub fn new(source: S, handler: H, config: WatcherConfig) -> Self {
        Self {
            source,
            handler: Arc::new(handler),
            config,
            state: Arc::new(FeedState::default()),
        }
    }

    #[allow(dead_code)]
    pub fn last_seen_count(&self) -> u64 {
        self.state.last_seen_count()
    }

    /// Spawns the polling task and returns a handle to stop it
    ///
    /// The first cycle runs as soon as the task is scheduled; later cycles
    /// start every `poll_interval`. A tick that comes due while a cycle is
    /// still running is skipped.
    pub fn start(self) -> WatcherHandle {
        let cancel = CancellationToken::new();
        let state = Arc::clone(&self.state);
        let token = cancel.clone();

        let task = tokio::spawn(async move { self.run(token).await });

        WatcherHandle {
            cancel,
            task,
            state,
        }
    }

    async fn run(self, cancel: CancellationToken) {
        info!(
            "Starting feed watcher (interval: {:?}, await handler: {})",
            self.config.poll_interval, self.config.await_handler_completion
        );

        let mut ticker = time::interval(self.config.poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.poll_once().await {
                CycleOutcome::Delivered(count) => {
                    debug!("Cycle delivered {} item(s)", count);
                }
                outcome => debug!("Cycle finished: {:?}", outcome),
            }
        }

        info!(
            "Feed watcher stopped ({} item(s) delivered)",
            self.state.last_seen_count()
        );
    }

    /// Runs a single fetch-compare-dispatch cycle
    pub async fn poll_once(&self) -> CycleOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.state.in_flight) else {
            debug!("Poll cycle already in flight, skipping");
            return CycleOutcome::Skipped;
        };

        debug!("Checking feed for new items");

        let fetch = AssertUnwindSafe(self.source.fetch_all()).catch_unwind();
        let mut items = match fetch.await {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => {
                warn!("Error checking feed: {}", e);
                return CycleOutcome::FetchFailed;
            }
            Err(panic) => {
                warn!("Feed fetch panicked: {}", panic_message(panic.as_ref()));
                return CycleOutcome::FetchFailed;
            }
        };

        let current = items.len() as u64;
        let last_seen = self.state.last_seen_count();

        if current < last_seen {
            warn!(
                "Feed shrank from {} to {} item(s); nothing to deliver",
                last_seen, current
            );
            return CycleOutcome::Unchanged;
        }
        if current == last_seen {
            return CycleOutcome::Unchanged;
        }

        let new_items = items.split_off(last_seen as usize);
        let count = new_items.len();
        info!(
            "{} new item(s) detected (positions {}..{})",
            count, last_seen, current
        );

        if !self.config.await_handler_completion {
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                if let Err(e) = handler.on_new_items(new_items).await {
                    error!("Detached handler failed: {}", e);
                }
            });
            self.state.advance(current);
            return CycleOutcome::Delivered(count);
        }

        let dispatch = AssertUnwindSafe(self.handler.on_new_items(new_items)).catch_unwind();
        let result = match dispatch.await {
            Ok(result) => result,
            Err(panic) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
        };

        match result {
            Ok(()) => {
                self.state.advance(current);
                CycleOutcome::Delivered(count)
            }
            Err(e) => {
                error!(
                    "{}; {} item(s) will be redelivered next cycle",
                    e, count
                );
                CycleOutcome::HandlerFailed
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle to a running watcher
///
/// Dropping the handle does not stop the watcher.
pub struct WatcherHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    state: Arc<FeedState>,
}

impl WatcherHandle {
    /// Prevents any further cycle from starting. A cycle already running
    /// finishes and its delivery still counts. Calling this again is a no-op.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stopping feed watcher");
            self.cancel.cancel();
        }
    }

    #[allow(dead_code)]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn last_seen_count(&self) -> u64 {
        self.state.last_seen_count()
    }

    /// Waits for the polling task to exit and returns the final delivered
    /// count; call after [`stop`](Self::stop)
    pub async fn stopped(self) -> u64 {
        if let Err(e) = self.task.await {
            warn!("Feed watcher task ended abnormally: {}", e);
        }
        self.state.last_seen_count()
    }
}
