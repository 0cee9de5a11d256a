//! Periodic listing refresh.
//!
//! [`RefreshScheduler`] fetches once immediately on [`start`](RefreshScheduler::start)
//! and then on a fixed interval (120 seconds by default). The returned
//! [`RefreshHandle`] owns the background task and publishes [`RefreshState`]
//! through a `tokio::sync::watch` channel.
//!
//! ```text
//!            start()
//!   Idle ───────────────┐
//!                       ▼
//!               ┌── fetch ok ──▶ Ready(new snapshot, no error)
//!   tick ──────▶│
//!               └── fetch err ─▶ Ready(previous snapshot, error)
//! ```
//!
//! At most one fetch is in flight. A tick that fires while a fetch is
//! outstanding is skipped, not queued. After [`RefreshHandle::stop`] returns,
//! the published state never changes again, even if a fetch completes later.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::asset_source::{AssetSource, ListingRequest, SourceError};
use crate::config::{CoinwatchConfig, ConfigError, DEFAULT_REFRESH_INTERVAL};
use crate::{Asset, Snapshot, UtcDateTime};

/// Whether any fetch has completed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPhase {
    /// No fetch has completed.
    #[default]
    Idle,
    /// At least one fetch completed, successfully or not.
    Ready,
}

/// Observable scheduler state.
#[derive(Debug, Clone, Default)]
pub struct RefreshState {
    pub phase: RefreshPhase,
    /// Latest successful snapshot, or empty if none succeeded yet.
    pub snapshot: Snapshot,
    pub loading: bool,
    /// Error from the most recent fetch; cleared by the next success.
    pub last_error: Option<SourceError>,
    pub last_success: Option<UtcDateTime>,
    /// Number of snapshots applied so far.
    pub generation: u64,
}

impl RefreshState {
    pub fn is_ready(&self) -> bool {
        self.phase == RefreshPhase::Ready
    }
}

/// Configured but not yet running refresh loop.
#[derive(Clone)]
pub struct RefreshScheduler {
    source: Arc<dyn AssetSource>,
    request: ListingRequest,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(source: Arc<dyn AssetSource>, request: ListingRequest) -> Self {
        Self {
            source,
            request,
            interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    pub fn from_config(
        source: Arc<dyn AssetSource>,
        config: &CoinwatchConfig,
    ) -> Result<Self, ConfigError> {
        let request = config.listing_request()?;
        Ok(Self::new(source, request).with_interval(config.refresh_interval))
    }

    /// Overrides the refresh period. A zero interval is clamped to one
    /// millisecond.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawns the refresh loop on the current tokio runtime.
    ///
    /// The first fetch starts immediately.
    pub fn start(self) -> RefreshHandle {
        let (state, _) = watch::channel(RefreshState::default());
        let shared = Arc::new(Shared {
            source: self.source,
            request: self.request,
            state,
            in_flight: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            apply_lock: Mutex::new(()),
        });

        tracing::info!(
            source = shared.source.name(),
            interval_secs = self.interval.as_secs_f64(),
            per_page = shared.request.per_page,
            currency = %shared.request.currency,
            "starting listing refresh"
        );

        let task = tokio::spawn(run_loop(Arc::clone(&shared), self.interval));
        RefreshHandle {
            shared,
            task: Mutex::new(Some(task)),
        }
    }
}

struct Shared {
    source: Arc<dyn AssetSource>,
    request: ListingRequest,
    state: watch::Sender<RefreshState>,
    in_flight: AtomicBool,
    cancel: CancellationToken,
    // Serializes state writes against `stop`.
    apply_lock: Mutex<()>,
}

impl Shared {
    /// Starts a fetch unless one is already running. Returns whether it did.
    fn trigger(self: &Arc<Self>, reason: &'static str) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(reason, "refresh already in flight, skipping");
            return false;
        }

        {
            let _guard = self.apply_lock.lock().unwrap_or_else(PoisonError::into_inner);
            if self.cancel.is_cancelled() {
                self.in_flight.store(false, Ordering::Release);
                return false;
            }
            self.state.send_if_modified(|state| {
                let changed = !state.loading;
                state.loading = true;
                changed
            });
        }

        tracing::debug!(reason, source = self.source.name(), "refresh started");
        tokio::spawn(Arc::clone(self).fetch_and_apply());
        true
    }

    async fn fetch_and_apply(self: Arc<Self>) {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.source.fetch_listing(self.request.clone()) => Some(result),
        };

        let _guard = self.apply_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Cleared before publishing so observers of `loading == false` can
        // trigger again.
        self.in_flight.store(false, Ordering::Release);
        match result {
            Some(result) if !self.cancel.is_cancelled() => self.apply(result),
            _ => tracing::debug!("discarding refresh result after stop"),
        }
    }

    fn apply(&self, result: Result<Vec<Asset>, SourceError>) {
        let fetched_at = UtcDateTime::now();
        let outcome = result.and_then(|assets| {
            Snapshot::try_new(assets, fetched_at)
                .map_err(|error| SourceError::decode(format!("rejected listing: {error}")))
        });

        match outcome {
            Ok(snapshot) => {
                let count = snapshot.len();
                self.state.send_modify(|state| {
                    state.phase = RefreshPhase::Ready;
                    state.snapshot = snapshot;
                    state.loading = false;
                    state.last_error = None;
                    state.last_success = Some(fetched_at);
                    state.generation += 1;
                });
                tracing::info!(assets = count, "listing refreshed");
            }
            Err(error) => {
                tracing::warn!(
                    code = error.code(),
                    retryable = error.retryable(),
                    error = %error,
                    "listing refresh failed, keeping previous snapshot"
                );
                self.state.send_modify(|state| {
                    state.phase = RefreshPhase::Ready;
                    state.loading = false;
                    state.last_error = Some(error);
                });
            }
        }
    }
}

async fn run_loop(shared: Arc<Shared>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            _ = ticker.tick() => {
                shared.trigger("tick");
            }
        }
    }

    tracing::debug!("refresh loop exited");
}

/// Running refresh loop. Dropping the handle stops it.
pub struct RefreshHandle {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshHandle {
    /// Requests an immediate fetch outside the timer.
    ///
    /// Returns `false` when a fetch is already in flight or the scheduler is
    /// stopped. Must be called from within a tokio runtime.
    pub fn refresh_now(&self) -> bool {
        self.shared.trigger("manual")
    }

    /// Receiver that observes every published [`RefreshState`].
    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> RefreshState {
        self.shared.state.borrow().clone()
    }

    pub fn current_snapshot(&self) -> Snapshot {
        self.shared.state.borrow().snapshot.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().loading
    }

    pub fn last_error(&self) -> Option<SourceError> {
        self.shared.state.borrow().last_error.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Cancels the timer and any outstanding fetch. Idempotent.
    ///
    /// Once this returns, no further state is published. A fetch that was in
    /// flight is discarded and `loading` reads `false`.
    pub fn stop(&self) {
        let _guard = self.shared.apply_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shared.cancel.is_cancelled() {
            return;
        }
        self.shared.cancel.cancel();
        self.shared.state.send_if_modified(|state| {
            let changed = state.loading;
            state.loading = false;
            changed
        });
        tracing::info!(source = self.shared.source.name(), "listing refresh stopped");
    }

    /// Stops the scheduler and waits for the loop task to exit.
    pub async fn shutdown(self) {
        self.stop();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(error) = task.await {
                tracing::warn!(%error, "refresh loop ended abnormally");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.stop();
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_source::{SourceErrorKind, SourceFuture};
    use crate::Currency;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    struct ScriptedSource {
        replies: Mutex<VecDeque<Result<Vec<Asset>, SourceError>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Result<Vec<Asset>, SourceError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn gated(replies: Vec<Result<Vec<Asset>, SourceError>>, gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(replies)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AssetSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn fetch_listing<'a>(&'a self, _request: ListingRequest) -> SourceFuture<'a, Vec<Asset>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(gate) = &self.gate {
                    gate.acquire().await.expect("gate open").forget();
                }
                self.replies
                    .lock()
                    .expect("replies lock")
                    .pop_front()
                    .unwrap_or_else(|| Ok(Vec::new()))
            })
        }

        fn fetch_by_ids<'a>(&'a self, _ids: Vec<String>) -> SourceFuture<'a, Vec<Asset>> {
            Box::pin(async { Err(SourceError::invalid_request("not scripted")) })
        }

        fn fetch_one<'a>(&'a self, id: &'a str) -> SourceFuture<'a, Asset> {
            Box::pin(async move { Err(SourceError::not_found(id)) })
        }
    }

    fn listing() -> Vec<Asset> {
        vec![
            Asset::new("btc", "btc", "Bitcoin", 67_000.0).expect("valid"),
            Asset::new("eth", "eth", "Ethereum", 3_500.0).expect("valid"),
        ]
    }

    fn request() -> ListingRequest {
        ListingRequest::new(Currency::usd(), 50).expect("valid request")
    }

    async fn wait_until(
        rx: &mut watch::Receiver<RefreshState>,
        predicate: impl FnMut(&RefreshState) -> bool,
    ) -> RefreshState {
        tokio::time::timeout(Duration::from_secs(600), rx.wait_for(predicate))
            .await
            .expect("state change before timeout")
            .expect("scheduler alive")
            .clone()
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_is_immediate() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(listing())]));
        let handle = RefreshScheduler::new(source.clone(), request()).start();
        let mut rx = handle.subscribe();

        let state = wait_until(&mut rx, RefreshState::is_ready).await;

        assert_eq!(state.snapshot.len(), 2);
        assert_eq!(state.generation, 1);
        assert!(state.last_error.is_none());
        assert!(state.last_success.is_some());
        assert!(!handle.is_loading());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_before_any_success_is_ready_and_empty() {
        let source = Arc::new(ScriptedSource::new(vec![Err(SourceError::network(
            "connection reset",
        ))]));
        let handle = RefreshScheduler::new(source, request()).start();
        let mut rx = handle.subscribe();

        let state = wait_until(&mut rx, RefreshState::is_ready).await;

        assert!(state.snapshot.is_empty());
        assert_eq!(
            state.last_error.map(|error| error.kind()),
            Some(SourceErrorKind::Network)
        );
        assert_eq!(state.generation, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_ids_are_reported_as_decode_failure() {
        let mut duplicated = listing();
        duplicated.push(duplicated[0].clone());
        let source = Arc::new(ScriptedSource::new(vec![Ok(duplicated)]));
        let handle = RefreshScheduler::new(source, request()).start();
        let mut rx = handle.subscribe();

        let state = wait_until(&mut rx, RefreshState::is_ready).await;

        assert_eq!(
            state.last_error.map(|error| error.kind()),
            Some(SourceErrorKind::Decode)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_now_is_rejected_while_fetching() {
        let gate = Arc::new(Semaphore::new(0));
        let source = Arc::new(ScriptedSource::gated(
            vec![Ok(listing()), Ok(listing())],
            gate.clone(),
        ));
        let handle = RefreshScheduler::new(source.clone(), request()).start();
        let mut rx = handle.subscribe();

        wait_until(&mut rx, |state| state.loading).await;
        assert!(!handle.refresh_now());

        gate.add_permits(1);
        wait_until(&mut rx, |state| state.generation == 1).await;

        assert!(handle.refresh_now());
        gate.add_permits(1);
        wait_until(&mut rx, |state| state.generation == 2).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_blocks_refresh_now() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(listing())]));
        let handle = RefreshScheduler::new(source, request()).start();

        handle.stop();
        handle.stop();

        assert!(handle.is_stopped());
        assert!(!handle.refresh_now());
        handle.shutdown().await;
    }

    #[test]
    fn zero_interval_is_clamped() {
        let source = Arc::new(ScriptedSource::new(Vec::new()));
        let scheduler = RefreshScheduler::new(source, request()).with_interval(Duration::ZERO);
        assert_eq!(scheduler.interval(), Duration::from_millis(1));
    }
}
