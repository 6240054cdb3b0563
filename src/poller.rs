//! Snapshot poller: timer-driven fetches of the bridge's full snapshot.
//!
//! At most one fetch is in flight. Timer ticks and refresh requests that
//! arrive while one is pending are dropped, not queued. The in-flight fetch
//! is a future owned by the poller; [`SnapshotPoller::stop`] drops it, so a
//! result that would have arrived later is never applied.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use obdwatch_adapters::AdapterError;
use obdwatch_types::{now_ms, Snapshot, SnapshotView};

use crate::data::duration::format_duration;
use crate::source::SnapshotFetcher;

/// Shortest accepted poll interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

type FetchFuture = BoxFuture<'static, Result<Snapshot, AdapterError>>;

/// The latest good snapshot next to the latest failure.
///
/// The two sides are independent: a failure never erases the snapshot and a
/// success never clears the error. Compare `last_error_at` with
/// `last_fetched_at` to tell which is newer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotState {
    pub snapshot: Option<SnapshotView>,
    /// Milliseconds since the Unix epoch of the last successful fetch.
    pub last_fetched_at: Option<u64>,
    pub last_error: Option<String>,
    pub last_error_at: Option<u64>,
}

/// What [`SnapshotPoller::next`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// A tick started a fetch.
    Started,
    /// A tick arrived while a fetch was pending and was dropped.
    Skipped,
    /// A fetch succeeded and replaced the snapshot.
    Updated,
    /// A fetch failed; the message is now the sticky error.
    Failed(String),
}

/// Periodically fetches snapshots from a [`SnapshotFetcher`].
pub struct SnapshotPoller {
    fetcher: Arc<dyn SnapshotFetcher>,
    timer: Option<Interval>,
    period: Duration,
    in_flight: Option<FetchFuture>,
    state: SnapshotState,
}

impl std::fmt::Debug for SnapshotPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotPoller")
            .field("fetcher", &self.fetcher.description())
            .field("running", &self.is_running())
            .field("period", &self.period)
            .field("fetching", &self.is_fetching())
            .field("state", &self.state)
            .finish()
    }
}

impl SnapshotPoller {
    pub fn new(fetcher: Arc<dyn SnapshotFetcher>) -> Self {
        Self {
            fetcher,
            timer: None,
            period: Duration::ZERO,
            in_flight: None,
            state: SnapshotState::default(),
        }
    }

    pub fn from_fetcher<F: SnapshotFetcher + 'static>(fetcher: F) -> Self {
        Self::new(Arc::new(fetcher))
    }

    pub fn state(&self) -> &SnapshotState {
        &self.state
    }

    /// Whether the periodic timer is armed.
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Whether a fetch is in flight.
    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The effective interval of the last `start`.
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn description(&self) -> &str {
        self.fetcher.description()
    }

    /// Fetch now, then every `period` (clamped to [`MIN_INTERVAL`]).
    ///
    /// Starting a running poller re-arms the timer with the new period; a
    /// fetch already in flight is kept.
    pub fn start(&mut self, period: Duration) {
        let period = period.max(MIN_INTERVAL);
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.period = period;
        self.timer = Some(timer);
        info!(
            source = self.fetcher.description(),
            interval = %format_duration(period),
            "snapshot poller started"
        );
        self.refresh_now();
    }

    /// Disarm the timer and cancel any pending fetch. Idempotent.
    pub fn stop(&mut self) {
        if self.timer.take().is_some() {
            info!(source = self.fetcher.description(), "snapshot poller stopped");
        }
        if self.in_flight.take().is_some() {
            debug!("pending snapshot fetch cancelled");
        }
    }

    /// Start an out-of-band fetch unless one is already in flight.
    ///
    /// Returns whether a fetch was started. Works whether or not the timer
    /// is running.
    pub fn refresh_now(&mut self) -> bool {
        if self.in_flight.is_some() {
            debug!("snapshot fetch already in flight, refresh dropped");
            return false;
        }

        let fetcher = Arc::clone(&self.fetcher);
        self.in_flight = Some(Box::pin(async move { fetcher.fetch().await }));
        true
    }

    /// Drive the poller until the next tick or fetch completion.
    ///
    /// Pends forever when stopped and idle. Cancel safe: dropping the
    /// returned future loses neither the timer nor the pending fetch.
    pub async fn next(&mut self) -> PollEvent {
        tokio::select! {
            biased;

            result = wait_in_flight(&mut self.in_flight) => {
                self.in_flight = None;
                self.apply(result)
            }
            _ = wait_tick(&mut self.timer) => {
                if self.refresh_now() {
                    PollEvent::Started
                } else {
                    debug!("poll tick skipped, fetch still in flight");
                    PollEvent::Skipped
                }
            }
        }
    }

    fn apply(&mut self, result: Result<Snapshot, AdapterError>) -> PollEvent {
        match result {
            Ok(snapshot) => {
                let view = SnapshotView::from(snapshot);
                debug!(dtcs = view.dtcs.len(), "snapshot updated");
                self.state.snapshot = Some(view);
                self.state.last_fetched_at = Some(now_ms());
                PollEvent::Updated
            }
            Err(e) => {
                let message = e.to_string();
                warn!(source = self.fetcher.description(), error = %message, "snapshot fetch failed");
                self.state.last_error = Some(message.clone());
                self.state.last_error_at = Some(now_ms());
                PollEvent::Failed(message)
            }
        }
    }
}

async fn wait_in_flight(in_flight: &mut Option<FetchFuture>) -> Result<Snapshot, AdapterError> {
    match in_flight.as_mut() {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

async fn wait_tick(timer: &mut Option<Interval>) {
    match timer.as_mut() {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use obdwatch_types::DtcEntry;
    use parking_lot::Mutex;

    /// Replays scripted results, each after `delay`.
    #[derive(Debug, Default)]
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<Snapshot, AdapterError>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedFetcher {
        fn new(delay: Duration, script: Vec<Result<Snapshot, AdapterError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotFetcher for ScriptedFetcher {
        async fn fetch(&self) -> Result<Snapshot, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            next.unwrap_or_else(|| Ok(Snapshot::default()))
        }

        fn description(&self) -> &str {
            "scripted"
        }
    }

    fn snapshot(json: &str) -> Snapshot {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fetches_immediately() {
        let fetcher = ScriptedFetcher::new(Duration::ZERO, vec![Ok(snapshot(r#"{"live":{"rpm":900}}"#))]);
        let mut poller = SnapshotPoller::new(fetcher.clone());

        poller.start(Duration::from_secs(2));
        assert!(poller.is_fetching());
        assert_eq!(poller.next().await, PollEvent::Updated);

        assert_eq!(fetcher.calls(), 1);
        let state = poller.state();
        assert_eq!(state.snapshot.as_ref().unwrap().live.rpm, Some(900.0));
        assert!(state.last_fetched_at.is_some());
        assert!(state.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_while_in_flight_are_dropped() {
        let fetcher = ScriptedFetcher::new(Duration::from_millis(2500), vec![]);
        let mut poller = SnapshotPoller::new(fetcher.clone());

        poller.start(Duration::from_secs(1));
        assert_eq!(poller.next().await, PollEvent::Skipped);
        assert_eq!(poller.next().await, PollEvent::Skipped);
        assert!(!poller.refresh_now());
        assert_eq!(fetcher.calls(), 1);

        assert_eq!(poller.next().await, PollEvent::Updated);
        assert_eq!(poller.next().await, PollEvent::Started);
        assert_eq!(poller.next().await, PollEvent::Skipped);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_prior_snapshot() {
        let fetcher = ScriptedFetcher::new(
            Duration::ZERO,
            vec![
                Ok(snapshot(r#"{"status":{"fuel_level":40}}"#)),
                Err(AdapterError::Timeout),
            ],
        );
        let mut poller = SnapshotPoller::new(fetcher);

        poller.start(Duration::from_secs(1));
        assert_eq!(poller.next().await, PollEvent::Updated);
        let fetched_at = poller.state().last_fetched_at;

        assert_eq!(poller.next().await, PollEvent::Started);
        assert_eq!(poller.next().await, PollEvent::Failed("Request timed out".into()));

        let state = poller.state();
        assert_eq!(state.snapshot.as_ref().unwrap().status.fuel_level, Some(40.0));
        assert_eq!(state.last_fetched_at, fetched_at);
        assert_eq!(state.last_error.as_deref(), Some("Request timed out"));
        assert!(state.last_error_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_does_not_clear_error() {
        let fetcher = ScriptedFetcher::new(
            Duration::ZERO,
            vec![Err(AdapterError::Connection("refused".into())), Ok(Snapshot::default())],
        );
        let mut poller = SnapshotPoller::new(fetcher);

        poller.start(Duration::from_secs(1));
        assert!(matches!(poller.next().await, PollEvent::Failed(_)));
        assert!(poller.state().snapshot.is_none());

        assert!(poller.refresh_now());
        assert_eq!(poller.next().await, PollEvent::Updated);

        let state = poller.state();
        assert!(state.snapshot.is_some());
        assert_eq!(state.last_error.as_deref(), Some("Connection failed: refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_fetch() {
        let fetcher = ScriptedFetcher::new(
            Duration::from_secs(1),
            vec![Ok(snapshot(r#"{"live":{"rpm":1}}"#))],
        );
        let mut poller = SnapshotPoller::new(fetcher.clone());

        poller.start(Duration::from_secs(5));
        poller.stop();
        poller.stop();

        assert!(!poller.is_running());
        assert!(!poller.is_fetching());
        let waited = tokio::time::timeout(Duration::from_secs(30), poller.next()).await;
        assert!(waited.is_err());
        assert!(poller.state().snapshot.is_none());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_without_timer() {
        let fetcher = ScriptedFetcher::new(Duration::ZERO, vec![]);
        let mut poller = SnapshotPoller::new(fetcher.clone());

        assert!(poller.refresh_now());
        assert_eq!(poller.next().await, PollEvent::Updated);
        assert!(!poller.is_running());
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_is_clamped_and_restart_rearms() {
        let fetcher = ScriptedFetcher::new(Duration::ZERO, vec![]);
        let mut poller = SnapshotPoller::new(fetcher);

        poller.start(Duration::from_millis(10));
        assert_eq!(poller.period(), MIN_INTERVAL);

        poller.start(Duration::from_secs(3));
        assert_eq!(poller.period(), Duration::from_secs(3));
        assert!(poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trouble_codes_are_normalized() {
        let fetcher = ScriptedFetcher::new(
            Duration::ZERO,
            vec![Ok(snapshot(
                r#"{"diagnostics":{"dtcs":["P0301",{"code":"P0171","status":"active","description":"System too lean"}]}}"#,
            ))],
        );
        let mut poller = SnapshotPoller::new(fetcher);

        poller.refresh_now();
        poller.next().await;

        let dtcs = &poller.state().snapshot.as_ref().unwrap().dtcs;
        assert_eq!(dtcs[0], DtcEntry::bare("P0301"));
        assert_eq!(dtcs[1].description.as_deref(), Some("System too lean"));
    }
}
