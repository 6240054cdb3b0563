//! Application state and the event loop.
//!
//! [`App`] owns one session, one history store, an optional snapshot poller
//! and the threshold table. [`App::run`] reacts to stream events, poll
//! ticks, fetch completions and commands one at a time on a single task,
//! and publishes a fresh [`ViewState`] to every observer after each change.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use obdwatch_types::{Metric, TelemetryRecord};

use crate::config::{Settings, TrendSettings};
use crate::data::{normalize, AlertStatus, HistoryStore, Point, Thresholds};
use crate::poller::{PollEvent, SnapshotPoller, SnapshotState};
use crate::session::{ConnectionSession, DtcReport, SessionChange, SessionStatus};
use crate::source::{Connector, SnapshotFetcher};

const COMMAND_BUFFER: usize = 16;

/// One metric's trend, ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub metric: Metric,
    pub points: Vec<Point>,
}

/// Everything a consumer needs to render the current state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub session: SessionStatus,
    pub session_error: Option<String>,
    /// Newest value of every metric, merged across group messages.
    pub latest: Option<TelemetryRecord>,
    /// Classification of `latest`, one entry per ruled metric.
    pub alerts: BTreeMap<Metric, AlertStatus>,
    /// Trouble codes pushed over the stream.
    pub stream_dtcs: Option<DtcReport>,
    pub trends: Vec<TrendSeries>,
    /// Feed window, newest first.
    pub recent: Vec<TelemetryRecord>,
    pub snapshot: SnapshotState,
    /// Classification of the latest snapshot's readings.
    pub snapshot_alerts: BTreeMap<Metric, AlertStatus>,
    pub accepted_messages: u64,
    pub dropped_messages: u64,
}

impl ViewState {
    /// The highest alert level across stream and snapshot readings.
    pub fn worst_alert(&self) -> AlertStatus {
        self.alerts
            .values()
            .chain(self.snapshot_alerts.values())
            .copied()
            .max()
            .unwrap_or_default()
    }
}

/// Requests accepted by a running [`App`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Fetch a snapshot now unless one is in flight.
    RefreshNow,
    /// Close the stream session and open a fresh one.
    Reconnect,
    /// Close the stream session.
    Disconnect,
    /// Stop everything and return from [`App::run`].
    Shutdown,
}

/// Cloneable handle for observing and steering a running [`App`].
#[derive(Debug, Clone)]
pub struct AppHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ViewState>,
}

impl AppHandle {
    /// Queue a command. Returns `false` once the app has shut down.
    pub async fn send(&self, command: Command) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub async fn refresh_now(&self) -> bool {
        self.send(Command::RefreshNow).await
    }

    pub async fn reconnect(&self) -> bool {
        self.send(Command::Reconnect).await
    }

    pub async fn shutdown(&self) -> bool {
        self.send(Command::Shutdown).await
    }

    /// A receiver notified on every published view.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.clone()
    }

    /// The most recently published view.
    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }
}

/// Main application state.
pub struct App<C: Connector> {
    session: ConnectionSession<C>,
    store: HistoryStore,
    poller: Option<SnapshotPoller>,
    poll_interval: Duration,
    thresholds: Thresholds,
    trend: TrendSettings,
    view_tx: watch::Sender<ViewState>,
    commands: mpsc::Receiver<Command>,
    command_tx: mpsc::Sender<Command>,
}

impl<C: Connector> App<C> {
    /// Create an app streaming from `settings.stream.address` through `connector`.
    pub fn new(connector: C, settings: &Settings) -> Self {
        let (view_tx, _) = watch::channel(ViewState::default());
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);

        Self {
            session: ConnectionSession::new(connector, settings.stream.address.clone()),
            store: HistoryStore::with_capacity(
                settings.history.detail_capacity,
                settings.history.feed_capacity,
            ),
            poller: None,
            poll_interval: settings.snapshot.interval(),
            thresholds: settings.thresholds.clone(),
            trend: settings.trend.clone(),
            view_tx,
            commands,
            command_tx,
        }
    }

    /// Poll snapshots from `fetcher` every configured interval.
    pub fn with_snapshot_source(mut self, fetcher: Arc<dyn SnapshotFetcher>) -> Self {
        self.poller = Some(SnapshotPoller::new(fetcher));
        self
    }

    pub fn handle(&self) -> AppHandle {
        AppHandle {
            commands: self.command_tx.clone(),
            view: self.view_tx.subscribe(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view_tx.subscribe()
    }

    pub fn session(&self) -> &ConnectionSession<C> {
        &self.session
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn poller(&self) -> Option<&SnapshotPoller> {
        self.poller.as_ref()
    }

    /// Open the stream session and start polling.
    pub fn start(&mut self) {
        self.session.start();
        if let Some(poller) = self.poller.as_mut() {
            poller.start(self.poll_interval);
        }
        self.publish();
    }

    /// Close the stream session and stop polling. Idempotent.
    pub fn stop(&mut self) {
        self.session.stop();
        if let Some(poller) = self.poller.as_mut() {
            poller.stop();
        }
        self.publish();
    }

    /// Start, then process events until [`Command::Shutdown`].
    pub async fn run(mut self) {
        self.start();
        while self.step().await {}
        self.stop();
        info!("app stopped");
    }

    /// Wait for and apply one event. Returns `false` on shutdown.
    pub async fn step(&mut self) -> bool {
        tokio::select! {
            event = self.session.next_event() => {
                if self.session.handle(event, &mut self.store) != SessionChange::Ignored {
                    self.publish();
                }
                true
            }
            event = next_poll(&mut self.poller) => {
                if matches!(event, PollEvent::Updated | PollEvent::Failed(_)) {
                    self.publish();
                }
                true
            }
            command = self.commands.recv() => match command {
                Some(command) => self.apply(command),
                None => false,
            },
        }
    }

    fn apply(&mut self, command: Command) -> bool {
        debug!(?command, "command received");
        match command {
            Command::RefreshNow => {
                if let Some(poller) = self.poller.as_mut() {
                    poller.refresh_now();
                }
            }
            Command::Reconnect => {
                self.session.stop();
                self.session.start();
                self.publish();
            }
            Command::Disconnect => {
                self.session.stop();
                self.publish();
            }
            Command::Shutdown => return false,
        }
        true
    }

    /// Build the current view.
    pub fn view(&self) -> ViewState {
        let latest = self.store.readings().cloned();
        let alerts = self
            .thresholds
            .classify_record(latest.as_ref().unwrap_or(&TelemetryRecord::default()));

        let trends = self
            .trend
            .metrics
            .iter()
            .map(|&metric| TrendSeries {
                metric,
                points: normalize(
                    &self.store.series(metric),
                    self.trend.width,
                    self.trend.height,
                    self.trend.bounds_for(metric),
                ),
            })
            .collect();

        let snapshot = self
            .poller
            .as_ref()
            .map(|poller| poller.state().clone())
            .unwrap_or_default();
        let snapshot_alerts = snapshot
            .snapshot
            .as_ref()
            .map(|view| self.thresholds.classify_record(&view.to_record()))
            .unwrap_or_default();

        ViewState {
            session: self.session.status(),
            session_error: self.session.last_error().map(str::to_string),
            latest,
            alerts,
            stream_dtcs: self.session.diagnostics().cloned(),
            trends,
            recent: self
                .store
                .recent(self.store.feed_capacity())
                .into_iter()
                .cloned()
                .collect(),
            snapshot,
            snapshot_alerts,
            accepted_messages: self.session.accepted(),
            dropped_messages: self.session.dropped(),
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }
}

async fn next_poll(poller: &mut Option<SnapshotPoller>) -> PollEvent {
    match poller.as_mut() {
        Some(poller) => poller.next().await,
        None => std::future::pending().await,
    }
}
