//! # obdwatch
//!
//! Turns a live OBD-II telemetry stream and periodically polled diagnostic
//! snapshots into bounded, display-ready state: rolling histories,
//! threshold-based alerts and normalized trend coordinates.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          App (one task)                      │
//! │                                                              │
//! │  Connector ──▶ ConnectionSession ──▶ HistoryStore ──┐        │
//! │  (tcp/channel)   (lifecycle)         (detail/feed)  │        │
//! │                                                     ▼        │
//! │                                  trend::normalize, Thresholds│
//! │                                                     │        │
//! │  SnapshotFetcher ──▶ SnapshotPoller ──▶ SnapshotState        │
//! │  (http/file)        (timer, 1 in flight)            │        │
//! │                                                     ▼        │
//! │                                     watch::Sender<ViewState> │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: Transport abstraction ([`Connector`], [`SnapshotFetcher`])
//!   with TCP, in-process channel and file implementations
//! - **[`session`]**: Connection lifecycle state machine
//! - **[`poller`]**: Timer-driven snapshot fetches with a single in-flight guard
//! - **[`data`]**: History windows, alert classification and trend projection
//! - **[`app`]**: The event loop and the published [`ViewState`]
//! - **[`config`]**: Layered [`Settings`](config::Settings)
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Read line-delimited JSON messages from a TCP relay and poll the
//! # bridge's snapshot API every 2s. The connection is a plain TCP socket,
//! # so a WebSocket endpoint needs a relay in front of it.
//! obdwatch --connect 192.168.0.10:9000 --snapshot-url http://192.168.0.10:8080
//!
//! # Write one normalized snapshot and exit
//! obdwatch --snapshot-file snapshot.json --export view.json
//! ```
//!
//! ### As a library with a channel connector
//!
//! ```
//! use obdwatch::{App, ChannelConnector, Settings};
//!
//! # tokio_test::block_on(async {
//! let connector = ChannelConnector::new("embedded");
//! let mut app = App::new(connector.clone(), &Settings::default());
//! let view = app.subscribe();
//!
//! app.start();
//! connector.latest().unwrap().message(r#"{"type":"live","data":{"rpm":820}}"#);
//! app.step().await;
//!
//! assert!(view.borrow().latest.is_some());
//! # });
//! ```
//!
//! ### Observing a running app
//!
//! ```no_run
//! use obdwatch::{App, Settings, TcpConnector};
//!
//! # tokio_test::block_on(async {
//! let app = App::new(TcpConnector::new(), &Settings::default());
//! let handle = app.handle();
//! tokio::spawn(app.run());
//!
//! let mut view = handle.subscribe();
//! while view.changed().await.is_ok() {
//!     println!("session is {}", view.borrow().session);
//! }
//! # });
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod poller;
pub mod session;
pub mod source;

// Re-export main types for convenience
pub use app::{App, AppHandle, Command, TrendSeries, ViewState};
pub use config::Settings;
pub use data::{AlertStatus, HistoryStore, Point, Thresholds, TrendBounds};
pub use poller::{PollEvent, SnapshotPoller, SnapshotState};
pub use session::{ConnectionSession, DtcReport, SessionChange, SessionStatus};
pub use source::{
    ChannelConnector, ChannelSender, Connector, FileSnapshotSource, SnapshotFetcher,
    TcpConnector, Transport, TransportEvent,
};
