//! Connection session: lifecycle of one telemetry stream connection.
//!
//! ```text
//!   Idle ──start()──▶ Connecting ──open──▶ Streaming
//!     ▲                   │                    │
//!     │             error/close/stop()   error/close/stop()
//!     │                   ▼                    ▼
//!     └──────────────  Closed ◀────────────────┘
//!                        │
//!                     start() ──▶ Connecting
//! ```
//!
//! A session owns at most one [`Transport`]. Accepted metric messages are
//! decoded into [`TelemetryRecord`](obdwatch_types::TelemetryRecord)s and
//! appended to the caller's [`HistoryStore`]; `diagnostics` pushes replace the
//! session's [`DtcReport`]. Anything that fails to decode is counted and
//! dropped without interrupting the stream.

use core::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use obdwatch_types::{now_ms, DtcEntry, StreamMessage, StreamPayload};

use crate::data::HistoryStore;
use crate::source::{Connector, Transport, TransportEvent};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Streaming,
    Closed,
}

impl SessionStatus {
    /// True while a transport is held.
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Streaming)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What handling one transport event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    /// The session moved to a new status.
    Status(SessionStatus),
    /// A record was appended to the store.
    Appended,
    /// A diagnostics push replaced the stream's trouble codes.
    Diagnostics,
    /// The message could not be decoded and was discarded.
    Dropped,
    /// The event arrived with no live transport, or changed nothing.
    Ignored,
}

/// Trouble codes last pushed over the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DtcReport {
    /// Message timestamp, milliseconds since the Unix epoch.
    pub ts: u64,
    pub dtcs: Vec<DtcEntry>,
}

/// One logical stream connection.
#[derive(Debug)]
pub struct ConnectionSession<C: Connector> {
    connector: C,
    address: String,
    status: SessionStatus,
    transport: Option<Transport>,
    accepted: u64,
    dropped: u64,
    last_error: Option<String>,
    diagnostics: Option<DtcReport>,
}

impl<C: Connector> ConnectionSession<C> {
    pub fn new(connector: C, address: impl Into<String>) -> Self {
        Self {
            connector,
            address: address.into(),
            status: SessionStatus::Idle,
            transport: None,
            accepted: 0,
            dropped: 0,
            last_error: None,
            diagnostics: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Messages decoded and appended since the session was created.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Messages discarded as malformed or of an unknown type.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Text of the last transport failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Trouble codes from the latest `diagnostics` message. Kept across
    /// reconnects.
    pub fn diagnostics(&self) -> Option<&DtcReport> {
        self.diagnostics.as_ref()
    }

    /// Open a transport. Does nothing while already connecting or streaming.
    ///
    /// Returns whether a new transport was opened.
    pub fn start(&mut self) -> bool {
        if self.status.is_active() {
            debug!(address = %self.address, status = %self.status, "session already active, start ignored");
            return false;
        }

        let transport = self.connector.connect(&self.address);
        info!(
            address = %self.address,
            transport = transport.description(),
            "stream session connecting"
        );
        self.transport = Some(transport);
        self.status = SessionStatus::Connecting;
        true
    }

    /// Release the transport and move to `Closed`. Idempotent; a no-op while
    /// idle or already closed.
    ///
    /// Returns whether the session was active.
    pub fn stop(&mut self) -> bool {
        if !self.status.is_active() {
            return false;
        }
        self.release();
        info!(address = %self.address, "stream session stopped");
        true
    }

    /// Wait for the next transport event.
    ///
    /// Pends forever while no transport is held, so it can sit in a
    /// `select!` next to other sources. A transport whose sender went away
    /// reports [`TransportEvent::Close`].
    pub async fn next_event(&mut self) -> TransportEvent {
        match self.transport.as_mut() {
            Some(transport) => transport.recv().await.unwrap_or(TransportEvent::Close),
            None => std::future::pending().await,
        }
    }

    /// Apply one event. Records decoded from messages go into `store`.
    pub fn handle(&mut self, event: TransportEvent, store: &mut HistoryStore) -> SessionChange {
        if self.transport.is_none() {
            return SessionChange::Ignored;
        }

        match event {
            TransportEvent::Open if self.status == SessionStatus::Connecting => {
                self.status = SessionStatus::Streaming;
                info!(address = %self.address, "stream session open");
                SessionChange::Status(self.status)
            }
            TransportEvent::Open => SessionChange::Ignored,
            TransportEvent::Message(text) => self.ingest(&text, store),
            TransportEvent::Error(reason) => {
                warn!(address = %self.address, error = %reason, "stream transport failed");
                self.last_error = Some(reason);
                self.release();
                SessionChange::Status(self.status)
            }
            TransportEvent::Close => {
                info!(address = %self.address, "stream closed by peer");
                self.release();
                SessionChange::Status(self.status)
            }
        }
    }

    fn ingest(&mut self, text: &str, store: &mut HistoryStore) -> SessionChange {
        match StreamMessage::parse(text).and_then(|message| message.decode(now_ms())) {
            Ok(StreamPayload::Record(record)) => {
                store.append(record);
                self.accepted += 1;
                SessionChange::Appended
            }
            Ok(StreamPayload::Diagnostics { ts, dtcs }) => {
                debug!(dtcs = dtcs.len(), "stream diagnostics received");
                self.diagnostics = Some(DtcReport { ts, dtcs });
                self.accepted += 1;
                SessionChange::Diagnostics
            }
            Err(e) => {
                self.dropped += 1;
                debug!(error = %e, "dropping stream message");
                SessionChange::Dropped
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.status = SessionStatus::Closed;
    }
}

impl<C: Connector> Drop for ConnectionSession<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
