//! Transport abstraction for the telemetry stream and the snapshot API.
//!
//! The core never talks to a socket directly. A [`Connector`] turns an
//! address into a [`Transport`] - a receiver of lifecycle events fed by a
//! background task - and a [`SnapshotFetcher`] performs one snapshot request.

mod channel;
mod file;
mod stream;

pub use channel::{ChannelConnector, ChannelSender};
pub use file::FileSnapshotSource;
pub use stream::{read_lines, TcpConnector};

use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use obdwatch_adapters::AdapterError;
use obdwatch_types::Snapshot;

/// Lifecycle and payload events delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established.
    Open,
    /// One framed message, not yet parsed.
    Message(String),
    /// The transport failed; no further events follow.
    Error(String),
    /// The peer closed the connection.
    Close,
}

/// One live connection: an event receiver plus the task feeding it.
///
/// Dropping or [closing](Transport::close) a transport stops the reader task
/// and closes the channel, so nothing sent afterwards is observed.
#[derive(Debug)]
pub struct Transport {
    events: mpsc::Receiver<TransportEvent>,
    task: Option<JoinHandle<()>>,
    description: String,
}

impl Transport {
    pub fn new(events: mpsc::Receiver<TransportEvent>, description: impl Into<String>) -> Self {
        Self {
            events,
            task: None,
            description: description.into(),
        }
    }

    /// Attach the background task that owns the sending side.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Wait for the next event. `None` once the sending side is gone.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Release the connection. Safe to call more than once.
    pub fn close(&mut self) {
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens stream connections by address.
///
/// `connect` must return immediately; the connection attempt itself runs in
/// the transport's task and reports back through [`TransportEvent::Open`] or
/// [`TransportEvent::Error`].
pub trait Connector: Send + Debug {
    fn connect(&self, address: &str) -> Transport;

    /// Human-readable description of the connector, for logs.
    fn description(&self) -> &str;
}

/// Performs one snapshot request.
///
/// # Example
///
/// ```
/// use obdwatch::{FileSnapshotSource, SnapshotFetcher};
///
/// let source = FileSnapshotSource::new("snapshot.json");
/// assert_eq!(source.description(), "file: snapshot.json");
/// ```
#[async_trait]
pub trait SnapshotFetcher: Send + Sync + Debug {
    async fn fetch(&self) -> Result<Snapshot, AdapterError>;

    /// Human-readable description of where snapshots come from.
    fn description(&self) -> &str;
}

#[cfg(feature = "http")]
#[async_trait]
impl SnapshotFetcher for obdwatch_adapters::http::HttpSnapshotClient {
    async fn fetch(&self) -> Result<Snapshot, AdapterError> {
        self.fetch_snapshot().await
    }

    fn description(&self) -> &str {
        self.endpoint()
    }
}
