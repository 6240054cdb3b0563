//! In-process channel transport.
//!
//! Every `connect` opens a fresh channel whose sending half is kept by the
//! connector. Useful for embedding (a message bus subscriber pushing
//! payloads in) and for driving a session deterministically in tests.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Connector, Transport, TransportEvent};

const EVENT_BUFFER: usize = 64;
/// Registry size at which senders of released transports are pruned.
const PRUNE_THRESHOLD: usize = 16;

/// A connector backed by in-memory channels.
///
/// Clones share the same connection registry. Once it holds
/// `PRUNE_THRESHOLD` senders, a new `connect` first drops the ones whose
/// transport is gone, so indices passed to [`sender`](Self::sender) shift.
///
/// # Example
///
/// ```
/// use obdwatch::source::{ChannelConnector, Connector};
///
/// let connector = ChannelConnector::new("embedded");
/// let _transport = connector.connect("bus://telemetry");
///
/// let sender = connector.latest().unwrap();
/// assert_eq!(sender.address(), "bus://telemetry");
/// assert!(sender.open());
/// ```
#[derive(Debug, Clone)]
pub struct ChannelConnector {
    description: String,
    connections: Arc<Mutex<Vec<ChannelSender>>>,
}

impl ChannelConnector {
    pub fn new(source_description: &str) -> Self {
        Self {
            description: format!("channel: {}", source_description),
            connections: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of senders in the registry.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Sending half of the `index`-th connection, oldest first.
    pub fn sender(&self, index: usize) -> Option<ChannelSender> {
        self.connections.lock().get(index).cloned()
    }

    /// Sending half of the most recent connection.
    pub fn latest(&self) -> Option<ChannelSender> {
        self.connections.lock().last().cloned()
    }
}

impl Connector for ChannelConnector {
    fn connect(&self, address: &str) -> Transport {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let mut connections = self.connections.lock();
        if connections.len() >= PRUNE_THRESHOLD {
            connections.retain(|sender| !sender.is_closed());
        }
        connections.push(ChannelSender {
            address: address.to_string(),
            tx,
        });
        Transport::new(rx, format!("{} ({})", self.description, address))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Producer side of one channel connection.
///
/// Every method returns `false` once the consuming transport has been
/// released.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    address: String,
    tx: mpsc::Sender<TransportEvent>,
}

impl ChannelSender {
    /// Address the connection was opened with.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.try_send(event).is_ok()
    }

    pub fn open(&self) -> bool {
        self.send(TransportEvent::Open)
    }

    /// Push one raw message payload.
    pub fn message(&self, payload: impl Into<String>) -> bool {
        self.send(TransportEvent::Message(payload.into()))
    }

    pub fn error(&self, reason: impl Into<String>) -> bool {
        self.send(TransportEvent::Error(reason.into()))
    }

    pub fn close(&self) -> bool {
        self.send(TransportEvent::Close)
    }

    /// True once the transport was closed or dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_connector_delivers_in_order() {
        let connector = ChannelConnector::new("test");
        let mut transport = connector.connect("addr");
        let sender = connector.latest().unwrap();

        assert!(sender.open());
        assert!(sender.message("one"));
        assert!(sender.message("two"));

        assert_eq!(transport.recv().await, Some(TransportEvent::Open));
        assert_eq!(transport.recv().await, Some(TransportEvent::Message("one".into())));
        assert_eq!(transport.recv().await, Some(TransportEvent::Message("two".into())));
    }

    #[test]
    fn test_each_connect_opens_a_new_channel() {
        let connector = ChannelConnector::new("test");
        let first = connector.connect("a");
        let _second = connector.connect("b");

        assert_eq!(connector.connection_count(), 2);
        assert_eq!(connector.sender(0).unwrap().address(), "a");
        assert_eq!(connector.latest().unwrap().address(), "b");

        drop(first);
        assert!(connector.sender(0).unwrap().is_closed());
        assert!(!connector.sender(1).unwrap().is_closed());
    }

    #[test]
    fn test_send_after_close_fails() {
        let connector = ChannelConnector::new("test");
        let mut transport = connector.connect("a");
        let sender = connector.latest().unwrap();

        transport.close();
        assert!(sender.is_closed());
        assert!(!sender.message("late"));
    }

    #[test]
    fn test_released_senders_are_pruned() {
        let connector = ChannelConnector::new("test");
        let kept = connector.connect("kept");
        for i in 0..100 {
            let mut transport = connector.connect(&format!("reconnect-{}", i));
            transport.close();
            assert!(connector.connection_count() <= PRUNE_THRESHOLD + 1);
        }

        let _fresh = connector.connect("fresh");
        assert!(connector.connection_count() <= PRUNE_THRESHOLD + 1);
        assert_eq!(connector.sender(0).unwrap().address(), "kept");
        assert!(!connector.sender(0).unwrap().is_closed());
        assert_eq!(connector.latest().unwrap().address(), "fresh");
        drop(kept);
    }

    #[test]
    fn test_clones_share_registry() {
        let connector = ChannelConnector::new("test");
        let clone = connector.clone();
        let _transport = clone.connect("a");

        assert_eq!(connector.connection_count(), 1);
        assert_eq!(connector.description(), "channel: test");
    }
}
