//! Line-delimited stream transport.
//!
//! Reads newline-delimited JSON messages from an async byte stream. Used for
//! TCP connections to the bridge, and for any other `AsyncRead`.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Connector, Transport, TransportEvent};

const EVENT_BUFFER: usize = 64;

/// Spawn a reader over an already-open stream.
///
/// Emits `Open` immediately, one `Message` per non-blank line, and `Close` at
/// EOF (or `Error` if reading fails).
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use obdwatch::source::{read_lines, TransportEvent};
///
/// # tokio_test::block_on(async {
/// let data = b"{\"type\":\"live\",\"data\":{\"rpm\":800}}\n";
/// let mut transport = read_lines(Cursor::new(data.to_vec()), "example");
/// assert_eq!(transport.recv().await, Some(TransportEvent::Open));
/// # });
/// ```
pub fn read_lines<R>(reader: R, description: &str) -> Transport
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    let task = tokio::spawn(async move {
        if tx.send(TransportEvent::Open).await.is_err() {
            return;
        }
        forward_lines(reader, &tx).await;
    });

    Transport::new(rx, format!("stream: {}", description)).with_task(task)
}

async fn forward_lines<R>(reader: R, tx: &mpsc::Sender<TransportEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let event = match reader.read_line(&mut line).await {
            // EOF
            Ok(0) => {
                let _ = tx.send(TransportEvent::Close).await;
                return;
            }
            Ok(_) if line.trim().is_empty() => continue,
            Ok(_) => TransportEvent::Message(line.trim().to_string()),
            Err(e) => {
                let _ = tx.send(TransportEvent::Error(format!("Read error: {}", e))).await;
                return;
            }
        };

        if tx.send(event).await.is_err() {
            // Receiver dropped
            return;
        }
    }
}

/// Connects to a bridge over TCP, one JSON message per line.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for TcpConnector {
    fn connect(&self, address: &str) -> Transport {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let addr = address.to_string();

        let task = tokio::spawn(async move {
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    debug!(%addr, "tcp connection established");
                    if tx.send(TransportEvent::Open).await.is_err() {
                        return;
                    }
                    forward_lines(stream, &tx).await;
                }
                Err(e) => {
                    let _ = tx
                        .send(TransportEvent::Error(format!("Connection failed: {}", e)))
                        .await;
                }
            }
        });

        Transport::new(rx, format!("tcp: {}", address)).with_task(task)
    }

    fn description(&self) -> &str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn sample_line() -> &'static str {
        r#"{"type":"live","data":{"rpm":850,"speed_kph":0}}"#
    }

    async fn drain(transport: &mut Transport) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Some(event) = transport.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_read_lines_frames_messages() {
        let data = format!("{}\n{}\n", sample_line(), sample_line());
        let mut transport = read_lines(Cursor::new(data), "test");

        let events = drain(&mut transport).await;
        assert_eq!(
            events,
            vec![
                TransportEvent::Open,
                TransportEvent::Message(sample_line().to_string()),
                TransportEvent::Message(sample_line().to_string()),
                TransportEvent::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_read_lines_skips_blank_lines() {
        let data = format!("\n   \n{}\r\n", sample_line());
        let mut transport = read_lines(Cursor::new(data), "test");

        let events = drain(&mut transport).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], TransportEvent::Message(sample_line().to_string()));
    }

    #[tokio::test]
    async fn test_read_lines_passes_garbage_through() {
        // Framing only; parsing is the session's job.
        let mut transport = read_lines(Cursor::new("not valid json\n"), "test");

        let events = drain(&mut transport).await;
        assert_eq!(events[1], TransportEvent::Message("not valid json".to_string()));
    }

    #[tokio::test]
    async fn test_read_lines_description() {
        let transport = read_lines(Cursor::new(""), "tcp://localhost:8765");
        assert_eq!(transport.description(), "stream: tcp://localhost:8765");
    }

    #[tokio::test]
    async fn test_tcp_connector_streams_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(format!("{}\n", sample_line()).as_bytes())
                .await
                .unwrap();
        });

        let mut transport = TcpConnector::new().connect(&addr);
        server.await.unwrap();

        let events = drain(&mut transport).await;
        assert_eq!(events.first(), Some(&TransportEvent::Open));
        assert!(events.contains(&TransportEvent::Message(sample_line().to_string())));
        assert_eq!(events.last(), Some(&TransportEvent::Close));
    }

    #[tokio::test]
    async fn test_tcp_connector_reports_refused_connection() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut transport = TcpConnector::new().connect(&addr);
        let events = drain(&mut transport).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], TransportEvent::Error(ref msg) if msg.starts_with("Connection failed")));
    }
}
