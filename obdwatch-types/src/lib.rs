//! # obdwatch-types
//!
//! Wire types shared between an OBD-II bridge and the obdwatch consumers.
//!
//! The bridge publishes two kinds of data:
//!
//! - **Stream messages**: small JSON envelopes (`{"type": ..., "data": ..., "ts": ...}`)
//!   pushed over a socket, each carrying either a full telemetry tick or one
//!   metric group. See [`StreamMessage`].
//! - **Snapshots**: a full point-in-time read of every metric group plus the
//!   stored diagnostic trouble codes, fetched on demand. See [`Snapshot`].
//!
//! Both decode into the same building blocks: [`Metric`] names a numeric
//! field, [`TelemetryRecord`] holds one timestamped set of them, and
//! [`DiagnosticTroubleCode`] covers the two shapes a DTC can arrive in.
//!
//! ## Example
//!
//! ```rust
//! use obdwatch_types::{Metric, StreamMessage};
//!
//! let line = r#"{"type":"engine","data":{"coolant_temp":96.0},"ts":1700000000000}"#;
//! let record = StreamMessage::parse(line)
//!     .and_then(|msg| msg.into_record(0))
//!     .unwrap();
//!
//! assert_eq!(record.ts, 1700000000000);
//! assert_eq!(record.get(Metric::CoolantTemp), Some(96.0));
//! assert_eq!(record.get(Metric::Rpm), None);
//! ```

mod dtc;
mod message;
mod metric;
mod record;
mod snapshot;

pub use dtc::*;
pub use message::*;
pub use metric::*;
pub use record::*;
pub use snapshot::*;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
