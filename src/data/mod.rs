//! Display-ready state derived from telemetry.
//!
//! ## Submodules
//!
//! - [`alert`]: Threshold table and per-metric [`AlertStatus`] classification
//! - [`duration`]: Parsing and formatting of interval strings (e.g., "2s", "500ms")
//! - [`history`]: Bounded detail and feed windows over accepted records
//! - [`trend`]: Projection of a metric series onto a drawing surface
//!
//! ## Data Flow
//!
//! ```text
//! TelemetryRecord (from the session)
//!        │
//!        ▼
//! HistoryStore::append()
//!        │
//!        ├──▶ series(metric) ──▶ trend::normalize() ──▶ Points
//!        │
//!        └──▶ latest() ──▶ Thresholds::classify_record() ──▶ AlertStatus per metric
//! ```

pub mod alert;
pub mod duration;
pub mod history;
pub mod trend;

pub use alert::{classify, AlertStatus, Bound, Comparison, MetricRule, Thresholds};
pub use history::{HistoryStore, RollingBuffer};
pub use trend::{normalize, Point, TrendBounds};
