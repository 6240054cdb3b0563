//! # obdwatch-adapters
//!
//! Adapters for pulling diagnostic snapshots out of an OBD-II bridge.
//!
//! ## Supported sources
//!
//! - **HTTP** (`http` feature) - the bridge's JSON API (`/api/snapshot`,
//!   `/api/group/{group}`, `/api/diagnostics/refresh`, `/api/health`)
//!
//! Every adapter reports failures as [`AdapterError`], whose `Display` output
//! is meant to be shown to a user as-is.
//!
//! ## Quick Start (HTTP)
//!
//! ```rust,no_run
//! # #[cfg(feature = "http")]
//! # async fn run() -> Result<(), obdwatch_adapters::AdapterError> {
//! use obdwatch_adapters::http::HttpSnapshotClient;
//! use std::time::Duration;
//!
//! let client = HttpSnapshotClient::builder()
//!     .endpoint("http://127.0.0.1:8080")
//!     .timeout(Duration::from_secs(3))
//!     .build()?;
//!
//! let snapshot = client.fetch_snapshot().await?;
//! println!("{} stored trouble codes", snapshot.diagnostics.dtcs.len());
//! # Ok(())
//! # }
//! ```

pub mod error;

#[cfg(feature = "http")]
pub mod http;

pub use error::AdapterError;

// Re-export types for convenience
pub use obdwatch_types::{Diagnostics, Group, Snapshot};
