//! Snapshot adapter for the bridge's HTTP API.
//!
//! The bridge serves the latest reading of every metric group over plain
//! JSON, typically on port 8080.
//!
//! ## Endpoints Used
//!
//! - `GET /api/health` - liveness, `{"ok": true}`
//! - `GET /api/snapshot` - every group at once
//! - `GET /api/group/{group}` - one group, 404 for unknown names
//! - `POST /api/diagnostics/refresh` - re-read stored trouble codes
//!
//! ## Example
//!
//! ```rust,no_run
//! use obdwatch_adapters::http::HttpSnapshotClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpSnapshotClient::builder()
//!         .endpoint("http://raspberrypi.local:8080")
//!         .build()?;
//!
//!     let snapshot = client.fetch_snapshot().await?;
//!     if let Some(rpm) = snapshot.live.rpm {
//!         println!("engine at {rpm} rpm");
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use obdwatch_types::{Diagnostics, Group, Snapshot};

use crate::AdapterError;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a bridge's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSnapshotClient {
    client: Client,
    endpoint: String,
}

impl HttpSnapshotClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> HttpSnapshotClientBuilder {
        HttpSnapshotClientBuilder::default()
    }

    /// Base URL requests are made against, without a trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the latest reading of every group.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, AdapterError> {
        let response = self.client.get(self.url("/api/snapshot")).send().await?;
        decode(check_status(response)?).await
    }

    /// Fetch the latest reading of a single group as the bridge sent it.
    pub async fn fetch_group(&self, group: Group) -> Result<Value, AdapterError> {
        let path = format!("/api/group/{}", group.as_str());
        let response = self.client.get(self.url(&path)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AdapterError::UnknownGroup(group.to_string()));
        }

        decode(check_status(response)?).await
    }

    /// Ask the bridge to re-read stored trouble codes and return them.
    pub async fn refresh_diagnostics(&self) -> Result<Diagnostics, AdapterError> {
        let response = self
            .client
            .post(self.url("/api/diagnostics/refresh"))
            .send()
            .await?;
        decode(check_status(response)?).await
    }

    /// Whether the bridge reports itself healthy.
    pub async fn health(&self) -> Result<bool, AdapterError> {
        let response = self.client.get(self.url("/api/health")).send().await?;
        let health: HealthResponse = decode(check_status(response)?).await?;
        Ok(health.ok)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

/// Builder for HttpSnapshotClient.
#[derive(Debug, Default)]
pub struct HttpSnapshotClientBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl HttpSnapshotClientBuilder {
    /// Set the bridge base URL (default: http://127.0.0.1:8080).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the per-request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HttpSnapshotClient, AdapterError> {
        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(HttpSnapshotClient { client, endpoint })
    }
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    ok: bool,
}

fn check_status(response: Response) -> Result<Response, AdapterError> {
    if !response.status().is_success() {
        return Err(AdapterError::Http(format!(
            "API returned status {}",
            response.status()
        )));
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AdapterError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
