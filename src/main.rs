use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use obdwatch::config::Settings;
use obdwatch::data::duration::{format_duration, parse_duration};
use obdwatch::{App, AppHandle, FileSnapshotSource, SessionStatus, SnapshotFetcher, TcpConnector, ViewState};
use obdwatch_types::{now_ms, Metric, SnapshotView};

#[derive(Parser, Debug)]
#[command(name = "obdwatch")]
#[command(about = "Headless monitor for an OBD-II telemetry bridge")]
struct Args {
    /// Stream endpoint of the bridge (host:port) [default: 127.0.0.1:8765]
    #[arg(short, long)]
    connect: Option<String>,

    /// Base URL of the bridge HTTP API, polled for snapshots
    #[cfg(feature = "http")]
    #[arg(long, conflicts_with = "snapshot_file")]
    snapshot_url: Option<String>,

    /// JSON file to poll for snapshots instead of the HTTP API
    #[arg(long)]
    snapshot_file: Option<PathBuf>,

    /// Snapshot poll interval (e.g., "500ms", "2s", "1m") [default: 2s]
    #[arg(short, long, value_parser = parse_duration)]
    interval: Option<Duration>,

    /// How often to log a summary of the current state
    #[arg(long, value_parser = parse_duration, default_value = "10s")]
    report: Duration,

    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fetch one snapshot, write it to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,
}

impl Args {
    /// Flags take precedence over file and environment settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(addr) = &self.connect {
            settings.stream.address = addr.clone();
        }
        #[cfg(feature = "http")]
        if let Some(url) = &self.snapshot_url {
            settings.snapshot.url = Some(url.clone());
            settings.snapshot.file = None;
        }
        if let Some(path) = &self.snapshot_file {
            settings.snapshot.file = Some(path.clone());
            settings.snapshot.url = None;
        }
        if let Some(interval) = self.interval {
            settings.snapshot.interval_ms = interval.as_millis() as u64;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("obdwatch=info")),
        )
        .init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);
    settings.validate()?;

    let fetcher = snapshot_source(&settings)?;

    // Handle export mode (non-interactive)
    if let Some(export_path) = &args.export {
        let Some(fetcher) = fetcher else {
            bail!("--export needs a snapshot source (--snapshot-url or --snapshot-file)");
        };
        return export_to_file(fetcher.as_ref(), &settings, export_path).await;
    }

    run(settings, fetcher, args.report).await
}

/// Build the configured snapshot source, if any.
fn snapshot_source(settings: &Settings) -> Result<Option<Arc<dyn SnapshotFetcher>>> {
    if let Some(path) = &settings.snapshot.file {
        return Ok(Some(Arc::new(FileSnapshotSource::new(path))));
    }
    settings.snapshot.url.as_deref().map(http_source).transpose()
}

#[cfg(feature = "http")]
fn http_source(url: &str) -> Result<Arc<dyn SnapshotFetcher>> {
    let client = obdwatch_adapters::http::HttpSnapshotClient::builder()
        .endpoint(url)
        .build()
        .context("Failed to create HTTP client")?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "http"))]
fn http_source(url: &str) -> Result<Arc<dyn SnapshotFetcher>> {
    bail!("snapshot url {} configured but obdwatch was built without the `http` feature", url)
}

/// Stream and poll until interrupted, logging a summary every `report`.
async fn run(
    settings: Settings,
    fetcher: Option<Arc<dyn SnapshotFetcher>>,
    report: Duration,
) -> Result<()> {
    let mut app = App::new(TcpConnector::new(), &settings);
    if let Some(fetcher) = fetcher {
        info!(source = fetcher.description(), "polling snapshots");
        app = app.with_snapshot_source(fetcher);
    }

    let handle = app.handle();
    let task = tokio::spawn(app.run());

    let report = report.max(Duration::from_secs(1));
    info!(
        address = %settings.stream.address,
        report = %format_duration(report),
        "obdwatch running, press Ctrl-C to stop"
    );

    let mut report_timer = tokio::time::interval_at(tokio::time::Instant::now() + report, report);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = report_timer.tick() => report_and_recover(&handle).await,
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("interrupt received, shutting down");
                break;
            }
        }
    }

    handle.shutdown().await;
    task.await.context("App task failed")?;
    Ok(())
}

/// Log the current view; reopen the stream if the last session ended.
async fn report_and_recover(handle: &AppHandle) {
    let view = handle.view();
    log_summary(&view);

    if view.session == SessionStatus::Closed {
        info!("stream session closed, reconnecting");
        handle.reconnect().await;
    }
}

fn log_summary(view: &ViewState) {
    let latest = view.latest.as_ref();
    let reading = |metric: Metric| latest.and_then(|record| record.get(metric));

    info!(
        session = %view.session,
        accepted = view.accepted_messages,
        dropped = view.dropped_messages,
        rpm = ?reading(Metric::Rpm),
        speed_kph = ?reading(Metric::SpeedKph),
        coolant_temp = ?reading(Metric::CoolantTemp),
        alert = view.worst_alert().symbol(),
        dtcs = ?view.stream_dtcs.as_ref().map(|report| report.dtcs.len()),
        "stream"
    );

    if let Some(snapshot) = &view.snapshot.snapshot {
        info!(
            dtcs = snapshot.dtcs.len(),
            fuel_level = ?snapshot.status.fuel_level,
            voltage = ?snapshot.status.control_module_voltage,
            "snapshot"
        );
    }
    if let Some(error) = &view.snapshot.last_error {
        warn!(%error, at = ?view.snapshot.last_error_at, "last snapshot fetch failed");
    }
    if let Some(error) = &view.session_error {
        warn!(%error, "last stream failure");
    }
}

/// Fetch one snapshot and write the normalized view as JSON.
async fn export_to_file(
    fetcher: &dyn SnapshotFetcher,
    settings: &Settings,
    export_path: &Path,
) -> Result<()> {
    let snapshot = fetcher
        .fetch()
        .await
        .with_context(|| format!("Failed to fetch snapshot from {}", fetcher.description()))?;
    let view = SnapshotView::from(snapshot);
    let alerts = settings.thresholds.classify_record(&view.to_record());

    let export = serde_json::json!({
        "fetched_at": now_ms(),
        "source": fetcher.description(),
        "snapshot": view,
        "alerts": alerts,
    });

    let json = serde_json::to_string_pretty(&export)?;
    tokio::fs::write(export_path, json)
        .await
        .with_context(|| format!("Failed to write {}", export_path.display()))?;

    println!("Exported snapshot to: {}", export_path.display());
    Ok(())
}
