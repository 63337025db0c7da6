//! Video acquisition miner binary.
//!
//! Runs one acquire round for a query and prints the records as JSON.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vscrape_media::{
    check_ffmpeg, check_ffprobe, check_ytdlp, EgressPool, StreamCopyClipper, TempStore,
    YtDlpDownloader, YtDlpSearch,
};
use vscrape_miner::{metrics, Coordinator, MinerConfig, MinerError, SearchStage};
use vscrape_ml_client::{AugmentClient, EmbeddingClient};
use vscrape_models::KnownIdSet;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vscrape-miner");

    let config = MinerConfig::from_env();
    info!("Miner config: {:?}", config);

    let query = std::env::args()
        .nth(1)
        .or_else(|| config.query.clone())
        .ok_or_else(|| anyhow!("No query given: pass it as the first argument or set MINER_QUERY"))?;

    if config.metrics_enabled {
        metrics::init_metrics(config.metrics_port).context("Failed to start metrics exporter")?;
        info!(port = config.metrics_port, "Prometheus metrics enabled");
    }

    check_ytdlp().context("yt-dlp is required")?;
    check_ffmpeg().context("ffmpeg is required")?;
    check_ffprobe().context("ffprobe is required")?;

    let known_ids = match &config.known_ids_path {
        Some(path) => KnownIdSet::load(path)?,
        None => KnownIdSet::empty(),
    };
    info!(count = known_ids.len(), "Loaded known ids");

    let egress = Arc::new(build_egress(&config)?);
    let store = match &config.work_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            TempStore::in_dir(dir)
        }
        None => TempStore::new(),
    };

    let embedder = EmbeddingClient::from_env()?;
    if !embedder.health_check().await? {
        warn!("Embedding service is not healthy; embeddings may fail");
    }
    let augment = AugmentClient::from_env()?;
    info!(mode = ?augment.mode(), "Query augmentation configured");

    let search = SearchStage::new(
        Arc::new(
            YtDlpSearch::new()
                .with_results_per_query(config.search_results)
                .with_timeout(config.search_timeout),
        ),
        known_ids,
    )
    .with_rewriter(Arc::new(augment))
    .with_egress(Arc::clone(&egress))
    .with_fan_out(config.search_fan_out);

    let downloader = YtDlpDownloader::new(store.clone())
        .with_ceiling(config.download_ceiling_secs)
        .with_max_filesize(config.download_max_bytes)
        .with_timeout(config.download_timeout);
    let clipper = StreamCopyClipper::new(store.clone()).with_timeout(config.clip_timeout);

    let coordinator = Coordinator::new(
        config.clone(),
        search,
        Arc::new(downloader),
        Arc::new(clipper),
        Arc::new(embedder),
    )
    .with_egress(Arc::clone(&egress));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = cancel_tx.send(true);
        }
    });

    let report = match coordinator
        .acquire(&query, config.target_count, config.deadline, cancel_rx)
        .await
    {
        Ok(report) => report,
        Err(e @ (MinerError::NoCandidates(_) | MinerError::Cancelled)) => {
            error!(error = %e, "SCRAPING FAILED");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let stats = egress.stats();
    info!(
        records = report.records.len(),
        target = report.target_count,
        elapsed_secs = report.elapsed.as_secs_f64(),
        deadline_secs = report.deadline.as_secs(),
        egress_blocked = stats.blocked_count,
        open_handles = store.open_handles(),
        failures = ?report.failures_by_kind(),
        "Round finished"
    );

    if report.met_sla() {
        info!("SCRAPING SUCCEEDED");
    } else {
        warn!(
            "SCRAPING FAILED: {}/{} records in {:.1}s (deadline {}s)",
            report.records.len(),
            report.target_count,
            report.elapsed.as_secs_f64(),
            report.deadline.as_secs()
        );
    }

    println!("{}", serde_json::to_string_pretty(&report.records)?);
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vscrape=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

fn build_egress(config: &MinerConfig) -> anyhow::Result<EgressPool> {
    let mut entries = match &config.egress_proxies {
        Some(list) => EgressPool::parse_proxies(list).context("Invalid EGRESS_PROXIES")?,
        None => Vec::new(),
    };
    if config.ipv6_rotation {
        entries.extend(EgressPool::discover_ipv6());
    }

    let pool = EgressPool::new(entries).with_cooldown(config.egress_cooldown);
    info!(egress_count = pool.len(), "Egress pool ready");
    Ok(pool)
}
