mod browser;
mod images;

use anyhow::{Context, Result};

use crate::config::ScrapeConfig;
use crate::http::build_download_client;

use browser::collect_image_sources;
use images::{DownloadSummary, download_images, plan_downloads};

const DOWNLOAD_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/**
    Render the page, then download every http(s) image it references.

    Only a failure to create the output directory or to drive the browser
    is fatal; individual downloads are logged and counted.
*/
pub async fn run_scrape(config: &ScrapeConfig) -> Result<DownloadSummary> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

    let sources = collect_image_sources(config).await?;
    let jobs = plan_downloads(&sources, config);
    if jobs.len() < sources.len() {
        tracing::debug!(skipped = sources.len() - jobs.len(), "Skipped non-http image sources");
    }

    let client = build_download_client(
        DOWNLOAD_USER_AGENT,
        config.image_timeout(),
        config.proxy.as_deref(),
    )?;
    let summary = download_images(&client, &jobs, &config.output_dir).await;

    tracing::info!(
        found = sources.len(),
        saved = summary.saved.len(),
        failed = summary.failed,
        dir = %config.output_dir.display(),
        "Image scrape finished"
    );

    Ok(summary)
}
