use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use url::Url;

use crate::config::{LineupConfig, load_or_default};
use crate::http::build_client;
use crate::lineup::{GuideWindow, build_guide, fetch_channels};
use crate::output::generate_m3u;

#[derive(Parser, Debug, Default)]
pub struct LineupCommand {
    /// YAML config file (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory receiving the playlist and guide
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Guide window length in hours
    #[arg(long)]
    pub hours: Option<i64>,
}

impl LineupCommand {
    fn resolve_config(&self) -> Result<LineupConfig> {
        let mut config: LineupConfig = load_or_default(self.config.as_deref())?;
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(hours) = self.hours {
            config.epg_hours = hours;
        }
        Ok(config)
    }

    pub async fn run(self) -> Result<()> {
        let started = Instant::now();
        let config = self.resolve_config()?;
        let window = GuideWindow::from_now(config.epg_hours)?;

        std::fs::create_dir_all(&config.output_dir)
            .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base URL {}", config.base_url))?;
        let client = build_client(&config.http)?;

        let channels = fetch_channels(&client, &config, &base_url).await;
        if channels.is_empty() {
            bail!("No channels found, nothing to write");
        }
        tracing::info!(count = channels.len(), "Channels ready");

        let playlist = generate_m3u(&channels, &config.epg_filename);
        let playlist_path = config.playlist_path();
        match playlist.save(&playlist_path) {
            Ok(()) => tracing::info!(
                path = %playlist_path.display(),
                entries = playlist.entries,
                "Playlist saved"
            ),
            Err(e) => tracing::error!(path = %playlist_path.display(), error = ?e, "Failed to save playlist"),
        }

        let guide = build_guide(&client, &config, &base_url, &channels, &window).await;
        let epg_path = config.epg_path();
        match guide.write_gzipped(&epg_path) {
            Ok(()) => tracing::info!(path = %epg_path.display(), "Guide saved"),
            Err(e) => tracing::error!(path = %epg_path.display(), error = ?e, "Failed to save guide"),
        }

        tracing::info!(
            channels = channels.len(),
            elapsed = ?started.elapsed(),
            "Lineup finished"
        );
        Ok(())
    }
}
