use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::{ScrapeConfig, load_or_default};
use crate::scrape::run_scrape;

#[derive(Parser, Debug)]
pub struct ScrapeImagesCommand {
    /// YAML config file (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Page to render
    #[arg(short, long)]
    pub url: Option<String>,

    /// Directory receiving the images
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

impl ScrapeImagesCommand {
    pub async fn run(self) -> Result<()> {
        let mut config: ScrapeConfig = load_or_default(self.config.as_deref())?;
        if let Some(url) = self.url {
            config.page_url = url;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if self.headed {
            config.headless = false;
        }

        run_scrape(&config).await?;
        Ok(())
    }
}
