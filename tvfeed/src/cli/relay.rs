use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::{RelayConfig, load_or_default};
use crate::relay::run_relay;

#[derive(Parser, Debug)]
pub struct RelayCommand {
    /// YAML config file (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Playlist to download
    #[arg(short, long)]
    pub source_url: Option<String>,

    /// File to overwrite with the rewritten playlist
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Group label forced onto every entry
    #[arg(short, long)]
    pub group_title: Option<String>,
}

impl RelayCommand {
    pub async fn run(self) -> Result<()> {
        let mut config: RelayConfig = load_or_default(self.config.as_deref())?;
        if let Some(url) = self.source_url {
            config.source_url = url;
        }
        if let Some(output) = self.output {
            config.output_file = output;
        }
        if let Some(group) = self.group_title {
            config.group_title = group;
        }

        run_relay(&config).await?;
        Ok(())
    }
}
