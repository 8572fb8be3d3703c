use anyhow::Result;
use clap::{Parser, Subcommand};

mod lineup;
mod relay;
mod scrape_images;

pub use lineup::LineupCommand;
pub use relay::RelayCommand;
pub use scrape_images::ScrapeImagesCommand;

#[derive(Parser, Debug)]
#[command(name = "tvfeed")]
#[command(about = "IPTV playlist and guide builder")]
pub struct Args {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the channel playlist and compressed guide (default)
    Lineup(LineupCommand),
    /// Download every image referenced by a rendered web page
    ScrapeImages(ScrapeImagesCommand),
    /// Download a remote playlist and rewrite it under one group label
    Relay(RelayCommand),
}

impl Args {
    pub async fn run(self) -> Result<()> {
        let command = self
            .command
            .unwrap_or(Command::Lineup(LineupCommand::default()));

        match command {
            Command::Lineup(cmd) => cmd.run().await,
            Command::ScrapeImages(cmd) => cmd.run().await,
            Command::Relay(cmd) => cmd.run().await,
        }
    }
}
