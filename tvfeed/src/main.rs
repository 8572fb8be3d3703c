use std::process::ExitCode;

use clap::Parser;

mod cli;
mod config;
mod http;
mod lineup;
mod output;
mod relay;
mod scrape;
mod util;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Args::parse();

    if let Err(e) = util::logging::init(args.verbose) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Run failed");
            ExitCode::FAILURE
        }
    }
}
