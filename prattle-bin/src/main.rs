use std::process::ExitCode;

use clap::Parser;
use prattle_cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    match Cli::parse().run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ prattle: {e}");
            ExitCode::FAILURE
        }
    }
}
