//! This file defines the nh5 binary entry point.

use remote_nh5::cli;
use remote_nh5::tracing;

use std::process::ExitCode;

/// Application entry point
#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    tracing::init_tracing();
    match cli::run(&args).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {}", cli::error_report(&error));
            ExitCode::FAILURE
        }
    }
}
