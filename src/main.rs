mod cli;
mod error;
mod hook;
mod logging;

use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    if let Err(err) = logging::init(cli.verbose, cli.log_format) {
        eprintln!("error: {err:?}");
        return ExitCode::FAILURE;
    }
    match cli::run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = ?err, "{err}");
            ExitCode::FAILURE
        },
    }
}
