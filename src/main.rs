use clap::Parser;

use blank_slate_ubi::cli::{Cli, run};
use blank_slate_ubi::telemetry::init_tracing;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
