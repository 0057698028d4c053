//! chartfleet CLI
//!
//! Installs releases through the Helm, add-on and legacy app managers and
//! drives federation control-plane rollout.

use clap::Parser;

use chartfleet_cli::{Cli, Result};
use chartfleet_common::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_logging(cli.log_format)?;
    cli.run().await
}
