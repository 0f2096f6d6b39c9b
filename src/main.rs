//! telemetry-repo CLI entry point.

use telemetry_repository::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await?;
    Ok(())
}
