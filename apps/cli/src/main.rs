//! topicmaps CLI: browse documentation topic maps from the terminal.
//!
//! Lists the outline sources of a workspace, walks their topic trees, and
//! follows module includes inside AsciiDoc documents.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
