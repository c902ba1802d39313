//! fieldcheck: read-only API over the field-check spreadsheet.
//!
//! Looks up a tester's wave-1 assignments and the instruction texts for a
//! partner + check method, with the spreadsheet cached in memory.

mod commands;
mod routes;

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
