//! vinaya-notes CLI: Vinaya commentary notes to cross-referenced Markdown.
//!
//! Fetches one author's notes for an edition, places each at the section its
//! segment identifier maps to, and writes one Markdown file per top-level
//! section plus a glossary.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
