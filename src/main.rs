//! # Steerage command line
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   │
//!   └─> Dispatch the subcommand
//!       ├─> run       ingest → pipeline → train → evaluate → track
//!       ├─> features  pipeline over one CSV → feature CSV
//!       └─> check     build both pipeline variants, print wiring
//! ```
//!
//! ```bash
//! steerage run --env .env --model logreg
//! steerage features --env .env --input data/raw/holdout.csv --output features.csv
//! steerage check --params parameters.yaml
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // CLI output goes to stdout

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::run_command(cli.command)
}
