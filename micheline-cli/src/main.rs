//! The `micheline` command-line front-end to the type engine.

use clap::Parser;
use micheline_cli::Cli;

fn main() -> miette::Result<()> {
    micheline_cli::init_logging();
    Cli::parse().exec()
}
