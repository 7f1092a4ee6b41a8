//! Micheline CLI parser and executor as a library.
use std::{
    fs,
    io::{self, Read},
};

use clap::Parser;
use micheline_types::Prim;
use miette::{IntoDiagnostic, WrapErr};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod bigmap;
mod check;
mod entrypoints;
mod infer;
mod marshal;
mod typedef;

pub use bigmap::Bigmap;
pub use check::Check;
pub use entrypoints::Entrypoints;
pub use infer::Infer;
pub use marshal::Marshal;
pub use typedef::Typedef;

/// Structural type tooling for Micheline values and types.
#[derive(Debug, clap::Subcommand)]
pub enum Command {
    Typedef(Typedef),
    Entrypoints(Entrypoints),
    Infer(Infer),
    Check(Check),
    Marshal(Marshal),
    /// Decode, encode or locate big-map diffs.
    #[command(subcommand)]
    Bigmap(Bigmap),
}

#[derive(Parser, Debug)]
#[clap(name = "micheline", version)]
#[clap(propagate_version = true)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

impl Cli {
    pub fn exec(self) -> miette::Result<()> {
        debug!(command = ?self.cmd, "running");
        match self.cmd {
            Command::Typedef(t) => t.exec(),
            Command::Entrypoints(e) => e.exec(),
            Command::Infer(i) => i.exec(),
            Command::Check(c) => c.exec(),
            Command::Marshal(m) => m.exec(),
            Command::Bigmap(b) => b.exec(),
        }
    }
}

/// Install the stderr subscriber, filtered by `RUST_LOG` (default `warn`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Contents of `path`, or of stdin when `path` is `-`.
pub(crate) fn read_input(path: &str) -> miette::Result<String> {
    if path == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .into_diagnostic()
            .wrap_err("failed to read stdin")?;
        Ok(text)
    } else {
        fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read `{path}`"))
    }
}

/// Micheline JSON document at `path`.
pub(crate) fn read_prim(path: &str) -> miette::Result<Prim> {
    let text = read_input(path)?;
    Prim::from_json(&text).wrap_err_with(|| format!("`{path}` is not Micheline JSON"))
}

/// Plain JSON document at `path`.
pub(crate) fn read_json(path: &str) -> miette::Result<serde_json::Value> {
    let text = read_input(path)?;
    serde_json::from_str(&text)
        .into_diagnostic()
        .wrap_err_with(|| format!("`{path}` is not JSON"))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> miette::Result<()> {
    let text = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{text}");
    Ok(())
}
