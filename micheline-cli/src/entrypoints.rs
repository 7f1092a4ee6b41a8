use clap::Args;
use micheline_typedef::{EntrypointOptions, discover_entrypoints};
use serde_json::json;

use crate::{print_json, read_prim};

/// List the entrypoints of a parameter type and the interfaces they satisfy.
#[derive(Args, Debug)]
pub struct Entrypoints {
    /// Micheline JSON file holding a parameter type, or `-` for stdin.
    input: String,

    /// Keep `or` nodes annotated with this prefix as single entrypoints.
    #[clap(long = "keep-or", value_name = "PREFIX")]
    keep_or: Vec<String>,

    /// Print JSON instead of one line per entrypoint.
    #[clap(long)]
    json: bool,
}

impl Entrypoints {
    pub(crate) fn options(&self) -> EntrypointOptions {
        self.keep_or
            .iter()
            .fold(EntrypointOptions::default(), |options, prefix| {
                options.with_non_splitting_prefix(prefix.as_str())
            })
    }

    pub fn exec(self) -> miette::Result<()> {
        let param = read_prim(&self.input)?;
        let entrypoints = discover_entrypoints(&param, &self.options())?;
        let interfaces = entrypoints.interfaces();

        if self.json {
            return print_json(&json!({
                "entrypoints": entrypoints.sorted(),
                "interfaces": interfaces,
            }));
        }

        for entry in entrypoints.sorted() {
            let branch = if entry.branch.is_empty() { "/" } else { entry.branch.as_str() };
            println!("{:>3} {branch:<12} {}: {}", entry.id, entry.name, entry.signature());
        }
        if !interfaces.is_empty() {
            let names: Vec<_> = interfaces.iter().map(|interface| interface.name()).collect();
            println!("interfaces: {}", names.join(", "));
        }
        Ok(())
    }
}
