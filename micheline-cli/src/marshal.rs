use clap::Args;
use micheline_typedef::{EntrypointOptions, discover_entrypoints};

use crate::{print_json, read_json, read_prim};

/// Build a Micheline value from plain JSON, guided by a type.
#[derive(Args, Debug)]
pub struct Marshal {
    /// Micheline JSON file holding the type.
    #[clap(long = "type", value_name = "FILE")]
    ty: String,

    /// JSON file holding the value, or `-` for stdin.
    value: String,

    /// Read the type as a parameter type and build the arguments of this
    /// entrypoint.
    #[clap(short, long)]
    entrypoint: Option<String>,

    /// Write scalars in their compact binary form.
    #[clap(short, long)]
    optimized: bool,

    /// Print Michelson notation instead of Micheline JSON.
    #[clap(short, long)]
    text: bool,
}

impl Marshal {
    pub fn exec(self) -> miette::Result<()> {
        let ty = read_prim(&self.ty)?;
        let typedef = match &self.entrypoint {
            Some(name) => {
                let entrypoints = discover_entrypoints(&ty, &EntrypointOptions::default())?;
                let entry = entrypoints
                    .get(name)
                    .ok_or_else(|| miette::miette!("the parameter has no entrypoint `{name}`"))?;
                entry.signature()
            }
            None => micheline_typedef::Typedef::derive(&ty, "root")?,
        };

        let value = read_json(&self.value)?;
        let prim = typedef.marshal(&value, self.optimized)?;

        if self.text {
            println!("{prim}");
            Ok(())
        } else {
            print_json(&prim)
        }
    }
}
