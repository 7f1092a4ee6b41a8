use clap::Args;

use crate::{print_json, read_prim};

/// Derive the typedef of a Micheline type.
#[derive(Args, Debug)]
pub struct Typedef {
    /// Micheline JSON file holding a type, or `-` for stdin.
    input: String,

    /// Name given to the root when the type carries no annotation.
    #[clap(long, default_value = "root")]
    name: String,

    /// Inline anonymous nested structs.
    #[clap(short, long)]
    unfold: bool,

    /// Print a one-line rendering instead of JSON.
    #[clap(short, long)]
    text: bool,
}

impl Typedef {
    pub fn exec(self) -> miette::Result<()> {
        let prim = read_prim(&self.input)?;
        let mut typedef = micheline_typedef::Typedef::derive(&prim, &self.name)?;
        if self.unfold {
            typedef = typedef.unfold();
        }

        if self.text {
            println!("{typedef}");
            Ok(())
        } else {
            print_json(&typedef)
        }
    }
}
