use clap::Args;
use micheline_typedef::build_type;

use crate::{print_json, read_prim};

/// Guess the type of an untyped Micheline value.
#[derive(Args, Debug)]
pub struct Infer {
    /// Micheline JSON file holding a value, or `-` for stdin.
    input: String,

    /// Print the typedef of the guessed type instead of the type itself.
    #[clap(long)]
    typedef: bool,

    /// Print Micheline JSON instead of Michelson notation.
    #[clap(long, conflicts_with = "typedef")]
    json: bool,
}

impl Infer {
    pub fn exec(self) -> miette::Result<()> {
        let value = read_prim(&self.input)?;

        if self.typedef {
            let typedef = micheline_typedef::Typedef::infer(&value, "value")?;
            return print_json(&typedef);
        }

        let ty = build_type(&value);
        if self.json {
            print_json(&ty)
        } else {
            println!("{ty}");
            Ok(())
        }
    }
}
