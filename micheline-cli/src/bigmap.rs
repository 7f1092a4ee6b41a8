use clap::Subcommand;
use micheline_typedef::{decode_events, detect_bigmaps, encode_events, events_from_json};
use miette::{IntoDiagnostic, WrapErr};

use crate::{print_json, read_input, read_prim};

#[derive(Debug, Subcommand)]
pub enum Bigmap {
    /// Decode a hex-encoded binary diff stream into JSON events.
    Decode {
        /// File holding the hex text, or `-` for stdin.
        input: String,
    },
    /// Encode JSON events into a hex-encoded binary diff stream.
    Encode {
        /// File holding a JSON array of events, or `-` for stdin.
        input: String,
    },
    /// Find the ids of the big maps held in a storage value.
    Detect {
        /// Micheline JSON file holding the storage type.
        #[clap(long = "type", value_name = "FILE")]
        ty: String,
        /// Micheline JSON file holding the storage value, or `-` for stdin.
        storage: String,
    },
}

impl Bigmap {
    pub fn exec(self) -> miette::Result<()> {
        match self {
            Bigmap::Decode { input } => {
                let text = read_input(&input)?;
                let bytes = hex::decode(text.trim())
                    .into_diagnostic()
                    .wrap_err_with(|| format!("`{input}` is not hex"))?;
                let events = decode_events(&bytes)?;
                print_json(&events)
            }
            Bigmap::Encode { input } => {
                let events = events_from_json(&read_input(&input)?)?;
                println!("{}", hex::encode(encode_events(&events)?));
                Ok(())
            }
            Bigmap::Detect { ty, storage } => {
                let found = detect_bigmaps(&read_prim(&ty)?, &read_prim(&storage)?)?;
                print_json(&found)
            }
        }
    }
}
