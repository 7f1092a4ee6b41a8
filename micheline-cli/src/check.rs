use clap::Args;
use micheline_typedef::{TypeMismatch, Typedef};
use micheline_types::Prim;
use miette::{GraphicalReportHandler, GraphicalTheme, WrapErr};

use crate::{read_input, read_prim};

/// Check that a Micheline value conforms to a type.
#[derive(Args, Debug)]
pub struct Check {
    /// Micheline JSON file holding the type.
    #[clap(long = "type", value_name = "FILE")]
    ty: String,

    /// Micheline JSON file holding the value, or `-` for stdin.
    value: String,
}

impl Check {
    /// Print the first mismatch and exit with a non-zero status if the value
    /// does not conform.
    pub fn exec(self) -> miette::Result<()> {
        let ty = read_prim(&self.ty)?;
        let typedef = Typedef::derive(&ty, "root")?;

        let source = read_input(&self.value)?;
        let value = Prim::from_json(&source)
            .wrap_err_with(|| format!("`{}` is not Micheline JSON", self.value))?;

        if let Err(mismatch) = typedef.check_value(&value) {
            let name = if self.value == "-" { "<stdin>" } else { &self.value };
            let rendered = render_mismatch(&mismatch)?;
            eprintln!("{name}: value does not conform to `{}`", self.ty);
            eprintln!("{rendered}");
            std::process::exit(1);
        }
        Ok(())
    }
}

/// The mismatch as a graphical report. It carries no source spans, so only
/// the message, code and help are drawn.
fn render_mismatch(mismatch: &TypeMismatch) -> miette::Result<String> {
    let mut rendered = String::new();
    GraphicalReportHandler::new()
        .with_theme(GraphicalTheme::unicode_nocolor())
        .render_report(&mut rendered, mismatch)
        .map_err(|err| miette::miette!("failed to render mismatch: {err}"))?;
    Ok(rendered)
}
