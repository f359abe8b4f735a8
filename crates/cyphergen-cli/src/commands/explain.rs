//! Explain command.

use anyhow::Result;
use cyphergen_engine::explain;

use super::RequestArgs;
use crate::OutputFormat;
use crate::output::{self, Format};

/// Run the explain command.
pub fn run(request: &RequestArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let (schema, tree, context) = request.load()?;
    let plan = explain(&schema, &tree, &context)?;
    if quiet {
        return Ok(());
    }
    match Format::from(format) {
        Format::Json => output::print_json(&plan)?,
        Format::Table => print!("{plan}"),
    }
    Ok(())
}
