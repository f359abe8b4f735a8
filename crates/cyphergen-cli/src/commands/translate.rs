//! Translate command.

use anyhow::Result;
use comfy_table::Cell;
use cyphergen_engine::{translate, translate_top_level_cypher};

use super::RequestArgs;
use crate::OutputFormat;
use crate::output::{self, Format};

/// Run the translate command.
pub fn run(request: &RequestArgs, top_level_cypher: bool, format: OutputFormat, quiet: bool) -> Result<()> {
    let (schema, tree, context) = request.load()?;
    let result = if top_level_cypher {
        translate_top_level_cypher(&schema, &tree, &context)?
    } else {
        translate(&schema, &tree, &context)?
    };

    if quiet {
        return Ok(());
    }
    match Format::from(format) {
        Format::Json => output::print_json(&result)?,
        Format::Table => {
            println!("{}\n", result.cypher);
            let mut table = output::create_table();
            output::add_header(&mut table, &["Parameter", "Value"]);
            for (name, value) in &result.params {
                table.add_row(vec![Cell::new(name), Cell::new(serde_json::to_string(value)?)]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
