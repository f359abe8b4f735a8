//! Schema command.

use std::path::Path;

use anyhow::Result;
use comfy_table::{Cell, Color};
use cyphergen_core::schema::{Entity, SchemaModel};
use serde::Serialize;

use crate::OutputFormat;
use crate::output::{self, Format};

/// Entity summary for JSON output.
#[derive(Serialize)]
struct EntitySummary {
    name: String,
    kind: &'static str,
    concrete: Vec<String>,
    root_fields: Vec<String>,
}

/// Query-level `@cypher` field summary.
#[derive(Serialize)]
struct QueryFieldSummary {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Serialize)]
struct SchemaSummary {
    entities: Vec<EntitySummary>,
    query_fields: Vec<QueryFieldSummary>,
}

/// Run the schema command.
pub fn run(path: &Path, format: OutputFormat, quiet: bool) -> Result<()> {
    let schema = super::load_schema(path)?;
    if quiet {
        return Ok(());
    }
    let summary = summarize(&schema);

    match Format::from(format) {
        Format::Json => output::print_json(&summary)?,
        Format::Table => {
            let mut table = output::create_table();
            output::add_header(&mut table, &["Entity", "Kind", "Concrete", "Root fields"]);
            for entity in &summary.entities {
                table.add_row(vec![
                    Cell::new(&entity.name).fg(Color::Green),
                    Cell::new(entity.kind),
                    Cell::new(entity.concrete.join(", ")),
                    Cell::new(entity.root_fields.join("\n")),
                ]);
            }
            println!("{table}");

            if !summary.query_fields.is_empty() {
                let mut table = output::create_table();
                output::add_header(&mut table, &["Query field", "Type"]);
                for field in &summary.query_fields {
                    table.add_row(vec![Cell::new(&field.name), Cell::new(&field.field_type)]);
                }
                println!("{table}");
            }
        }
    }
    Ok(())
}

fn summarize(schema: &SchemaModel) -> SchemaSummary {
    let entities = schema
        .entities()
        .map(|entity| {
            let names = entity.root_fields();
            // Mutations exist for concrete entities only
            let root_fields = if entity.is_abstract() {
                vec![names.read, names.connection, names.aggregate]
            } else {
                vec![
                    names.read,
                    names.connection,
                    names.aggregate,
                    names.create,
                    names.update,
                    names.delete,
                ]
            };
            EntitySummary {
                name: entity.name().to_string(),
                kind: match entity {
                    Entity::Concrete(_) => "node",
                    Entity::Interface(_) => "interface",
                    Entity::Union(_) => "union",
                },
                concrete: entity.concrete_names().into_iter().map(String::from).collect(),
                root_fields,
            }
        })
        .collect();

    let query_fields = schema
        .query_fields()
        .map(|field| QueryFieldSummary {
            name: field.name.clone(),
            field_type: field.attribute_type.to_string(),
        })
        .collect();

    SchemaSummary {
        entities,
        query_fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "entities": [
            {"kind": "concrete", "name": "Movie", "labels": ["Movie"], "attributes": [{"name": "title", "type": "String"}]},
            {"kind": "concrete", "name": "Series", "labels": ["Series"], "attributes": [{"name": "title", "type": "String"}]},
            {"kind": "union", "name": "Production", "members": ["Movie", "Series"]}
        ]
    }"#;

    #[test]
    fn test_summary_lists_mutations_for_concrete_entities_only() {
        let schema = SchemaModel::from_json(SCHEMA).unwrap();
        let summary = summarize(&schema);

        assert_eq!(summary.entities.len(), 3);
        let movie = &summary.entities[0];
        assert_eq!(movie.kind, "node");
        assert_eq!(
            movie.root_fields,
            ["movies", "moviesConnection", "moviesAggregate", "createMovies", "updateMovies", "deleteMovies"]
        );
        let production = &summary.entities[2];
        assert_eq!(production.kind, "union");
        assert_eq!(production.concrete, ["Movie", "Series"]);
        assert_eq!(production.root_fields.len(), 3);
    }
}
