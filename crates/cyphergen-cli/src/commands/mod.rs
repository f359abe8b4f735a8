//! CLI command implementations.

pub mod explain;
pub mod schema;
pub mod translate;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use cyphergen_common::types::Value;
use cyphergen_core::resolve_tree::ResolveTree;
use cyphergen_core::schema::SchemaModel;
use cyphergen_engine::{Config, TranslationContext};

/// Inputs of a translation.
#[derive(Args)]
pub struct RequestArgs {
    /// Path to the schema model (JSON)
    pub schema: PathBuf,

    /// Path to the request's resolve tree (JSON)
    pub request: PathBuf,

    /// Decoded JWT claims of the caller (JSON)
    #[arg(long)]
    pub jwt: Option<PathBuf>,

    /// Translator configuration (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl RequestArgs {
    /// Reads every file named on the command line.
    pub fn load(&self) -> Result<(SchemaModel, ResolveTree, TranslationContext)> {
        let schema = load_schema(&self.schema)?;
        let tree: ResolveTree = serde_json::from_str(&read(&self.request)?)
            .with_context(|| format!("parsing request {}", self.request.display()))?;

        let config = match &self.config {
            Some(path) => Config::from_json(&read(path)?).with_context(|| format!("parsing config {}", path.display()))?,
            None => Config::default(),
        };
        let mut context = TranslationContext::new(config);
        if let Some(path) = &self.jwt {
            let claims: serde_json::Value =
                serde_json::from_str(&read(path)?).with_context(|| format!("parsing JWT {}", path.display()))?;
            context = context.with_jwt(Value::from(claims));
        }
        Ok((schema, tree, context))
    }
}

/// Loads a schema model document.
pub fn load_schema(path: &Path) -> Result<SchemaModel> {
    SchemaModel::from_json(&read(path)?).with_context(|| format!("loading schema {}", path.display()))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
