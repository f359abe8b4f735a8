//! # cyphergen-engine
//!
//! Compiles GraphQL requests, given as resolve trees over an annotated
//! schema model, into parameterized Cypher.
//!
//! ## Modules
//!
//! - [`config`] - Translator-wide settings
//! - [`context`] - Per-request context: configuration and JWT
//! - [`factory`] - Resolve tree to Query AST
//! - [`query_ast`] - Query AST nodes and their transpilation
//! - [`translate`] - Translate drivers

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod factory;
pub mod query_ast;
pub mod translate;

pub use config::Config;
pub use context::TranslationContext;
pub use cyphergen_adapters::cypher::CypherResult;
pub use query_ast::{ExplainNode, QueryAst};
pub use translate::{explain, translate, translate_top_level_cypher};
