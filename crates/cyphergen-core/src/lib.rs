//! # cyphergen-core
//!
//! Core layer for Cyphergen: the schema model and the parsed request tree.
//!
//! Both are plain data. The schema model is built once and shared read-only
//! across translations; a resolve tree is built per request. This crate
//! depends only on `cyphergen-common`.
//!
//! ## Modules
//!
//! - [`schema`] - Entities, attributes, relationships and their annotations
//! - [`resolve_tree`] - Requested GraphQL fields with arguments and selections

#![warn(missing_docs)]

pub mod resolve_tree;
pub mod schema;

// Re-export commonly used types
pub use resolve_tree::ResolveTree;
pub use schema::{Entity, SchemaModel};
