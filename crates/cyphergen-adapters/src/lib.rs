//! # cyphergen-adapters
//!
//! Output-language adapters for Cyphergen.
//!
//! ## Modules
//!
//! - [`cypher`] - Typed Cypher clauses, expressions, patterns, and the
//!   renderer that turns them into `{cypher, params}`

#![warn(missing_docs)]

pub mod cypher;
