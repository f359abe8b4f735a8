//! Core type definitions for Cyphergen.
//!
//! This module contains the dynamically typed [`Value`] used for GraphQL
//! arguments, Cypher parameters, and JWT claims.

mod value;

pub use value::Value;
