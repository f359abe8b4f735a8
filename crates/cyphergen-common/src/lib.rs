//! # cyphergen-common
//!
//! Foundation layer for Cyphergen: value types, errors, and utilities.
//!
//! This crate provides the building blocks shared by every other Cyphergen
//! crate. It has no internal dependencies and should be kept minimal.
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions ([`Value`])
//! - [`utils`] - Utility functions and helpers (errors, string casing)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use types::Value;
pub use utils::error::{Error, InputError, Result, SchemaError};
