//! Utility functions and helpers.

pub mod error;
pub mod strings;
