//! Translation configuration.

use serde::{Deserialize, Serialize};

/// Message raised by `apoc.util.validatePredicate` when a validate rule fails.
pub const DEFAULT_FORBIDDEN_MESSAGE: &str = "@neo4j/graphql/FORBIDDEN";

/// Translator-wide settings.
///
/// # Examples
///
/// ```
/// use cyphergen_engine::Config;
///
/// let config = Config::default().with_default_limit(20).with_unwind_create(false);
/// assert_eq!(config.default_limit, Some(20));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Compile batch creates with `UNWIND` when the input allows it.
    pub unwind_create: bool,
    /// Limit applied to reads that request none.
    pub default_limit: Option<u32>,
    /// Upper bound on any requested limit.
    pub max_limit: Option<u32>,
    /// Error message for failed validate rules.
    pub forbidden_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unwind_create: true,
            default_limit: None,
            max_limit: None,
            forbidden_message: DEFAULT_FORBIDDEN_MESSAGE.to_string(),
        }
    }
}

impl Config {
    /// Loads a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> cyphergen_common::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Enables or disables the `UNWIND` create path.
    #[must_use]
    pub fn with_unwind_create(mut self, enabled: bool) -> Self {
        self.unwind_create = enabled;
        self
    }

    /// Sets the default limit.
    #[must_use]
    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = Some(limit);
        self
    }

    /// Sets the maximum limit.
    #[must_use]
    pub fn with_max_limit(mut self, limit: u32) -> Self {
        self.max_limit = Some(limit);
        self
    }

    /// Sets the forbidden message.
    #[must_use]
    pub fn with_forbidden_message(mut self, message: impl Into<String>) -> Self {
        self.forbidden_message = message.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"maxLimit": 100}"#).unwrap();
        assert!(config.unwind_create);
        assert_eq!(config.max_limit, Some(100));
        assert_eq!(config.forbidden_message, DEFAULT_FORBIDDEN_MESSAGE);
    }
}
