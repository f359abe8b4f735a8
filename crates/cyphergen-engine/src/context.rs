//! Per-request translation context.

use cyphergen_common::types::Value;

use crate::config::Config;

/// Everything a translation needs besides the schema and the request:
/// configuration and the caller's decoded JWT.
#[derive(Debug, Clone, Default)]
pub struct TranslationContext {
    /// Configuration.
    pub config: Config,
    /// Decoded JWT claims, if the request is authenticated.
    pub jwt: Option<Value>,
}

impl TranslationContext {
    /// Creates an unauthenticated context.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, jwt: None }
    }

    /// Attaches JWT claims.
    #[must_use]
    pub fn with_jwt(mut self, jwt: Value) -> Self {
        self.jwt = if jwt.is_null() { None } else { Some(jwt) };
        self
    }

    /// Returns `true` if a JWT is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.jwt.is_some()
    }

    /// JWT claims, or an empty map when unauthenticated.
    #[must_use]
    pub fn jwt_claims(&self) -> Value {
        self.jwt.clone().unwrap_or_else(Value::empty_map)
    }
}
