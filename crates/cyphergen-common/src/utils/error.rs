//! Error types for Cyphergen.
//!
//! Translation either produces Cypher or fails fast with a diagnosable
//! message. There are three families of failures:
//!
//! - [`SchemaError`]: the request cannot be resolved against the schema model
//! - [`InputError`]: the client supplied a malformed argument
//! - [`Error::Internal`]: an invariant of the translator itself was violated

use thiserror::Error;

/// Result type alias for Cyphergen operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Schema resolution failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The request contained invalid input.
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),

    /// Reading or writing a serialized document failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// Returns `true` if the error was caused by client input rather than by
    /// the schema or the translator.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::Input(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Errors raised while resolving a request against the schema model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// No entity with the given name exists.
    #[error("entity `{0}` not found")]
    EntityNotFound(String),

    /// The requested field is neither an attribute nor a relationship.
    #[error("field `{field}` not found on `{entity}`")]
    FieldNotFound {
        /// The entity or relationship-properties type that was searched.
        entity: String,
        /// The requested field name.
        field: String,
    },

    /// A connection or aggregation was requested on relationship properties.
    #[error("`{field}` cannot be requested on relationship properties `{anchor}`")]
    InvalidAnchor {
        /// The relationship-properties type.
        anchor: String,
        /// The requested field name.
        field: String,
    },

    /// The type returned by an attribute does not name a known entity.
    #[error("cannot resolve type `{type_name}` of `{entity}.{attribute}`")]
    UnresolvedType {
        /// Owning entity.
        entity: String,
        /// Attribute name.
        attribute: String,
        /// The unresolved type name.
        type_name: String,
    },

    /// The root field does not belong to any entity or Query field.
    #[error("unknown root field `{0}`")]
    UnknownRootField(String),

    /// The schema model references something that does not exist.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Errors caused by malformed client arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// A `where` argument has the wrong shape.
    #[error("invalid filter on `{field}`: {message}")]
    InvalidWhere {
        /// Offending key.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// A filter key used an operator that does not apply to the field.
    #[error("unknown filter operator `{operator}` on `{field}`")]
    UnknownOperator {
        /// Offending field.
        field: String,
        /// The operator suffix.
        operator: String,
    },

    /// An operation argument has the wrong shape.
    #[error("invalid argument `{argument}`: {message}")]
    InvalidArgument {
        /// Argument name.
        argument: String,
        /// What was wrong with it.
        message: String,
    },

    /// A pagination cursor could not be decoded.
    #[error("invalid cursor `{0}`")]
    InvalidCursor(String),
}

impl InputError {
    /// Shorthand for [`InputError::InvalidWhere`].
    pub fn invalid_where(field: impl Into<String>, message: impl Into<String>) -> Self {
        InputError::InvalidWhere {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`InputError::InvalidArgument`].
    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        InputError::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_field() {
        let err: Error = SchemaError::FieldNotFound {
            entity: "Movie".to_string(),
            field: "budget".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "schema error: field `budget` not found on `Movie`"
        );

        let err: Error = InputError::UnknownOperator {
            field: "title".to_string(),
            operator: "FOO".to_string(),
        }
        .into();
        assert!(err.to_string().contains("`FOO`"));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_internal_is_not_user_error() {
        assert!(!Error::internal("no target").is_user_error());
    }
}
