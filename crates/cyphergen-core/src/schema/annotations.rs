//! Directive annotations on entities and attributes.

use cyphergen_common::types::Value;
use serde::{Deserialize, Serialize};

/// `@id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdAnnotation {
    /// Generate a UUID on create.
    #[serde(default = "default_true")]
    pub autogenerate: bool,
}

fn default_true() -> bool {
    true
}

/// Operations that set a `@timestamp` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimestampOperation {
    /// Set on create.
    Create,
    /// Set on update.
    Update,
}

/// `@timestamp(operations)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampAnnotation {
    /// When the timestamp is written.
    #[serde(default = "all_timestamp_operations")]
    pub operations: Vec<TimestampOperation>,
}

fn all_timestamp_operations() -> Vec<TimestampOperation> {
    vec![TimestampOperation::Create, TimestampOperation::Update]
}

/// `@cypher(statement, columnName)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CypherAnnotation {
    /// Statement run with `this` bound to the parent node.
    pub statement: String,
    /// Column the statement returns.
    pub column_name: String,
}

/// `@limit(default, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LimitAnnotation {
    /// Limit applied when the client passes none.
    pub default: Option<u32>,
    /// Upper bound on any requested limit.
    pub max: Option<u32>,
}

/// A `@fulltext` index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulltextIndex {
    /// Database index name.
    pub index_name: String,
    /// Root query field exposing the index.
    pub query_name: String,
    /// Indexed attributes.
    #[serde(default)]
    pub fields: Vec<String>,
}

/// A `@vector` index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndex {
    /// Database index name.
    pub index_name: String,
    /// Root query field exposing the index.
    pub query_name: String,
    /// Property holding the embedding.
    pub embedding_property: String,
}

/// Operations an authorization rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationOperation {
    /// Reading nodes.
    Read,
    /// Aggregating nodes.
    Aggregate,
    /// Creating nodes.
    Create,
    /// Updating nodes.
    Update,
    /// Deleting nodes.
    Delete,
    /// Connecting nodes.
    CreateRelationship,
    /// Disconnecting nodes.
    DeleteRelationship,
}

impl AuthorizationOperation {
    /// Every operation.
    pub const ALL: [AuthorizationOperation; 7] = [
        AuthorizationOperation::Read,
        AuthorizationOperation::Aggregate,
        AuthorizationOperation::Create,
        AuthorizationOperation::Update,
        AuthorizationOperation::Delete,
        AuthorizationOperation::CreateRelationship,
        AuthorizationOperation::DeleteRelationship,
    ];
}

/// When a validate rule is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationWhen {
    /// Before the operation reads or writes.
    Before,
    /// After the operation wrote.
    After,
}

fn filter_operations() -> Vec<AuthorizationOperation> {
    AuthorizationOperation::ALL
        .into_iter()
        .filter(|op| *op != AuthorizationOperation::Create)
        .collect()
}

fn validate_operations() -> Vec<AuthorizationOperation> {
    AuthorizationOperation::ALL.to_vec()
}

fn validate_when() -> Vec<AuthorizationWhen> {
    vec![AuthorizationWhen::Before, AuthorizationWhen::After]
}

/// A rule under `@authorization(filter: [...])`.
///
/// Filter rules narrow reads to the nodes matching `where`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationFilterRule {
    /// Operations the rule applies to.
    #[serde(default = "filter_operations")]
    pub operations: Vec<AuthorizationOperation>,
    /// Require an authenticated request.
    #[serde(default = "default_true")]
    pub require_authentication: bool,
    /// `{ node: {...}, jwt: {...}, AND, OR, NOT }`
    #[serde(rename = "where", default)]
    pub predicate: Value,
}

/// A rule under `@authorization(validate: [...])`.
///
/// Validate rules raise a forbidden error instead of filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationValidateRule {
    /// Operations the rule applies to.
    #[serde(default = "validate_operations")]
    pub operations: Vec<AuthorizationOperation>,
    /// Phases the rule is evaluated in.
    #[serde(default = "validate_when")]
    pub when: Vec<AuthorizationWhen>,
    /// Require an authenticated request.
    #[serde(default = "default_true")]
    pub require_authentication: bool,
    /// `{ node: {...}, jwt: {...}, AND, OR, NOT }`
    #[serde(rename = "where", default)]
    pub predicate: Value,
}

/// `@authorization(filter, validate)`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationAnnotation {
    /// Filter rules, OR-ed together.
    pub filter: Vec<AuthorizationFilterRule>,
    /// Validate rules, OR-ed together.
    pub validate: Vec<AuthorizationValidateRule>,
}

impl AuthorizationAnnotation {
    /// Filter rules that apply to any of `operations`.
    pub fn filter_rules<'a>(
        &'a self,
        operations: &'a [AuthorizationOperation],
    ) -> impl Iterator<Item = &'a AuthorizationFilterRule> {
        self.filter
            .iter()
            .filter(move |rule| rule.operations.iter().any(|op| operations.contains(op)))
    }

    /// Validate rules that apply to any of `operations` in phase `when`.
    pub fn validate_rules<'a>(
        &'a self,
        when: AuthorizationWhen,
        operations: &'a [AuthorizationOperation],
    ) -> impl Iterator<Item = &'a AuthorizationValidateRule> {
        self.validate.iter().filter(move |rule| {
            rule.when.contains(&when) && rule.operations.iter().any(|op| operations.contains(op))
        })
    }
}

/// Directives attached to an entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityAnnotations {
    /// `@authorization`
    pub authorization: Option<AuthorizationAnnotation>,
    /// `@limit`
    pub limit: Option<LimitAnnotation>,
    /// `@fulltext`
    pub fulltext: Vec<FulltextIndex>,
    /// `@vector`
    pub vector: Vec<VectorIndex>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_defaults() {
        let annotation: AuthorizationAnnotation = serde_json::from_str(
            r#"{
                "filter": [{"where": {"node": {"id": "$jwt.sub"}}}],
                "validate": [{"when": ["AFTER"], "where": {"jwt": {"roles_INCLUDES": "admin"}}}]
            }"#,
        )
        .unwrap();

        let filter = &annotation.filter[0];
        assert!(filter.require_authentication);
        assert!(!filter.operations.contains(&AuthorizationOperation::Create));

        let read = [AuthorizationOperation::Read];
        assert_eq!(annotation.filter_rules(&read).count(), 1);
        assert_eq!(
            annotation
                .validate_rules(AuthorizationWhen::Before, &read)
                .count(),
            0
        );
        assert_eq!(
            annotation
                .validate_rules(AuthorizationWhen::After, &read)
                .count(),
            1
        );
    }
}
