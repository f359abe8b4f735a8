//! `@authorization` rules to filters.
//!
//! Filter rules drop rows; validate rules abort the query. Rules declared on
//! an attribute apply when that attribute is read or written, and their
//! `node` conditions refer to the owning node.

use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{InputError, Result};
use cyphergen_core::schema::{
    Attribute, AuthorizationAnnotation, AuthorizationOperation, AuthorizationWhen, Entity,
};

use super::FactoryScope;
use super::filters::{FilterFactory, as_where, conjunction, split_key};
use crate::query_ast::filters::{
    AuthorizationFilter, AuthorizationKind, AuthorizationRule, Filter, FilterOperator, FilterValue,
    JwtFilter, LogicalFilter, LogicalOperator,
};

/// Builds authorization filters for entities and attributes.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationFactory<'a> {
    scope: FactoryScope<'a>,
}

impl<'a> AuthorizationFactory<'a> {
    /// Creates a factory.
    #[must_use]
    pub fn new(scope: FactoryScope<'a>) -> Self {
        Self { scope }
    }

    /// Filter rules of `entity` for `operations`, followed by its validate
    /// rules evaluated before the operation.
    pub fn create_entity_auth_filters(
        &self,
        entity: &'a Entity,
        operations: &[AuthorizationOperation],
    ) -> Result<Vec<Filter<'a>>> {
        let Some(annotation) = entity.annotations().authorization.as_ref() else {
            return Ok(Vec::new());
        };
        let mut filters = Vec::new();
        filters.extend(self.filter_rules(entity, annotation, operations)?);
        filters.extend(self.validate_rules(entity, annotation, AuthorizationWhen::Before, operations)?);
        Ok(filters)
    }

    /// Validate rules of `entity` for one phase.
    pub fn create_entity_validate(
        &self,
        entity: &'a Entity,
        when: AuthorizationWhen,
        operations: &[AuthorizationOperation],
    ) -> Result<Option<Filter<'a>>> {
        match entity.annotations().authorization.as_ref() {
            Some(annotation) => self.validate_rules(entity, annotation, when, operations),
            None => Ok(None),
        }
    }

    /// Filter and `BEFORE` validate rules of the `attributes` of `entity`
    /// that are read.
    pub fn create_attribute_auth_filters(
        &self,
        entity: &'a Entity,
        attributes: &[&'a Attribute],
        operations: &[AuthorizationOperation],
    ) -> Result<Vec<Filter<'a>>> {
        let mut filters = Vec::new();
        for annotation in attributes.iter().filter_map(|a| a.annotations.authorization.as_ref()) {
            filters.extend(self.filter_rules(entity, annotation, operations)?);
            filters.extend(self.validate_rules(entity, annotation, AuthorizationWhen::Before, operations)?);
        }
        Ok(filters)
    }

    /// Validate rules of the written `attributes` for one phase.
    pub fn create_attribute_validate(
        &self,
        entity: &'a Entity,
        attributes: &[&'a Attribute],
        when: AuthorizationWhen,
        operations: &[AuthorizationOperation],
    ) -> Result<Vec<Filter<'a>>> {
        let mut filters = Vec::new();
        for annotation in attributes.iter().filter_map(|a| a.annotations.authorization.as_ref()) {
            filters.extend(self.validate_rules(entity, annotation, when, operations)?);
        }
        Ok(filters)
    }

    fn filter_rules(
        &self,
        entity: &'a Entity,
        annotation: &AuthorizationAnnotation,
        operations: &[AuthorizationOperation],
    ) -> Result<Option<Filter<'a>>> {
        let rules = annotation
            .filter_rules(operations)
            .map(|rule| self.rule(entity, rule.require_authentication, &rule.predicate))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::wrap(AuthorizationKind::Filter, rules))
    }

    fn validate_rules(
        &self,
        entity: &'a Entity,
        annotation: &AuthorizationAnnotation,
        when: AuthorizationWhen,
        operations: &[AuthorizationOperation],
    ) -> Result<Option<Filter<'a>>> {
        let rules = annotation
            .validate_rules(when, operations)
            .map(|rule| self.rule(entity, rule.require_authentication, &rule.predicate))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::wrap(AuthorizationKind::Validate, rules))
    }

    fn wrap(kind: AuthorizationKind, rules: Vec<AuthorizationRule<'a>>) -> Option<Filter<'a>> {
        if rules.is_empty() {
            return None;
        }
        Some(Filter::Authorization(AuthorizationFilter { kind, rules }))
    }

    fn rule(&self, entity: &'a Entity, require_authentication: bool, predicate: &Value) -> Result<AuthorizationRule<'a>> {
        let inner = if predicate.is_null() {
            None
        } else {
            Filter::and(self.rule_filters(entity, predicate)?).map(Box::new)
        };
        Ok(AuthorizationRule {
            require_authentication,
            inner,
        })
    }

    /// `{ node: {...}, jwt: {...}, AND: [...], OR: [...], NOT: {...} }`
    fn rule_filters(&self, entity: &'a Entity, predicate: &Value) -> Result<Vec<Filter<'a>>> {
        let mut filters = Vec::new();
        for (key, value) in as_where("where", predicate)? {
            match key.as_str() {
                "node" => {
                    let node = FilterFactory::for_rules(self.scope).create_node_filters(entity, Some(value))?;
                    filters.extend(node);
                }
                "jwt" => filters.extend(Self::jwt_filters(value)?),
                "AND" | "OR" => {
                    let operator = if key == "AND" {
                        LogicalOperator::And
                    } else {
                        LogicalOperator::Or
                    };
                    let children = value
                        .items()
                        .map(|item| self.rule_filters(entity, item).map(conjunction))
                        .collect::<Result<Vec<_>>>()?;
                    filters.push(Filter::Logical(LogicalFilter::new(operator, children)));
                }
                "NOT" => {
                    let child = conjunction(self.rule_filters(entity, value)?);
                    filters.push(Filter::Logical(LogicalFilter::new(LogicalOperator::Not, vec![child])));
                }
                _ => return Err(InputError::invalid_where(key, "unknown authorization condition").into()),
            }
        }
        Ok(filters)
    }

    /// `jwt: { roles_INCLUDES: "admin", sub: "$jwt.sub" }`
    fn jwt_filters(value: &Value) -> Result<Vec<Filter<'a>>> {
        let mut filters = Vec::new();
        for (key, value) in as_where("jwt", value)? {
            match key.as_str() {
                "AND" | "OR" | "NOT" => {
                    let operator = match key.as_str() {
                        "AND" => LogicalOperator::And,
                        "OR" => LogicalOperator::Or,
                        _ => LogicalOperator::Not,
                    };
                    let children = value
                        .items()
                        .map(|item| Self::jwt_filters(item).map(conjunction))
                        .collect::<Result<Vec<_>>>()?;
                    filters.push(Filter::Logical(LogicalFilter::new(operator, children)));
                }
                _ => {
                    let (path, suffix) = split_key(key)?;
                    let operator = match suffix {
                        None => FilterOperator::Eq,
                        Some(suffix) => FilterOperator::from_suffix(suffix).ok_or_else(|| InputError::UnknownOperator {
                            field: path.to_string(),
                            operator: suffix.to_string(),
                        })?,
                    };
                    filters.push(Filter::Jwt(JwtFilter {
                        path: path.to_string(),
                        operator,
                        value: FilterValue::from_rule_value(value.clone()),
                    }));
                }
            }
        }
        Ok(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use cyphergen_common::utils::error::Error;
    use cyphergen_core::schema::{AttributeType, ConcreteEntity, EntityAnnotations, SchemaModel};
    use serde_json::json;

    fn schema() -> SchemaModel {
        let entity_rules: AuthorizationAnnotation = serde_json::from_value(json!({
            "filter": [{"where": {"node": {"owner": "$jwt.sub"}}}],
            "validate": [
                {"when": ["BEFORE"], "operations": ["DELETE"], "where": {"jwt": {"roles_INCLUDES": "admin"}}},
                {"when": ["AFTER"], "operations": ["CREATE", "UPDATE"], "requireAuthentication": false,
                 "where": {"OR": [{"node": {"owner": "$jwt.sub"}}, {"jwt": {"admin": true}}]}}
            ]
        }))
        .unwrap();
        let secret_rules: AuthorizationAnnotation = serde_json::from_value(json!({
            "validate": [{"where": {"jwt": {"roles_INCLUDES": "auditor"}}}]
        }))
        .unwrap();
        SchemaModel::builder()
            .entity(
                ConcreteEntity::new("Post")
                    .attribute(Attribute::new("owner", AttributeType::string()))
                    .attribute(Attribute::new("secret", AttributeType::string()).authorization(secret_rules))
                    .annotations(EntityAnnotations {
                        authorization: Some(entity_rules),
                        ..EntityAnnotations::default()
                    }),
            )
            .build()
            .unwrap()
    }

    fn kinds(filters: &[Filter<'_>]) -> Vec<AuthorizationKind> {
        filters
            .iter()
            .map(|filter| match filter {
                Filter::Authorization(auth) => auth.kind,
                other => panic!("unexpected filter {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_read_gets_filter_rules_only() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = AuthorizationFactory::new(FactoryScope::new(&schema, &context));
        let post = schema.entity("Post").unwrap();
        let filters = factory
            .create_entity_auth_filters(post, &[AuthorizationOperation::Read])
            .unwrap();
        assert_eq!(kinds(&filters), vec![AuthorizationKind::Filter]);
    }

    #[test]
    fn test_delete_gets_before_validate() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = AuthorizationFactory::new(FactoryScope::new(&schema, &context));
        let post = schema.entity("Post").unwrap();
        let filters = factory
            .create_entity_auth_filters(post, &[AuthorizationOperation::Delete])
            .unwrap();
        assert_eq!(kinds(&filters), vec![AuthorizationKind::Filter, AuthorizationKind::Validate]);
    }

    #[test]
    fn test_after_validate_for_create() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = AuthorizationFactory::new(FactoryScope::new(&schema, &context));
        let post = schema.entity("Post").unwrap();
        let Some(Filter::Authorization(validate)) = factory
            .create_entity_validate(post, AuthorizationWhen::After, &[AuthorizationOperation::Create])
            .unwrap()
        else {
            panic!("expected an after validate rule");
        };
        assert_eq!(validate.rules.len(), 1);
        assert!(!validate.rules[0].require_authentication);
        assert!(matches!(
            validate.rules[0].inner.as_deref(),
            Some(Filter::Logical(LogicalFilter { operator: LogicalOperator::Or, .. }))
        ));

        assert!(factory
            .create_entity_validate(post, AuthorizationWhen::After, &[AuthorizationOperation::Read])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_attribute_rules() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = AuthorizationFactory::new(FactoryScope::new(&schema, &context));
        let post = schema.entity("Post").unwrap();
        let secret = post.find_attribute("secret").unwrap();
        let owner = post.find_attribute("owner").unwrap();

        let filters = factory
            .create_attribute_auth_filters(post, &[owner, secret], &[AuthorizationOperation::Read])
            .unwrap();
        assert_eq!(kinds(&filters), vec![AuthorizationKind::Validate]);
        let Filter::Authorization(validate) = &filters[0] else {
            unreachable!();
        };
        assert!(matches!(
            validate.rules[0].inner.as_deref(),
            Some(Filter::Jwt(JwtFilter { operator: FilterOperator::Includes, .. }))
        ));
    }

    #[test]
    fn test_unknown_rule_key() {
        let schema = schema();
        let context = TranslationContext::default();
        let factory = AuthorizationFactory::new(FactoryScope::new(&schema, &context));
        let post = schema.entity("Post").unwrap();
        let err = factory
            .rule(post, true, &Value::from(json!({"user": {}})))
            .unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidWhere { .. })));
    }
}
