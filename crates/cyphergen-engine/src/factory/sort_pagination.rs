//! `sort`, `options`, `limit`, `offset`, `first` and `after` arguments.

use cyphergen_adapters::cypher::SortDirection;
use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{InputError, Result, SchemaError};
use cyphergen_core::resolve_tree::ResolveTree;
use cyphergen_core::schema::{Attribute, Entity, RelationshipProperties};

use super::FactoryScope;
use crate::query_ast::PropertyTarget;
use crate::query_ast::pagination::{Pagination, cursor_to_offset};
use crate::query_ast::sort::{CypherPropertySort, PropertySort, Sort};

/// `sort` or `options.sort`, then `limit` or `options.limit`, and so on.
fn read_arg<'t>(tree: &'t ResolveTree, name: &str) -> Option<&'t Value> {
    tree.arg(name)
        .or_else(|| tree.arg("options").and_then(|options| options.get(name)))
        .filter(|value| !value.is_null())
}

fn direction(key: &str, value: &Value) -> Result<SortDirection> {
    match value.as_str() {
        Some("ASC") => Ok(SortDirection::Asc),
        Some("DESC") => Ok(SortDirection::Desc),
        _ => Err(InputError::invalid_argument("sort", format!("`{key}` must be ASC or DESC")).into()),
    }
}

fn non_negative(argument: &str, value: &Value) -> Result<i64> {
    value
        .as_i64()
        .filter(|n| *n >= 0)
        .ok_or_else(|| InputError::invalid_argument(argument, "expected a non-negative integer").into())
}

/// Builds sort items and pagination bounds.
#[derive(Debug, Clone, Copy)]
pub struct SortAndPaginationFactory<'a> {
    scope: FactoryScope<'a>,
}

impl<'a> SortAndPaginationFactory<'a> {
    /// Creates a factory.
    #[must_use]
    pub fn new(scope: FactoryScope<'a>) -> Self {
        Self { scope }
    }

    /// `sort: [{ title: ASC }, { released: DESC }]` on a read.
    pub fn create_sort(&self, entity: &'a Entity, tree: &ResolveTree) -> Result<Vec<Sort<'a>>> {
        let Some(sort) = read_arg(tree, "sort") else {
            return Ok(Vec::new());
        };
        let mut items = Vec::new();
        for item in sort.items() {
            items.extend(self.node_sort(entity, item)?);
        }
        Ok(items)
    }

    fn node_sort(&self, entity: &'a Entity, item: &Value) -> Result<Vec<Sort<'a>>> {
        let map = item
            .as_map()
            .ok_or_else(|| InputError::invalid_argument("sort", "expected an object"))?;
        map.iter()
            .map(|(key, value)| {
                let attribute = entity.find_attribute(key).ok_or_else(|| SchemaError::FieldNotFound {
                    entity: entity.name().to_string(),
                    field: key.clone(),
                })?;
                Self::attribute_sort(attribute, PropertyTarget::Node, direction(key, value)?)
            })
            .collect()
    }

    fn attribute_sort(attribute: &'a Attribute, target: PropertyTarget, direction: SortDirection) -> Result<Sort<'a>> {
        Ok(match attribute.annotations.cypher.as_ref() {
            Some(_) if target == PropertyTarget::Edge => {
                return Err(InputError::invalid_argument("sort", "cannot sort on a @cypher edge property").into());
            }
            Some(annotation) => Sort::Cypher(CypherPropertySort::new(attribute, annotation, direction)),
            None => Sort::Property(PropertySort {
                attribute,
                direction,
                target,
            }),
        })
    }

    /// `sort` on a connection.
    ///
    /// Items are `{ node: {...} }`, `{ edge: {...} }`, `{ score: DESC }` when
    /// `with_score` is set, or plain node attributes for root connections.
    pub fn create_connection_sort(
        &self,
        entity: &'a Entity,
        properties: Option<&'a RelationshipProperties>,
        tree: &ResolveTree,
        with_score: bool,
    ) -> Result<Vec<Sort<'a>>> {
        let Some(sort) = tree.arg("sort") else {
            return Ok(Vec::new());
        };
        let mut items = Vec::new();
        for item in sort.items() {
            let map = item
                .as_map()
                .ok_or_else(|| InputError::invalid_argument("sort", "expected an object"))?;
            for (key, value) in map {
                match key.as_str() {
                    "node" if value.as_map().is_some() => items.extend(self.node_sort(entity, value)?),
                    "edge" => {
                        let properties = properties.ok_or_else(|| SchemaError::FieldNotFound {
                            entity: entity.name().to_string(),
                            field: "edge".to_string(),
                        })?;
                        for (name, value) in value
                            .as_map()
                            .ok_or_else(|| InputError::invalid_argument("sort", "expected an object"))?
                        {
                            let attribute = properties.find_attribute(name).ok_or_else(|| {
                                SchemaError::FieldNotFound {
                                    entity: properties.name.clone(),
                                    field: name.clone(),
                                }
                            })?;
                            items.push(Self::attribute_sort(attribute, PropertyTarget::Edge, direction(name, value)?)?);
                        }
                    }
                    "score" if with_score => items.push(Sort::Score(direction(key, value)?)),
                    _ => {
                        let single = Value::Map([(key.clone(), value.clone())].into_iter().collect());
                        items.extend(self.node_sort(entity, &single)?);
                    }
                }
            }
        }
        Ok(items)
    }

    /// `limit` and `offset` of a read, bounded by `@limit` and the
    /// configured limits.
    pub fn create_pagination(&self, entity: &Entity, tree: &ResolveTree) -> Result<Pagination> {
        let limit = read_arg(tree, "limit").map(|v| non_negative("limit", v)).transpose()?;
        let skip = read_arg(tree, "offset").map(|v| non_negative("offset", v)).transpose()?;
        Ok(Pagination {
            skip: skip.filter(|skip| *skip > 0),
            limit: self.resolve_limit(entity, limit),
        })
    }

    /// `first` and `after` of a connection.
    pub fn create_connection_pagination(&self, entity: &Entity, tree: &ResolveTree) -> Result<Pagination> {
        let first = tree.arg("first").map(|v| non_negative("first", v)).transpose()?;
        let skip = match tree.arg("after") {
            Some(after) => {
                let cursor = after
                    .as_str()
                    .ok_or_else(|| InputError::invalid_argument("after", "expected a cursor"))?;
                let offset = cursor_to_offset(cursor)?;
                Some(
                    offset
                        .checked_add(1)
                        .ok_or_else(|| InputError::InvalidCursor(cursor.to_string()))?,
                )
            }
            None => None,
        };
        Ok(Pagination {
            skip,
            limit: self.resolve_limit(entity, first),
        })
    }

    /// The requested limit, else the `@limit` default, else the configured
    /// default; never above the `@limit` or configured maximum.
    pub(crate) fn resolve_limit(&self, entity: &Entity, requested: Option<i64>) -> Option<i64> {
        let annotation = entity.annotations().limit;
        let config = &self.scope.context.config;
        let limit = requested
            .or_else(|| annotation.and_then(|limit| limit.default).map(i64::from))
            .or_else(|| config.default_limit.map(i64::from));
        let max = annotation
            .and_then(|limit| limit.max)
            .or(config.max_limit)
            .map(i64::from);
        match (limit, max) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (None, max) => max,
            (limit, None) => limit,
        }
    }
}
