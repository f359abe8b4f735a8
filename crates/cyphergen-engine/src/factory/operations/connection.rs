use cyphergen_common::types::Value;
use cyphergen_common::utils::error::{InputError, Result, SchemaError};
use cyphergen_core::resolve_tree::ResolveTree;
use cyphergen_core::schema::{
    AuthorizationOperation, ConcreteEntity, Entity, FulltextIndex, Relationship, RelationshipProperties, VectorIndex,
};

use super::{Branch, branches, lookup_order, read_attributes};
use crate::factory::filters::as_where;
use crate::factory::{
    AuthorizationFactory, FactoryScope, FieldFactory, FilterFactory, SortAndPaginationFactory, as_concrete,
    concrete_labels, is_introspection,
};
use crate::query_ast::filters::Filter;
use crate::query_ast::operations::{
    CompositeConnectionOperation, ConnectionBranch, ConnectionOperation, ConnectionProjection, Operation,
};
use crate::query_ast::pagination::Pagination;
use crate::query_ast::selection::{
    FulltextSelection, NodeSelection, RelationshipSelection, Selection, VectorSelection,
};
use crate::query_ast::sort::Sort;

/// Neighbours requested from a vector index when `first` is not given.
pub const DEFAULT_NEIGHBOURS: i64 = 4;

/// What a connection selection asks for.
#[derive(Debug, Default)]
struct ConnectionSelection {
    projection: ConnectionProjection,
    node: Option<ResolveTree>,
    properties: Option<ResolveTree>,
}

impl ConnectionSelection {
    /// Reads `edges { node properties cursor score } totalCount pageInfo`.
    fn parse(tree: &ResolveTree, owner: &str) -> Result<Self> {
        let mut selection = Self::default();
        for (alias, field) in tree.merged_fields() {
            match field.name.as_str() {
                "edges" => {
                    selection.projection.edges = Some(alias);
                    for (edge_alias, edge_field) in field.merged_fields() {
                        match edge_field.name.as_str() {
                            "node" => {
                                selection.projection.node = Some(edge_alias);
                                selection.node = Some(edge_field);
                            }
                            "properties" => {
                                selection.projection.properties = Some(edge_alias);
                                selection.properties = Some(edge_field);
                            }
                            "score" => selection.projection.score = Some(edge_alias),
                            "cursor" => {}
                            name if is_introspection(name) => {}
                            name => {
                                return Err(SchemaError::FieldNotFound {
                                    entity: format!("{owner}Edge"),
                                    field: name.to_string(),
                                }
                                .into());
                            }
                        }
                    }
                }
                "totalCount" => selection.projection.total_count = Some(alias),
                // Page info is derived from the total count.
                "pageInfo" => {}
                name if is_introspection(name) => {}
                name => {
                    return Err(SchemaError::FieldNotFound {
                        entity: owner.to_string(),
                        field: name.to_string(),
                    }
                    .into());
                }
            }
        }
        if tree.has_field("pageInfo") && selection.projection.total_count.is_none() {
            selection.projection.total_count = Some("totalCount".to_string());
        }
        Ok(selection)
    }
}

/// Builds connections: root and nested `xConnection` fields, and the
/// fulltext and vector query fields, which return connections with a score.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionFactory<'a> {
    scope: FactoryScope<'a>,
}

impl<'a> ConnectionFactory<'a> {
    /// Creates a factory.
    #[must_use]
    pub fn new(scope: FactoryScope<'a>) -> Self {
        Self { scope }
    }

    /// `moviesConnection(where, sort, first, after) { ... }`
    pub fn create_connection(&self, entity: &'a Entity, tree: &ResolveTree) -> Result<Operation<'a>> {
        let paging = SortAndPaginationFactory::new(self.scope);
        let sort = paging.create_connection_sort(entity, None, tree, false)?;
        let pagination = paging.create_connection_pagination(entity, tree)?;
        let selection = ConnectionSelection::parse(tree, &format!("{}Connection", entity.plural()))?;
        let mut connection_branches = Vec::new();
        for branch in branches(self.scope, entity, tree.arg("where"))? {
            let selected = Selection::Node(NodeSelection::of(branch.target));
            connection_branches.push(self.branch(entity, branch, &selection, None, selected)?);
        }
        Ok(self.assemble(entity, connection_branches, sort, pagination, selection.projection))
    }

    /// `actorsConnection(where, sort, first, after) { ... }` on a node.
    pub fn create_nested_connection(&self, relationship: &'a Relationship, tree: &ResolveTree) -> Result<Operation<'a>> {
        let target = self.scope.schema.target_of(relationship)?;
        let properties = self.scope.schema.edge_properties(relationship);
        let selection = ConnectionSelection::parse(tree, &relationship.connection_field_name())?;
        if selection.properties.is_some() && properties.is_none() {
            return Err(SchemaError::FieldNotFound {
                entity: relationship.connection_field_name(),
                field: "properties".to_string(),
            }
            .into());
        }

        let paging = SortAndPaginationFactory::new(self.scope);
        let sort = paging.create_connection_sort(target, properties, tree, false)?;
        let pagination = if relationship.is_list {
            paging.create_connection_pagination(target, tree)?
        } else {
            Pagination::default()
        };

        let filters = FilterFactory::new(self.scope);
        let mut connection_branches = Vec::new();
        for target_entity in self.scope.schema.concrete_entities(target) {
            let branch = Branch {
                member: self.scope.entity_of(target_entity)?,
                target: target_entity,
                filters: filters.create_connection_filters(relationship, tree.arg("where"))?,
            };
            let selected = Selection::Relationship(RelationshipSelection {
                relationship,
                target_labels: concrete_labels(target_entity),
                optional: false,
            });
            connection_branches.push(self.branch(target, branch, &selection, properties, selected)?);
        }
        Ok(self.assemble(target, connection_branches, sort, pagination, selection.projection))
    }

    /// A `@fulltext` query field: `moviesByTitle(phrase, where, sort, first, after)`.
    pub fn create_fulltext(
        &self,
        entity: &'a Entity,
        index: &'a FulltextIndex,
        tree: &ResolveTree,
    ) -> Result<Operation<'a>> {
        let phrase = tree
            .arg("phrase")
            .cloned()
            .ok_or_else(|| InputError::invalid_argument("phrase", "is required"))?;
        let target = as_concrete(entity)?;
        let selection = Selection::Fulltext(FulltextSelection {
            index,
            phrase,
            labels: concrete_labels(target),
        });
        self.scored(entity, target, tree, &index.query_name, selection)
    }

    /// A `@vector` query field: `similarMovies(vector, where, sort, first, after)`.
    pub fn create_vector(&self, entity: &'a Entity, index: &'a VectorIndex, tree: &ResolveTree) -> Result<Operation<'a>> {
        let vector = tree
            .arg("vector")
            .cloned()
            .ok_or_else(|| InputError::invalid_argument("vector", "is required"))?;
        let neighbours = match tree.arg("first") {
            Some(first) => first
                .as_i64()
                .filter(|n| *n > 0)
                .ok_or_else(|| InputError::invalid_argument("first", "expected a positive integer"))?,
            None => DEFAULT_NEIGHBOURS,
        };
        let target = as_concrete(entity)?;
        let selection = Selection::Vector(VectorSelection {
            index,
            vector,
            neighbours,
            labels: concrete_labels(target),
        });
        self.scored(entity, target, tree, &index.query_name, selection)
    }

    /// Shared by the index query fields: `where` is `{ node: {...} }` and
    /// `score` is sortable.
    fn scored(
        &self,
        entity: &'a Entity,
        target: &'a ConcreteEntity,
        tree: &ResolveTree,
        owner: &str,
        selection: Selection<'a>,
    ) -> Result<Operation<'a>> {
        let paging = SortAndPaginationFactory::new(self.scope);
        let sort = paging.create_connection_sort(entity, None, tree, true)?;
        let pagination = paging.create_connection_pagination(entity, tree)?;
        let parsed = ConnectionSelection::parse(tree, owner)?;

        let branch = Branch {
            member: entity,
            target,
            filters: self.index_filters(entity, tree.arg("where"))?,
        };
        let connection_branch = self.branch(entity, branch, &parsed, None, selection)?;
        Ok(self.assemble(entity, vec![connection_branch], sort, pagination, parsed.projection))
    }

    fn index_filters(&self, entity: &'a Entity, where_: Option<&Value>) -> Result<Vec<Filter<'a>>> {
        let Some(where_) = where_ else {
            return Ok(Vec::new());
        };
        let mut filters = Vec::new();
        for (key, value) in as_where("where", where_)? {
            match key.as_str() {
                "node" => filters.extend(FilterFactory::new(self.scope).create_node_filters(entity, Some(value))?),
                _ => return Err(InputError::invalid_where(key.as_str(), "expected `node`").into()),
            }
        }
        Ok(filters)
    }

    fn branch(
        &self,
        entity: &'a Entity,
        branch: Branch<'a>,
        selection: &ConnectionSelection,
        properties: Option<&'a RelationshipProperties>,
        selected: Selection<'a>,
    ) -> Result<ConnectionBranch<'a>> {
        let Branch { member, target, mut filters } = branch;
        let fields = FieldFactory::new(self.scope);
        let node_fields = match &selection.node {
            Some(node) => fields.create_fields(
                &lookup_order(entity, member),
                &node.fields_for(&[entity.name(), member.name()]),
            )?,
            None => Vec::new(),
        };
        let edge_fields = match (&selection.properties, properties) {
            (Some(tree), Some(properties)) => fields.create_edge_fields(properties, &tree.merged_fields())?,
            _ => Vec::new(),
        };

        let auth = AuthorizationFactory::new(self.scope);
        let operations = [AuthorizationOperation::Read];
        if entity.name() != member.name() {
            filters.extend(auth.create_entity_auth_filters(entity, &operations)?);
        }
        filters.extend(auth.create_entity_auth_filters(member, &operations)?);
        filters.extend(auth.create_attribute_auth_filters(member, &read_attributes(&node_fields), &operations)?);

        Ok(ConnectionBranch {
            target,
            selection: selected,
            filters,
            node_fields,
            edge_fields,
        })
    }

    fn assemble(
        &self,
        entity: &'a Entity,
        mut connection_branches: Vec<ConnectionBranch<'a>>,
        sort: Vec<Sort<'a>>,
        pagination: Pagination,
        projection: ConnectionProjection,
    ) -> Operation<'a> {
        if !entity.is_abstract()
            && let Some(branch) = connection_branches.pop()
        {
            return Operation::Connection(ConnectionOperation {
                target: branch.target,
                selection: branch.selection,
                filters: branch.filters,
                node_fields: branch.node_fields,
                edge_fields: branch.edge_fields,
                sort,
                pagination,
                projection,
            });
        }
        Operation::CompositeConnection(CompositeConnectionOperation {
            entity: entity.name(),
            branches: connection_branches,
            sort,
            pagination,
            projection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::factory::operations::fixture;
    use crate::query_ast::pagination::offset_to_cursor;
    use cyphergen_common::utils::error::Error;
    use serde_json::json;

    fn edges(node: impl IntoIterator<Item = ResolveTree>, extra: impl IntoIterator<Item = ResolveTree>) -> ResolveTree {
        ResolveTree::new("edges").with_fields(
            "Edge",
            std::iter::once(ResolveTree::new("node").with_fields("Movie", node)).chain(extra),
        )
    }

    #[test]
    fn test_root_connection_projection() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = ConnectionFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap();
        let tree = ResolveTree::new("moviesConnection")
            .with_arg("first", 10)
            .with_arg("after", offset_to_cursor(4))
            .with_fields(
                "MoviesConnection",
                [
                    edges([ResolveTree::new("title")], [ResolveTree::new("cursor")]),
                    ResolveTree::new("pageInfo"),
                ],
            );
        let Operation::Connection(connection) = factory.create_connection(movie, &tree).unwrap() else {
            panic!("expected a connection");
        };
        assert_eq!(connection.projection.edges.as_deref(), Some("edges"));
        assert_eq!(connection.projection.node.as_deref(), Some("node"));
        assert_eq!(connection.projection.total_count.as_deref(), Some("totalCount"));
        assert_eq!(connection.node_fields.len(), 1);
        assert_eq!(connection.pagination.skip, Some(5));
        assert_eq!(connection.pagination.limit, Some(10));
    }

    #[test]
    fn test_nested_connection_with_edge_properties() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = ConnectionFactory::new(FactoryScope::new(&schema, &context));
        let actor = schema.entity("Actor").unwrap();
        let movies = actor.find_relationship("movies").unwrap();
        let tree = ResolveTree::new("moviesConnection")
            .with_arg("where", Value::from(json!({"edge": {"role": "Neil"}})))
            .with_arg("sort", Value::from(json!([{"edge": {"screenTime": "DESC"}}])))
            .with_fields(
                "ActorMoviesConnection",
                [edges(
                    [ResolveTree::new("title")],
                    [ResolveTree::new("properties").with_fields("ActedIn", [ResolveTree::new("role")])],
                )],
            );
        let Operation::Connection(connection) = factory.create_nested_connection(movies, &tree).unwrap() else {
            panic!("expected a connection");
        };
        assert!(matches!(connection.selection, Selection::Relationship(_)));
        assert_eq!(connection.edge_fields.len(), 1);
        assert_eq!(connection.filters.len(), 1);
        assert_eq!(connection.sort.len(), 1);
        assert!(connection.projection.total_count.is_none());
    }

    #[test]
    fn test_properties_without_edge_type() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = ConnectionFactory::new(FactoryScope::new(&schema, &context));
        let actor = schema.entity("Actor").unwrap();
        let productions = actor.find_relationship("productions").unwrap();
        let tree = ResolveTree::new("productionsConnection").with_fields(
            "ActorProductionsConnection",
            [ResolveTree::new("edges").with_fields("Edge", [ResolveTree::new("properties")])],
        );
        let err = factory.create_nested_connection(productions, &tree).unwrap_err();
        assert_eq!(
            err,
            SchemaError::FieldNotFound {
                entity: "productionsConnection".into(),
                field: "properties".into()
            }
            .into()
        );
    }

    #[test]
    fn test_interface_connection_is_composite() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = ConnectionFactory::new(FactoryScope::new(&schema, &context));
        let actor = schema.entity("Actor").unwrap();
        let productions = actor.find_relationship("productions").unwrap();
        let tree = ResolveTree::new("productionsConnection")
            .with_fields("ActorProductionsConnection", [ResolveTree::new("totalCount")]);
        let Operation::CompositeConnection(connection) = factory.create_nested_connection(productions, &tree).unwrap()
        else {
            panic!("expected a composite connection");
        };
        assert_eq!(connection.branches.len(), 2);
        assert!(connection.projection.edges.is_none());
    }

    #[test]
    fn test_fulltext_requires_phrase() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = ConnectionFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap();
        let index = &movie.annotations().fulltext[0];

        let err = factory.create_fulltext(movie, index, &ResolveTree::new("moviesByTitle")).unwrap_err();
        assert!(matches!(err, Error::Input(InputError::InvalidArgument { .. })));

        let tree = ResolveTree::new("moviesByTitle")
            .with_arg("phrase", "matrix")
            .with_arg("where", Value::from(json!({"node": {"runtime_GT": 100}})))
            .with_arg("sort", Value::from(json!([{"score": "DESC"}])))
            .with_fields("MoviesByTitleConnection", [edges([ResolveTree::new("title")], [ResolveTree::new("score")])]);
        let Operation::Connection(connection) = factory.create_fulltext(movie, index, &tree).unwrap() else {
            panic!("expected a connection");
        };
        assert!(matches!(connection.selection, Selection::Fulltext(_)));
        assert!(matches!(connection.sort[0], Sort::Score(_)));
        assert_eq!(connection.projection.score.as_deref(), Some("score"));
        assert_eq!(connection.filters.len(), 1);
    }

    #[test]
    fn test_vector_neighbours() {
        let schema = fixture::schema();
        let context = TranslationContext::default();
        let factory = ConnectionFactory::new(FactoryScope::new(&schema, &context));
        let movie = schema.entity("Movie").unwrap();
        let index = &movie.annotations().vector[0];
        let tree = ResolveTree::new("similarMovies")
            .with_arg("vector", Value::from(json!([0.1, 0.2])))
            .with_fields("SimilarMoviesConnection", [ResolveTree::new("totalCount")]);
        let Operation::Connection(connection) = factory.create_vector(movie, index, &tree).unwrap() else {
            panic!("expected a connection");
        };
        let Selection::Vector(selection) = &connection.selection else {
            panic!("expected a vector selection");
        };
        assert_eq!(selection.neighbours, DEFAULT_NEIGHBOURS);
    }
}
