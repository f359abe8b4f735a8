use cyphergen_common::types::Value;
use cyphergen_common::utils::error::Result;
use cyphergen_core::resolve_tree::ResolveTree;
use cyphergen_core::schema::{Attribute, AuthorizationOperation, CypherAnnotation, Entity, Relationship};
use indexmap::IndexMap;

use super::{Branch, branches, lookup_order, read_attributes};
use crate::factory::{AuthorizationFactory, FactoryScope, FieldFactory, SortAndPaginationFactory, concrete_labels};
use crate::query_ast::filters::{Filter, TypenameFilter};
use crate::query_ast::operations::{CompositeReadOperation, Operation, ReadOperation};
use crate::query_ast::pagination::Pagination;
use crate::query_ast::selection::{CypherSelection, NodeSelection, RelationshipSelection, Selection};

/// Arguments of a `@cypher` field consumed by the read rather than passed to
/// the statement.
const READ_ARGUMENTS: [&str; 5] = ["where", "options", "sort", "limit", "offset"];

/// Builds reads: root list fields, relationship fields and `@cypher` fields
/// returning nodes.
#[derive(Debug, Clone, Copy)]
pub struct ReadFactory<'a> {
    scope: FactoryScope<'a>,
}

impl<'a> ReadFactory<'a> {
    /// Creates a factory.
    #[must_use]
    pub fn new(scope: FactoryScope<'a>) -> Self {
        Self { scope }
    }

    /// `movies(where, sort, limit, offset) { ... }`
    pub fn create_read(&self, entity: &'a Entity, tree: &ResolveTree) -> Result<Operation<'a>> {
        self.read(entity, tree, true, |branch| {
            Selection::Node(NodeSelection::of(branch.target))
        })
    }

    /// A relationship field such as `movies { title }` on an actor.
    pub fn create_nested_read(&self, relationship: &'a Relationship, tree: &ResolveTree) -> Result<Operation<'a>> {
        let target = self.scope.schema.target_of(relationship)?;
        self.read(target, tree, relationship.is_list, |branch| {
            Selection::Relationship(RelationshipSelection {
                relationship,
                target_labels: concrete_labels(branch.target),
                optional: false,
            })
        })
    }

    /// A `@cypher` field whose statement returns nodes of `entity`.
    ///
    /// Abstract results are split per concrete entity by label, since the
    /// statement may return nodes of any implementation.
    pub fn create_cypher_read(
        &self,
        attribute: &'a Attribute,
        annotation: &'a CypherAnnotation,
        entity: &'a Entity,
        tree: &ResolveTree,
    ) -> Result<Operation<'a>> {
        let arguments: IndexMap<String, Value> = tree
            .args
            .iter()
            .filter(|(name, _)| !READ_ARGUMENTS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let is_abstract = entity.is_abstract();
        let mut operation = self.read(entity, tree, attribute.attribute_type.is_list(), |_| {
            Selection::Cypher(CypherSelection {
                annotation,
                arguments: arguments.clone(),
            })
        })?;
        if is_abstract && let Operation::CompositeRead(composite) = &mut operation {
            for branch in &mut composite.branches {
                branch.filters.insert(
                    0,
                    Filter::Typename(TypenameFilter {
                        accepted: vec![concrete_labels(branch.target)],
                    }),
                );
            }
        }
        Ok(operation)
    }

    fn read(
        &self,
        entity: &'a Entity,
        tree: &ResolveTree,
        is_list: bool,
        selection: impl Fn(&Branch<'a>) -> Selection<'a>,
    ) -> Result<Operation<'a>> {
        let paging = SortAndPaginationFactory::new(self.scope);
        let (sort, pagination) = if is_list {
            (paging.create_sort(entity, tree)?, paging.create_pagination(entity, tree)?)
        } else {
            (Vec::new(), Pagination::default())
        };

        let mut reads = Vec::new();
        for branch in branches(self.scope, entity, tree.arg("where"))? {
            let selection = selection(&branch);
            reads.push(self.branch(entity, branch, tree, selection)?);
        }

        if !entity.is_abstract()
            && let Some(mut read) = reads.pop()
        {
            read.sort = sort;
            read.pagination = pagination;
            read.is_list = is_list;
            return Ok(Operation::Read(read));
        }
        Ok(Operation::CompositeRead(CompositeReadOperation {
            entity: entity.name(),
            branches: reads,
            sort,
            pagination,
            is_list,
        }))
    }

    fn branch(
        &self,
        entity: &'a Entity,
        branch: Branch<'a>,
        tree: &ResolveTree,
        selection: Selection<'a>,
    ) -> Result<ReadOperation<'a>> {
        let Branch { member, target, mut filters } = branch;
        let selected = tree.fields_for(&[entity.name(), member.name()]);
        let fields = FieldFactory::new(self.scope).create_fields(&lookup_order(entity, member), &selected)?;

        let auth = AuthorizationFactory::new(self.scope);
        let operations = [AuthorizationOperation::Read];
        if entity.name() != member.name() {
            filters.extend(auth.create_entity_auth_filters(entity, &operations)?);
        }
        filters.extend(auth.create_entity_auth_filters(member, &operations)?);
        filters.extend(auth.create_attribute_auth_filters(member, &read_attributes(&fields), &operations)?);

        Ok(ReadOperation {
            target,
            selection,
            fields,
            filters,
            sort: Vec::new(),
            pagination: Pagination::default(),
            is_list: true,
        })
    }
}
