//! Reads over interfaces and unions: one `UNION` branch per implementation,
//! sorted and paginated after the union.

use cyphergen_adapters::cypher::{
    CallImports, Clause, Expr, MapItem, Projection, ReturnClause, UnionClause, UnwindClause,
    Variable, WithClause,
};
use cyphergen_common::utils::error::Result;
use cyphergen_core::schema::ConcreteEntity;

use super::connection::{ConnectionProjection, EDGE, EDGES, TOTAL_COUNT};
use super::read::{RESOLVE_TYPE_KEY, ReadOperation, push_unique};
use super::{
    OperationTranspileResult, collect_result, explain_sort, match_filtered, pagination_props,
};
use crate::query_ast::context::QueryAstContext;
use crate::query_ast::fields::{Field, transpile_fields};
use crate::query_ast::filters::Filter;
use crate::query_ast::pagination::Pagination;
use crate::query_ast::selection::Selection;
use crate::query_ast::sort::{PropertySort, Sort};
use crate::query_ast::{ExplainNode, PropertyTarget};

/// Reads every implementation of an interface or member of a union.
#[derive(Debug)]
pub struct CompositeReadOperation<'a> {
    /// Name of the abstract entity.
    pub entity: &'a str,
    /// One read per concrete entity.
    pub branches: Vec<ReadOperation<'a>>,
    /// `ORDER BY` over the projected maps.
    pub sort: Vec<Sort<'a>>,
    /// `SKIP` and `LIMIT` over the union.
    pub pagination: Pagination,
    /// Nested reads collect a list rather than a single node.
    pub is_list: bool,
}

impl CompositeReadOperation<'_> {
    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        let result = ctx.env().var();
        let mut branches = Vec::with_capacity(self.branches.len());
        for branch in &self.branches {
            branches.push(branch.transpile_branch(ctx, &self.sort, &result)?);
        }
        let mut clauses = vec![Clause::call(
            CallImports::None,
            vec![Clause::Union(UnionClause {
                all: false,
                branches,
            })],
        )];

        if !self.sort.is_empty() || !self.pagination.is_empty() {
            let mut with = WithClause::vars([&result]);
            for item in &self.sort {
                with.order_by
                    .extend(item.get_projection_sort_fields(&result.expr(), None)?);
            }
            let (skip, limit) = self.pagination.get_pagination(ctx);
            with.skip = skip;
            with.limit = limit;
            clauses.push(Clause::With(with));
        }

        let projection = if ctx.has_target() {
            collect_result(&result, self.is_list)
        } else {
            result.expr()
        };
        clauses.push(Clause::Return(ReturnClause::aliased(projection, &result)));
        Ok(OperationTranspileResult {
            clauses,
            projection_expr: result.expr(),
        })
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        let node = ExplainNode::new("CompositeReadOperation").prop("entity", self.entity);
        pagination_props(node, &self.pagination)
            .inputs(explain_sort(&self.sort))
            .inputs(self.branches.iter().map(ReadOperation::explain))
    }
}

/// One implementation inside a composite connection.
#[derive(Debug)]
pub struct ConnectionBranch<'a> {
    /// The concrete entity.
    pub target: &'a ConcreteEntity,
    /// How its nodes are matched.
    pub selection: Selection<'a>,
    /// `where` and authorization filters.
    pub filters: Vec<Filter<'a>>,
    /// Fields under `edges.node`.
    pub node_fields: Vec<Field<'a>>,
    /// Fields under `edges.properties`.
    pub edge_fields: Vec<Field<'a>>,
}

/// `edges` and `totalCount` over every implementation of an abstract entity.
#[derive(Debug)]
pub struct CompositeConnectionOperation<'a> {
    /// Name of the abstract entity.
    pub entity: &'a str,
    /// One branch per concrete entity.
    pub branches: Vec<ConnectionBranch<'a>>,
    /// `ORDER BY` over the projected edges.
    pub sort: Vec<Sort<'a>>,
    /// `first` and `after`.
    pub pagination: Pagination,
    /// Requested keys.
    pub projection: ConnectionProjection,
}

fn sorts_edge(sort: &[Sort<'_>]) -> bool {
    sort.iter().any(|item| {
        matches!(
            item,
            Sort::Property(PropertySort {
                target: PropertyTarget::Edge,
                ..
            })
        )
    })
}

impl CompositeConnectionOperation<'_> {
    fn node_key(&self) -> &str {
        self.projection.node.as_deref().unwrap_or("node")
    }

    fn properties_key(&self) -> &str {
        self.projection.properties.as_deref().unwrap_or("properties")
    }

    fn transpile_branch(
        &self,
        branch: &ConnectionBranch<'_>,
        ctx: &QueryAstContext<'_>,
        edge: &Variable,
    ) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        if ctx.has_target() {
            clauses.push(Clause::with_star());
        }
        let matched = match_filtered(&branch.selection, &branch.filters, ctx)?;
        let nested = matched.ctx;
        clauses.extend(matched.clauses);
        for item in &self.sort {
            clauses.extend(item.get_subqueries(&nested)?);
        }

        let node = nested.target()?.clone();
        let (subqueries, mut node_items) = transpile_fields(&branch.node_fields, &nested)?;
        clauses.extend(subqueries);
        node_items.push(MapItem::Entry(
            RESOLVE_TYPE_KEY.to_string(),
            Expr::literal(branch.target.name.as_str()),
        ));
        for item in &self.sort {
            if let Some(entry) = item.projection_entry(&nested, PropertyTarget::Node)? {
                push_unique(&mut node_items, entry);
            }
        }
        let mut entries = vec![(
            self.node_key().to_string(),
            Expr::MapProjection {
                subject: node,
                items: node_items,
            },
        )];

        let wants_properties = self.projection.properties.is_some() || sorts_edge(&self.sort);
        if let (true, Some(relationship)) = (wants_properties, nested.relationship()) {
            let edge_ctx = nested.with_target(relationship.clone());
            let (subqueries, mut edge_items) = transpile_fields(&branch.edge_fields, &edge_ctx)?;
            clauses.extend(subqueries);
            for item in &self.sort {
                if let Some(entry) = item.projection_entry(&nested, PropertyTarget::Edge)? {
                    push_unique(&mut edge_items, entry);
                }
            }
            entries.push((
                self.properties_key().to_string(),
                Expr::MapProjection {
                    subject: relationship.clone(),
                    items: edge_items,
                },
            ));
        }

        clauses.push(Clause::With(WithClause::items(vec![Projection::aliased(
            Expr::Map(entries),
            edge,
        )])));
        clauses.push(Clause::Return(ReturnClause {
            items: vec![Projection::var(edge)],
            ..ReturnClause::default()
        }));
        Ok(clauses)
    }

    pub(crate) fn transpile(&self, ctx: &QueryAstContext<'_>) -> Result<OperationTranspileResult> {
        let edge = Variable::named(EDGE);
        let edges = Variable::named(EDGES);
        let total = Variable::named(TOTAL_COUNT);

        let mut branches = Vec::with_capacity(self.branches.len());
        for branch in &self.branches {
            branches.push(self.transpile_branch(branch, ctx, &edge)?);
        }
        let mut clauses = vec![
            Clause::call(
                CallImports::None,
                vec![Clause::Union(UnionClause {
                    all: false,
                    branches,
                })],
            ),
            Clause::With(WithClause::items(vec![Projection::aliased(
                Expr::collect(&edge),
                &edges,
            )])),
            Clause::With(WithClause::items(vec![
                Projection::var(&edges),
                Projection::aliased(Expr::size(edges.expr()), &total),
            ])),
        ];

        let mut envelope = Vec::new();
        if let Some(alias) = &self.projection.edges {
            if self.sort.is_empty() && self.pagination.is_empty() {
                envelope.push((alias.clone(), edges.expr()));
            } else {
                let page = ctx.env().var();
                let node = edge.property(self.node_key());
                let properties = edge.property(self.properties_key());
                let mut with = WithClause::vars([&edge]);
                for item in &self.sort {
                    with.order_by
                        .extend(item.get_projection_sort_fields(&node, Some(&properties))?);
                }
                let (skip, limit) = self.pagination.get_pagination(ctx);
                with.skip = skip;
                with.limit = limit;
                clauses.push(Clause::call(
                    CallImports::var(&edges),
                    vec![
                        Clause::Unwind(UnwindClause {
                            expr: edges.expr(),
                            alias: edge.clone(),
                        }),
                        Clause::With(with),
                        Clause::Return(ReturnClause::aliased(Expr::collect(&edge), &page)),
                    ],
                ));
                envelope.push((alias.clone(), page.expr()));
            }
        }
        if let Some(alias) = &self.projection.total_count {
            envelope.push((alias.clone(), total.expr()));
        }

        let result = ctx.env().var();
        clauses.push(Clause::Return(ReturnClause::aliased(Expr::Map(envelope), &result)));
        Ok(OperationTranspileResult {
            clauses,
            projection_expr: result.expr(),
        })
    }

    pub(crate) fn explain(&self) -> ExplainNode {
        let node = ExplainNode::new("CompositeConnectionOperation").prop("entity", self.entity);
        pagination_props(node, &self.pagination)
            .inputs(explain_sort(&self.sort))
            .inputs(self.branches.iter().map(|branch| {
                ExplainNode::new("ConnectionBranch")
                    .prop("entity", &branch.target.name)
                    .prop("selection", branch.selection.describe())
                    .inputs(branch.filters.iter().map(Filter::explain))
                    .inputs(branch.node_fields.iter().map(Field::explain))
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TranslationContext;
    use crate::query_ast::QueryAst;
    use crate::query_ast::fields::{AttributeField, AttributeFieldKind};
    use crate::query_ast::operations::Operation;
    use crate::query_ast::selection::NodeSelection;
    use cyphergen_adapters::cypher::SortDirection;
    use cyphergen_core::schema::{Attribute, AttributeType};

    fn branch<'a>(entity: &'a ConcreteEntity) -> ReadOperation<'a> {
        ReadOperation {
            target: entity,
            selection: Selection::Node(NodeSelection::of(entity)),
            fields: vec![Field::Attribute(AttributeField {
                alias: "title".into(),
                attribute: &entity.attributes["title"],
                kind: AttributeFieldKind::Plain,
            })],
            filters: Vec::new(),
            sort: Vec::new(),
            pagination: Pagination::default(),
            is_list: true,
        }
    }

    #[test]
    fn test_composite_read_sorts_after_union() {
        let title = Attribute::new("title", AttributeType::string());
        let movie = ConcreteEntity::new("Movie").attribute(title.clone());
        let series = ConcreteEntity::new("Series").attribute(title.clone());

        let read = CompositeReadOperation {
            entity: "Production",
            branches: vec![branch(&movie), branch(&series)],
            sort: vec![Sort::Property(PropertySort {
                attribute: &title,
                direction: SortDirection::Desc,
                target: PropertyTarget::Node,
            })],
            pagination: Pagination {
                skip: None,
                limit: Some(5),
            },
            is_list: true,
        };

        let result = QueryAst::new(Operation::CompositeRead(read))
            .build(&TranslationContext::default())
            .unwrap();
        assert_eq!(
            result.cypher,
            "CALL {\n    \
                 MATCH (this1:Movie)\n    \
                 WITH this1 {.title, __resolveType: \"Movie\"} AS this1\n    \
                 RETURN this1 AS var0\n    \
                 UNION\n    \
                 MATCH (this2:Series)\n    \
                 WITH this2 {.title, __resolveType: \"Series\"} AS this2\n    \
                 RETURN this2 AS var0\n\
             }\n\
             WITH var0\n\
             ORDER BY var0.title DESC\n\
             LIMIT $param0\n\
             RETURN var0"
        );
    }
}
