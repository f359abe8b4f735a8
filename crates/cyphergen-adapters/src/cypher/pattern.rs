//! Graph patterns like `(a:Actor)-[r:ACTED_IN]->(m:Movie)`.

use smallvec::SmallVec;

use super::variable::Variable;

/// Direction of a relationship in a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `-[]->`
    Outgoing,
    /// `<-[]-`
    Incoming,
    /// `-[]-`
    Undirected,
}

/// Label expression on a node pattern or label check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Labels {
    /// No label constraint.
    #[default]
    None,
    /// Every label must be present: `:Actor:Person`.
    All(SmallVec<[String; 2]>),
    /// Any one label suffices: `:Movie|Series`.
    Any(Vec<String>),
}

impl Labels {
    /// Conjunction of the given labels.
    pub fn all<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: SmallVec<[String; 2]> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            Labels::None
        } else {
            Labels::All(labels)
        }
    }

    /// Disjunction of the given labels. A single label collapses to [`Labels::All`].
    pub fn any<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        match labels.len() {
            0 => Labels::None,
            1 => Labels::All(SmallVec::from_iter(labels.pop())),
            _ => Labels::Any(labels),
        }
    }

    /// Returns `true` if there is no constraint.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Labels::None)
    }
}

/// A node pattern: `(this0:Movie)`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    /// Bound variable, if any.
    pub variable: Option<Variable>,
    /// Label constraint.
    pub labels: Labels,
}

impl NodePattern {
    /// A node pattern binding `variable` with the given labels.
    #[must_use]
    pub fn new(variable: Variable, labels: Labels) -> Self {
        Self {
            variable: Some(variable),
            labels,
        }
    }

    /// A node pattern that only references an already bound variable.
    #[must_use]
    pub fn bound(variable: &Variable) -> Self {
        Self {
            variable: Some(variable.clone()),
            labels: Labels::None,
        }
    }
}

/// A relationship pattern: `-[this1:ACTED_IN]->`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPattern {
    /// Bound variable, if any.
    pub variable: Option<Variable>,
    /// Relationship types (alternatives).
    pub types: SmallVec<[String; 1]>,
    /// Direction relative to the preceding node.
    pub direction: Direction,
}

impl RelationshipPattern {
    /// Creates a relationship pattern.
    pub fn new(variable: Option<Variable>, rel_type: impl Into<String>, direction: Direction) -> Self {
        let mut types = SmallVec::new();
        types.push(rel_type.into());
        Self {
            variable,
            types,
            direction,
        }
    }
}

/// A path pattern: a start node followed by relationship/node hops.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    /// The first node.
    pub start: NodePattern,
    /// Subsequent hops.
    pub hops: Vec<(RelationshipPattern, NodePattern)>,
}

impl Pattern {
    /// A single-node pattern.
    #[must_use]
    pub fn node(start: NodePattern) -> Self {
        Self {
            start,
            hops: Vec::new(),
        }
    }

    /// Appends a hop.
    #[must_use]
    pub fn related(mut self, relationship: RelationshipPattern, node: NodePattern) -> Self {
        self.hops.push((relationship, node));
        self
    }
}
