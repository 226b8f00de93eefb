use crate::terms::TermCodec;
use rdf_mapper_common::error::ContractError;
use rdf_mapper_model::{NamedNode, Variable};
use rdf_mapper_schema::{Propagation, ResolvedProperty, Schema};
use spargebra::algebra::GraphPattern;
use spargebra::term::{
    GraphNamePattern, GroundQuadPattern, GroundTermPattern, NamedNodePattern, TermPattern,
    TriplePattern,
};
use spargebra::{GraphUpdateOperation, Update};

/// The deletion of a record together with everything that depends on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadePlan {
    /// The edges to delete, instantiated for every solution of [Self::pattern].
    pub delete: Vec<GroundQuadPattern>,
    /// Finds the deleted record and, optionally, every dependent record.
    pub pattern: GraphPattern,
}

impl CascadePlan {
    /// The plan as a single `DELETE ... WHERE ...` update.
    pub fn to_update(&self) -> Update {
        Update {
            base_iri: None,
            operations: vec![GraphUpdateOperation::DeleteInsert {
                delete: self.delete.clone(),
                insert: Vec::new(),
                using: None,
                pattern: Box::new(self.pattern.clone()),
            }],
        }
    }
}

/// A node of the cascade: the deleted record or a dependent record bound to a variable.
#[derive(Debug, Clone)]
enum Node {
    Root(NamedNode),
    Bound(Variable),
}

impl Node {
    fn term(&self) -> TermPattern {
        match self {
            Node::Root(node) => node.clone().into(),
            Node::Bound(variable) => variable.clone().into(),
        }
    }

    fn ground(&self) -> GroundTermPattern {
        match self {
            Node::Root(node) => GroundTermPattern::NamedNode(node.clone()),
            Node::Bound(variable) => GroundTermPattern::Variable(variable.clone()),
        }
    }
}

/// Plans cascading deletes.
///
/// Every propagating relation adds an `OPTIONAL` branch, so that a record without dependents
/// can still be deleted. The recursion does not enter a type that was already visited on the
/// current path, which stops self-references as well as longer cycles.
#[derive(Debug, Clone, Copy)]
pub struct CascadePlanner<'schema> {
    schema: &'schema Schema,
    codec: TermCodec<'schema>,
}

impl<'schema> CascadePlanner<'schema> {
    pub fn new(schema: &'schema Schema) -> Self {
        Self {
            schema,
            codec: TermCodec::new(schema.mapping()),
        }
    }

    /// Plans the deletion of the record `id` of `type_name`.
    pub fn plan(&self, type_name: &str, id: &str) -> Result<CascadePlan, ContractError> {
        let root = Node::Root(self.codec.identifier(type_name, id));
        let mut state = PlanState::default();
        let pattern = self.node(&root, type_name, &mut vec![type_name.to_owned()], &mut state)?;
        tracing::debug!(
            type_name,
            id,
            dependents = state.nodes - 1,
            edges = state.delete.len(),
            "Planned cascade delete"
        );
        Ok(CascadePlan {
            delete: state.delete,
            pattern,
        })
    }

    /// Deletes the outgoing edges of `node` and plans the branches of its propagating
    /// properties.
    fn node(
        &self,
        node: &Node,
        type_name: &str,
        visited: &mut Vec<String>,
        state: &mut PlanState,
    ) -> Result<GraphPattern, ContractError> {
        let descriptor = self.schema.type_descriptor(type_name)?;
        let index = state.next_node();
        let predicate = Variable::new_unchecked(format!("_p{index}"));
        let object = Variable::new_unchecked(format!("_o{index}"));
        state.delete.push(GroundQuadPattern {
            subject: node.ground(),
            predicate: predicate.clone().into(),
            object: GroundTermPattern::Variable(object.clone()),
            graph_name: GraphNamePattern::DefaultGraph,
        });
        let mut pattern = GraphPattern::Bgp {
            patterns: vec![TriplePattern {
                subject: node.term(),
                predicate: predicate.into(),
                object: object.into(),
            }],
        };

        for property in descriptor.all_properties() {
            if property.propagation().is_none() {
                continue;
            }
            let Some(branch) = self.branch(node, property, visited, state)? else {
                continue;
            };
            pattern = GraphPattern::LeftJoin {
                left: Box::new(pattern),
                right: Box::new(branch),
                expression: None,
            };
        }
        Ok(pattern)
    }

    fn branch(
        &self,
        anchor: &Node,
        property: ResolvedProperty<'_>,
        visited: &mut Vec<String>,
        state: &mut PlanState,
    ) -> Result<Option<GraphPattern>, ContractError> {
        let Some(target_type) = property.target_type() else {
            return Ok(None);
        };
        let target = Node::Bound(Variable::new_unchecked(format!("_t{}", state.targets)));
        state.targets += 1;
        let edge = edge(anchor, property, &target);

        let pattern = match property.propagation() {
            Propagation::None => return Ok(None),
            Propagation::Delete if visited.iter().any(|visited| visited == target_type) => {
                tracing::trace!(
                    property = property.name(),
                    target_type,
                    "Not descending into an already visited type"
                );
                state.delete.push(ground_edge(anchor, property, &target));
                GraphPattern::Bgp {
                    patterns: vec![edge],
                }
            }
            Propagation::Delete => {
                visited.push(target_type.to_owned());
                let nested = self.node(&target, target_type, visited, state);
                visited.pop();
                GraphPattern::Join {
                    left: Box::new(GraphPattern::Bgp {
                        patterns: vec![edge],
                    }),
                    right: Box::new(nested?),
                }
            }
            Propagation::Unset(back) => {
                let back_iri = self
                    .schema
                    .type_descriptor(target_type)?
                    .property(back)
                    .and_then(|property| property.as_forward())
                    .map(|property| property.iri().clone())
                    .ok_or_else(|| ContractError::UnknownProperty {
                        type_name: target_type.to_owned(),
                        path: back.clone(),
                    })?;
                state.delete.push(GroundQuadPattern {
                    subject: target.ground(),
                    predicate: NamedNodePattern::NamedNode(back_iri),
                    object: anchor.ground(),
                    graph_name: GraphNamePattern::DefaultGraph,
                });
                GraphPattern::Bgp {
                    patterns: vec![edge],
                }
            }
        };
        Ok(Some(pattern))
    }
}

#[derive(Debug, Default)]
struct PlanState {
    delete: Vec<GroundQuadPattern>,
    nodes: usize,
    targets: usize,
}

impl PlanState {
    fn next_node(&mut self) -> usize {
        let index = self.nodes;
        self.nodes += 1;
        index
    }
}

/// The edge of `property` between `anchor` and `target`, read backwards for inverse
/// relationships.
fn edge(anchor: &Node, property: ResolvedProperty<'_>, target: &Node) -> TriplePattern {
    let predicate = NamedNodePattern::NamedNode(property.iri().clone());
    if property.is_inverse() {
        TriplePattern {
            subject: target.term(),
            predicate,
            object: anchor.term(),
        }
    } else {
        TriplePattern {
            subject: anchor.term(),
            predicate,
            object: target.term(),
        }
    }
}

fn ground_edge(anchor: &Node, property: ResolvedProperty<'_>, target: &Node) -> GroundQuadPattern {
    let (subject, object) = if property.is_inverse() {
        (target.ground(), anchor.ground())
    } else {
        (anchor.ground(), target.ground())
    };
    GroundQuadPattern {
        subject,
        predicate: NamedNodePattern::NamedNode(property.iri().clone()),
        object,
        graph_name: GraphNamePattern::DefaultGraph,
    }
}
