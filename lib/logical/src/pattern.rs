use crate::variables::{path_variable, subject};
use rdf_mapper_query::{Direction, FieldPath, Segment};
use spargebra::algebra::{Expression, GraphPattern};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern, Variable};

/// Expands the segments of a path into a chain of triple patterns starting at `?_subject`.
///
/// Every intermediate node is bound to the variable of the path prefix, qualified with `scope`.
/// If `end` is given, it replaces the variable of the last node. Returns the triples and the
/// term of the last node.
pub fn path_chain(
    segments: &[Segment],
    scope: &str,
    end: Option<TermPattern>,
) -> (Vec<TriplePattern>, TermPattern) {
    let mut previous = TermPattern::Variable(subject());
    let mut triples = Vec::with_capacity(segments.len());
    let mut end = end;
    for (index, segment) in segments.iter().enumerate() {
        let next = match end.take() {
            Some(end) if index + 1 == segments.len() => end,
            other => {
                end = other;
                TermPattern::Variable(end_variable(&segments[..=index], scope))
            }
        };
        triples.push(edge(&previous, segment, &next));
        previous = next;
    }
    (triples, previous)
}

/// The variable [path_chain] binds to the last node of `segments`.
pub fn end_variable(segments: &[Segment], scope: &str) -> Variable {
    if segments.is_empty() {
        return subject();
    }
    path_variable(scope, segments.iter().map(|segment| segment.name.as_str()))
}

/// The triple pattern of walking `segment` from `from` to `to`.
pub fn edge(from: &TermPattern, segment: &Segment, to: &TermPattern) -> TriplePattern {
    let predicate = NamedNodePattern::NamedNode(segment.iri.clone());
    match segment.direction {
        Direction::Forward => TriplePattern {
            subject: from.clone(),
            predicate,
            object: to.clone(),
        },
        Direction::Inverse => TriplePattern {
            subject: to.clone(),
            predicate,
            object: from.clone(),
        },
    }
}

/// Collects the parts of a `WHERE` clause: required triples, optional groups and filter
/// expressions.
#[derive(Debug, Default)]
pub struct PatternBuilder {
    required: Vec<TriplePattern>,
    optional: Vec<Vec<TriplePattern>>,
    filters: Vec<Expression>,
    scopes: usize,
}

impl PatternBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds triples every solution must match. Duplicates are ignored.
    pub fn require(&mut self, triples: impl IntoIterator<Item = TriplePattern>) {
        for triple in triples {
            if !self.required.contains(&triple) {
                self.required.push(triple);
            }
        }
    }

    /// Binds the node at the end of `path` in the required part and returns its variable.
    pub fn require_path(&mut self, path: &FieldPath) -> Variable {
        let (triples, _) = path_chain(path.segments(), "", None);
        self.require(triples);
        end_variable(path.segments(), "")
    }

    /// Binds the node at the end of `path` without restricting the solutions. Reuses the
    /// required binding if the path is already bound.
    pub fn optional_path(&mut self, path: &FieldPath) -> Variable {
        let (triples, _) = path_chain(path.segments(), "", None);
        let missing = triples
            .into_iter()
            .filter(|triple| !self.required.contains(triple))
            .collect::<Vec<_>>();
        if !missing.is_empty() && !self.optional.contains(&missing) {
            self.optional.push(missing);
        }
        end_variable(path.segments(), "")
    }

    pub fn filter(&mut self, expression: Expression) {
        self.filters.push(expression);
    }

    /// Returns a fresh prefix for the variables of an `EXISTS` pattern, so that the pattern
    /// does not join with the bindings of the outer pattern.
    pub fn new_scope(&mut self) -> String {
        let scope = format!("_e{}_", self.scopes);
        self.scopes += 1;
        scope
    }

    /// Assembles `FILTER(Bgp OPTIONAL {...} ...)`.
    pub fn build(self) -> GraphPattern {
        let mut pattern = GraphPattern::Bgp {
            patterns: self.required,
        };
        for group in self.optional {
            pattern = GraphPattern::LeftJoin {
                left: Box::new(pattern),
                right: Box::new(GraphPattern::Bgp { patterns: group }),
                expression: None,
            };
        }
        match conjunction(self.filters) {
            Some(expr) => GraphPattern::Filter {
                expr,
                inner: Box::new(pattern),
            },
            None => pattern,
        }
    }
}

/// Combines expressions with `&&`.
pub fn conjunction(expressions: impl IntoIterator<Item = Expression>) -> Option<Expression> {
    expressions
        .into_iter()
        .reduce(|lhs, rhs| Expression::And(Box::new(lhs), Box::new(rhs)))
}
