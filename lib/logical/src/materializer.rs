use crate::terms::TermCodec;
use crate::variables::{aggregate_variable, count, subject};
use itertools::Itertools;
use rdf_mapper_common::error::ContractError;
use rdf_mapper_common::QuerySolution;
use rdf_mapper_model::vocab::rdf;
use rdf_mapper_model::{
    Document, NamedNodeRef, Reference, SubjectRef, Term, TermRef, Triple, Value,
};
use rdf_mapper_query::{AggregateFunction, AggregateKind, Aggregator, FieldPath, PathTarget};
use rdf_mapper_schema::{ResolvedProperty, Schema, TypeDescriptor};
use std::collections::BTreeMap;

/// The decoded result row of an aggregation. Unbound labels are absent.
pub type AggregateRow = BTreeMap<String, Value>;

/// Reconstructs typed documents from the triples describing them.
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'schema> {
    schema: &'schema Schema,
    codec: TermCodec<'schema>,
}

impl<'schema> Materializer<'schema> {
    pub fn new(schema: &'schema Schema) -> Self {
        Self {
            schema,
            codec: TermCodec::new(schema.mapping()),
        }
    }

    /// Materializes every record of `type_name` described by `triples`, in subject IRI order.
    ///
    /// A record's `_type` is the most specific of its asserted classes. Records that are not of
    /// `type_name` are skipped, as are predicates the schema does not know and values that do not
    /// decode to the declared kind of their property.
    pub fn materialize(
        &self,
        type_name: &str,
        triples: &[Triple],
    ) -> Result<Vec<Document>, ContractError> {
        self.schema.type_descriptor(type_name)?;
        let by_subject = triples
            .iter()
            .filter_map(|triple| match triple.subject.as_ref() {
                SubjectRef::NamedNode(node) => Some((node, triple)),
                _ => None,
            })
            .into_group_map_by(|(node, _)| node.as_str());

        let mut documents = Vec::with_capacity(by_subject.len());
        for (_, edges) in by_subject.into_iter().sorted_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs)) {
            let Some((node, _)) = edges.first() else {
                continue;
            };
            let edges = edges.iter().map(|(_, triple)| *triple).collect::<Vec<_>>();
            if let Some(document) = self.document(type_name, *node, &edges) {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    fn document(
        &self,
        requested: &str,
        node: NamedNodeRef<'_>,
        edges: &[&Triple],
    ) -> Option<Document> {
        let classes = edges
            .iter()
            .filter(|triple| triple.predicate.as_ref() == rdf::TYPE)
            .filter_map(|triple| match triple.object.as_ref() {
                TermRef::NamedNode(class) => self.schema.type_name(class),
                _ => None,
            })
            .collect::<Vec<_>>();
        let type_name = self
            .schema
            .most_specific_type(classes.iter().copied())
            .unwrap_or(requested);
        let descriptor = self.schema.get(type_name)?;
        if !descriptor.is_a(requested) {
            tracing::trace!(%node, type_name, requested, "Skipping record of another type");
            return None;
        }

        let id = self.codec.decode_identifier(type_name, node.into()).ok()?;
        let mut values: BTreeMap<&str, (ResolvedProperty<'_>, Vec<Value>)> = BTreeMap::new();
        for triple in edges {
            if triple.predicate.as_ref() == rdf::TYPE {
                continue;
            }
            let Some(property) = self.property(descriptor, triple.predicate.as_ref()) else {
                tracing::trace!(
                    predicate = %triple.predicate,
                    type_name,
                    "Dropping unmapped predicate"
                );
                continue;
            };
            match self.codec.decode(property.kind(), triple.object.as_ref()) {
                Ok(value) => values
                    .entry(property.name())
                    .or_insert_with(|| (property, Vec::new()))
                    .1
                    .push(value),
                Err(_) => {
                    tracing::trace!(
                        object = %triple.object,
                        property = property.name(),
                        "Dropping undecodable value"
                    );
                }
            }
        }

        let mut document = Document::new(id, type_name);
        for (name, (property, mut values)) in values {
            values.sort_by(Value::total_cmp);
            values.dedup();
            if property.is_array() {
                document.insert(name, Value::Array(values));
            } else {
                if values.len() > 1 {
                    tracing::warn!(
                        %node,
                        property = name,
                        "Several values stored for a single valued property"
                    );
                }
                if let Some(value) = values.into_iter().next() {
                    document.insert(name, value);
                }
            }
        }
        Some(document)
    }

    /// The forward property of `descriptor` stored with `predicate`.
    fn property(
        &self,
        descriptor: &'schema TypeDescriptor,
        predicate: NamedNodeRef<'_>,
    ) -> Option<ResolvedProperty<'schema>> {
        let name = self.schema.property_name(predicate)?;
        descriptor
            .property(name)
            .filter(|property| !property.is_inverse() && property.iri().as_ref() == predicate)
    }

    /// Decodes the `?_subject` column of a find query into record identifiers, in row order.
    pub fn identifiers(&self, type_name: &str, solutions: &[QuerySolution]) -> Vec<String> {
        solutions
            .iter()
            .filter_map(|solution| solution.get(subject().as_str()))
            .filter_map(|term| self.codec.decode_identifier(type_name, term.as_ref()).ok())
            .collect()
    }

    /// Decodes the result of a count query.
    pub fn count(solutions: &[QuerySolution]) -> Option<usize> {
        let solution = solutions.first()?;
        match solution.get(count().as_str())? {
            Term::Literal(literal) => literal.value().parse().ok(),
            _ => None,
        }
    }

    /// Decodes a row of an aggregation compiled for `aggregator`.
    ///
    /// Counts, sums and averages are numbers, concatenations are strings. Group keys and minima
    /// or maxima are decoded like the values of their paths.
    pub fn aggregate_row(&self, aggregator: &Aggregator, solution: &QuerySolution) -> AggregateRow {
        let mut row = AggregateRow::new();
        for field in &aggregator.fields {
            let Some(term) = solution.get(aggregate_variable(&field.label).as_str()) else {
                continue;
            };
            let value = match &field.kind {
                AggregateKind::Group(path) => self.path_value(path, term.as_ref()),
                AggregateKind::Apply { function, path } => match (function, path) {
                    (AggregateFunction::Min | AggregateFunction::Max, Some(path)) => {
                        self.path_value(path, term.as_ref())
                    }
                    (AggregateFunction::Concat, _) => match term {
                        Term::Literal(literal) => Some(Value::String(literal.value().to_owned())),
                        _ => None,
                    },
                    _ => number(term.as_ref()),
                },
            };
            match value {
                Some(value) => {
                    row.insert(field.label.clone(), value);
                }
                None => {
                    tracing::trace!(label = field.label, %term, "Dropping undecodable aggregate");
                }
            }
        }
        row
    }

    fn path_value(&self, path: &FieldPath, term: TermRef<'_>) -> Option<Value> {
        match path.target() {
            PathTarget::Id => {
                let id = self.codec.decode_identifier(path.record_type(), term).ok()?;
                Some(if path.segments().is_empty() {
                    Value::String(id)
                } else {
                    Value::Reference(Reference::new(id, path.record_type()))
                })
            }
            PathTarget::Type => None,
            PathTarget::Value => {
                let kind = path.value_kind()?;
                self.codec.decode(kind, term).ok()
            }
        }
    }
}

fn number(term: TermRef<'_>) -> Option<Value> {
    match term {
        TermRef::Literal(literal) => {
            let number = literal.value().trim().parse::<f64>().ok()?;
            number.is_finite().then_some(Value::Number(number))
        }
        _ => None,
    }
}
