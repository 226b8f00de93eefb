use crate::terms::TermCodec;
use crate::variables::{object, predicate};
use rdf_mapper_common::error::ContractError;
use rdf_mapper_model::vocab::rdf;
use rdf_mapper_model::{Document, NamedNode, Triple, Value};
use rdf_mapper_schema::{ResolvedProperty, Schema};
use spargebra::algebra::GraphPattern;
use spargebra::term::{
    GraphName, GraphNamePattern, GroundQuadPattern, GroundTermPattern, NamedNodePattern, Quad,
    TermPattern, TriplePattern,
};
use spargebra::{GraphUpdateOperation, Update};

/// Turns documents into the triples that store them.
#[derive(Debug, Clone, Copy)]
pub struct DocumentWriter<'schema> {
    schema: &'schema Schema,
    codec: TermCodec<'schema>,
}

impl<'schema> DocumentWriter<'schema> {
    pub fn new(schema: &'schema Schema) -> Self {
        Self {
            schema,
            codec: TermCodec::new(schema.mapping()),
        }
    }

    /// The IRI a document is stored under.
    pub fn subject(&self, document: &Document) -> NamedNode {
        self.codec.identifier(document.type_name(), document.id())
    }

    /// Encodes a document as triples: one `rdf:type` triple per type of its mixin chain and one
    /// triple per value.
    pub fn to_triples(&self, document: &Document) -> Result<Vec<Triple>, ContractError> {
        let descriptor = self.schema.type_descriptor(document.type_name())?;
        let subject = self.subject(document);
        let mut triples = Vec::new();
        for type_name in descriptor.mixin_chain() {
            let class = self.schema.type_descriptor(type_name)?.class_iri().clone();
            triples.push(Triple::new(subject.clone(), rdf::TYPE.into_owned(), class));
        }

        for (name, value) in document.properties() {
            let property = match descriptor.property(name) {
                Some(ResolvedProperty::Forward(property)) => property,
                Some(ResolvedProperty::Inverse(_)) => {
                    return Err(ContractError::InvalidValue {
                        path: name.to_owned(),
                        reason: "inverse relationships are read-only".to_owned(),
                    })
                }
                None => {
                    return Err(ContractError::UnknownProperty {
                        type_name: document.type_name().to_owned(),
                        path: name.to_owned(),
                    })
                }
            };
            let values = match value {
                Value::Array(values) if property.kind().is_array() => values.as_slice(),
                Value::Array(_) => {
                    return Err(ContractError::NotAnArray {
                        path: name.to_owned(),
                    })
                }
                value => std::slice::from_ref(value),
            };
            for value in values {
                triples.push(Triple::new(
                    subject.clone(),
                    property.iri().clone(),
                    self.codec.encode(name, value)?,
                ));
            }
        }
        Ok(triples)
    }

    /// Compiles the replacement of a whole record: every outgoing edge of the subject is
    /// deleted before the edges of `document` are inserted.
    pub fn save(&self, document: &Document) -> Result<Update, ContractError> {
        let triples = self.to_triples(document)?;
        let subject = self.subject(document);
        let update = Update {
            base_iri: None,
            operations: vec![
                clear_subject(&subject),
                GraphUpdateOperation::InsertData {
                    data: triples
                        .into_iter()
                        .map(|triple| Quad {
                            subject: triple.subject,
                            predicate: triple.predicate,
                            object: triple.object,
                            graph_name: GraphName::DefaultGraph,
                        })
                        .collect(),
                },
            ],
        };
        tracing::debug!(%update, "Compiled save");
        Ok(update)
    }
}

/// `DELETE { <s> ?p ?o } WHERE { <s> ?p ?o }`
fn clear_subject(subject: &NamedNode) -> GraphUpdateOperation {
    GraphUpdateOperation::DeleteInsert {
        delete: vec![GroundQuadPattern {
            subject: GroundTermPattern::NamedNode(subject.clone()),
            predicate: NamedNodePattern::Variable(predicate()),
            object: GroundTermPattern::Variable(object()),
            graph_name: GraphNamePattern::DefaultGraph,
        }],
        insert: Vec::new(),
        using: None,
        pattern: Box::new(GraphPattern::Bgp {
            patterns: vec![TriplePattern {
                subject: TermPattern::NamedNode(subject.clone()),
                predicate: NamedNodePattern::Variable(predicate()),
                object: TermPattern::Variable(object()),
            }],
        }),
    }
}
