use rdf_mapper_common::error::ContractError;
use rdf_mapper_model::vocab::xsd;
use rdf_mapper_model::{
    IdentifierMapping, Literal, NamedNode, Reference, Term, TermRef, ThinError, ThinResult, Value,
};
use rdf_mapper_schema::{PropertyKind, ScalarType};
use spargebra::algebra::{Expression, Function};

/// Encodes [Value]s as RDF terms and decodes them back.
///
/// Numbers are stored as `xsd:decimal`, booleans as `xsd:boolean`, dates as `xsd:dateTime`,
/// strings as simple literals and references as the IRI of the referenced record.
#[derive(Debug, Clone, Copy)]
pub struct TermCodec<'mapping> {
    mapping: &'mapping dyn IdentifierMapping,
}

impl<'mapping> TermCodec<'mapping> {
    pub fn new(mapping: &'mapping dyn IdentifierMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &'mapping dyn IdentifierMapping {
        self.mapping
    }

    /// The IRI of the record `id` of `type_name`.
    pub fn identifier(&self, type_name: &str, id: &str) -> NamedNode {
        self.mapping.instance_iri(type_name, id)
    }

    /// Encodes a single value. `path` is only used for reporting.
    pub fn encode(&self, path: &str, value: &Value) -> Result<Term, ContractError> {
        Ok(match value {
            Value::String(value) => Literal::new_simple_literal(value).into(),
            Value::Number(value) => {
                Literal::new_typed_literal(value.to_string(), xsd::DECIMAL).into()
            }
            Value::Boolean(value) => Literal::from(*value).into(),
            Value::Date(value) => {
                Literal::new_typed_literal(value.to_string(), xsd::DATE_TIME).into()
            }
            Value::Reference(reference) => self.reference(path, reference)?.into(),
            Value::Array(_) => {
                return Err(ContractError::InvalidValue {
                    path: path.to_owned(),
                    reason: "arrays cannot be nested".to_owned(),
                })
            }
        })
    }

    /// Encodes a value as the operand of a filter expression. Dates are constructed with the
    /// `xsd:dateTime` cast so that they compare as dates regardless of the lexical form.
    pub fn expression(&self, path: &str, value: &Value) -> Result<Expression, ContractError> {
        if let Value::Date(date) = value {
            return Ok(Expression::FunctionCall(
                Function::Custom(xsd::DATE_TIME.into_owned()),
                vec![Expression::Literal(Literal::new_simple_literal(
                    date.to_string(),
                ))],
            ));
        }
        Ok(match self.encode(path, value)? {
            Term::NamedNode(node) => Expression::NamedNode(node),
            Term::Literal(literal) => Expression::Literal(literal),
            term => {
                return Err(ContractError::InvalidValue {
                    path: path.to_owned(),
                    reason: format!("{term} cannot be compared"),
                })
            }
        })
    }

    fn reference(&self, path: &str, reference: &Reference) -> Result<NamedNode, ContractError> {
        if reference.type_name.is_empty() {
            return Err(ContractError::MissingReferenceType {
                path: path.to_owned(),
            });
        }
        Ok(self.identifier(&reference.type_name, &reference.id))
    }

    /// Decodes a stored term into a value of `kind`.
    ///
    /// Returns a [ThinError] for terms that do not fit the kind, e.g. a literal where a relation
    /// is declared. Booleans stored as `1` and `0` are accepted.
    pub fn decode(&self, kind: &PropertyKind, term: TermRef<'_>) -> ThinResult<Value> {
        match (kind.item(), term) {
            (PropertyKind::Relation(target), TermRef::NamedNode(node)) => Ok(Value::Reference(
                Reference::new(self.mapping.instance_id(target, node), target.as_str()),
            )),
            (PropertyKind::Scalar(scalar), TermRef::Literal(literal)) => {
                decode_literal(*scalar, literal.value())
            }
            _ => ThinError::expected(),
        }
    }

    /// Decodes the identifier of a record of `type_name`.
    pub fn decode_identifier(&self, type_name: &str, term: TermRef<'_>) -> ThinResult<String> {
        match term {
            TermRef::NamedNode(node) => Ok(self.mapping.instance_id(type_name, node)),
            _ => ThinError::expected(),
        }
    }
}

fn decode_literal(scalar: ScalarType, value: &str) -> ThinResult<Value> {
    match scalar {
        ScalarType::String => Ok(Value::String(value.to_owned())),
        ScalarType::Number => {
            let number = value.trim().parse::<f64>()?;
            if number.is_finite() {
                Ok(Value::Number(number))
            } else {
                ThinError::expected()
            }
        }
        ScalarType::Boolean => match value.trim() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => ThinError::expected(),
        },
        ScalarType::Date => Ok(Value::Date(Value::parse_date(value)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_mapper_model::BaseIriMapping;

    #[test]
    fn encoded_values_decode_to_themselves() {
        let mapping = BaseIriMapping::default();
        let codec = TermCodec::new(&mapping);
        let cases = [
            (PropertyKind::Scalar(ScalarType::Number), Value::Number(2.43)),
            (PropertyKind::Scalar(ScalarType::Boolean), Value::Boolean(false)),
            (
                PropertyKind::Scalar(ScalarType::Date),
                Value::Date(Value::parse_date("2015-03-01T10:00:00Z").unwrap()),
            ),
            (
                PropertyKind::Relation("User".to_owned()),
                Value::Reference(Reference::new("john doe", "User")),
            ),
        ];
        for (kind, value) in cases {
            let term = codec.encode("value", &value).unwrap();
            assert_eq!(codec.decode(&kind, term.as_ref()), Ok(value));
        }
    }

    #[test]
    fn numbers_are_decimals() {
        let mapping = BaseIriMapping::default();
        let codec = TermCodec::new(&mapping);
        let term = codec.encode("ratting", &Value::Number(3.0)).unwrap();
        assert_eq!(
            term.to_string(),
            "\"3\"^^<http://www.w3.org/2001/XMLSchema#decimal>"
        );
    }

    #[test]
    fn integer_booleans_are_accepted() {
        let mapping = BaseIriMapping::default();
        let codec = TermCodec::new(&mapping);
        let kind = PropertyKind::Scalar(ScalarType::Boolean);
        let one = Literal::new_typed_literal("1", xsd::INTEGER);
        assert_eq!(
            codec.decode(&kind, one.as_ref().into()),
            Ok(Value::Boolean(true))
        );
        let text = Literal::new_simple_literal("maybe");
        assert!(codec.decode(&kind, text.as_ref().into()).is_err());
    }

    #[test]
    fn references_need_a_type() {
        let mapping = BaseIriMapping::default();
        let codec = TermCodec::new(&mapping);
        let error = codec
            .encode("author", &Value::Reference(Reference::new("u1", "")))
            .unwrap_err();
        assert_eq!(
            error,
            ContractError::MissingReferenceType {
                path: "author".to_owned()
            }
        );
    }
}
