use crate::QueryValidator;
use rdf_mapper_common::error::{ContractError, ValidationError};
use rdf_mapper_model::Document;
use rdf_mapper_schema::{ResolvedProperty, ID_PROPERTY, TYPE_PROPERTY};
use serde_json::Value as Json;

impl QueryValidator<'_> {
    /// Validates a raw document that is about to be saved as a record of `type_name`.
    ///
    /// Values are cast like query operands. A missing `_id` is replaced by a fresh UUID and a
    /// `_type` must name `type_name` or a type composed of it. Inverse relationships are derived
    /// from the records pointing at this one and cannot be written.
    pub fn validate_document(
        &self,
        type_name: &str,
        raw: &Json,
    ) -> Result<(Document, Vec<ValidationError>), ContractError> {
        let descriptor = self.schema().type_descriptor(type_name)?;
        let mut errors = Vec::new();
        let Json::Object(object) = raw else {
            errors.push(ValidationError::new(
                "",
                format!("expected a document object, got {raw}"),
            ));
            return Ok((Document::new(new_id(), type_name), errors));
        };

        let id = match object.get(ID_PROPERTY) {
            None | Some(Json::Null) => new_id(),
            Some(Json::String(id)) if !id.is_empty() => id.clone(),
            Some(Json::Number(id)) => id.to_string(),
            Some(other) => {
                errors.push(ValidationError::new(
                    ID_PROPERTY,
                    format!("expected an identifier, got {other}"),
                ));
                new_id()
            }
        };
        let record_type = match object.get(TYPE_PROPERTY) {
            None | Some(Json::Null) => descriptor,
            Some(Json::String(name)) => match self.schema().get(name) {
                Some(record_type) if record_type.is_a(type_name) => record_type,
                Some(_) => {
                    errors.push(ValidationError::new(
                        TYPE_PROPERTY,
                        format!("'{name}' is not a '{type_name}'"),
                    ));
                    descriptor
                }
                None => {
                    errors.push(ValidationError::new(
                        TYPE_PROPERTY,
                        format!("unknown type '{name}'"),
                    ));
                    descriptor
                }
            },
            Some(other) => {
                errors.push(ValidationError::new(
                    TYPE_PROPERTY,
                    format!("expected a type name, got {other}"),
                ));
                descriptor
            }
        };

        let mut document = Document::new(id, record_type.name());
        for (name, value) in object {
            if name == ID_PROPERTY || name == TYPE_PROPERTY || value.is_null() {
                continue;
            }
            match record_type.property(name) {
                None => errors.push(ValidationError::new(name.as_str(), "unknown property")),
                Some(ResolvedProperty::Inverse(_)) => errors.push(ValidationError::new(
                    name.as_str(),
                    "inverse relationships are read-only",
                )),
                Some(property) => match property.cast(self.schema(), value) {
                    Ok(value) => {
                        document.insert(name.as_str(), value);
                    }
                    Err(property_errors) => errors.extend(
                        property_errors
                            .into_iter()
                            .map(|error| error.prefixed(name)),
                    ),
                },
            }
        }
        Ok((document.normalized(), errors))
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
