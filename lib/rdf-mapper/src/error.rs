use rdf_mapper_common::error::{ContractError, StorageError, StructureError, ValidationErrors};

/// An error raised by a [Database](crate::Database).
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// The schema declaration is invalid.
    #[error(transparent)]
    Structure(#[from] StructureError),
    /// The query, its options or a document did not validate. Every problem is listed.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    /// The caller used the schema in a way it does not support.
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// The triple store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl MapperError {
    /// The individual validation errors, if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            MapperError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
