use rdf_mapper_model::IriParseError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

/// An error in the declaration of a schema. Raised once while registering the schema.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StructureError {
    /// The declaration could not be deserialized.
    #[error("The schema declaration is malformed: {0}")]
    MalformedDeclaration(#[source] serde_json::Error),
    /// A type or property name cannot be used to mint an IRI.
    #[error("'{name}' is not a valid name: {reason}")]
    InvalidName { name: String, reason: String },
    /// The base IRI of the identifier mapping is invalid.
    #[error("Invalid base IRI '{iri}': {error}")]
    InvalidBaseIri {
        iri: String,
        #[source]
        error: IriParseError,
    },
    /// A type composes a mixin that is not declared.
    #[error("Type '{type_name}' composes the unknown mixin '{mixin}'")]
    UnknownMixin { type_name: String, mixin: String },
    /// The mixins of a type eventually compose the type itself.
    #[error("The mixins of '{type_name}' form a cycle: {}", .cycle.join(" -> "))]
    MixinCycle {
        type_name: String,
        cycle: Vec<String>,
    },
    /// An array property without an `items` declaration.
    #[error("Array property '{type_name}.{property}' does not declare its items")]
    MissingItems { type_name: String, property: String },
    /// A property declares a type that is neither a scalar type nor a declared type.
    #[error("Property '{type_name}.{property}' has the unknown type '{declared}'")]
    UnknownPropertyType {
        type_name: String,
        property: String,
        declared: String,
    },
    /// A property or an inverse relationship declares an invalid option.
    #[error("Property '{type_name}.{property}' is invalid: {reason}")]
    InvalidProperty {
        type_name: String,
        property: String,
        reason: String,
    },
    /// A string pattern constraint is not a valid regular expression.
    #[error("Property '{type_name}.{property}' has an invalid pattern: {error}")]
    InvalidPattern {
        type_name: String,
        property: String,
        #[source]
        error: regex::Error,
    },
    /// An inverse relationship does not point at a relation of its source type.
    #[error("Inverse relationship '{type_name}.{name}' is invalid: {reason}")]
    InvalidInverse {
        type_name: String,
        name: String,
        reason: String,
    },
}

/// A single problem found while validating a query or a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// The dotted path of the offending key.
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Re-roots the error below `prefix`, e.g. `name` becomes `author.name`.
    #[must_use]
    pub fn prefixed(self, prefix: &str) -> Self {
        let path = if self.path.is_empty() {
            prefix.to_owned()
        } else {
            format!("{prefix}.{}", self.path)
        };
        Self {
            path,
            message: self.message,
        }
    }
}

/// The aggregate of every [ValidationError] of a query or document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<ValidationError> {
        self.0
    }

    /// Returns `value` if no error has been collected.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(value: Vec<ValidationError>) -> Self {
        Self(value)
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n- {error}")?;
        }
        Ok(())
    }
}

impl Error for ValidationErrors {}

/// A violation of the contract between a caller and the schema.
///
/// These errors indicate a bug in the calling code and are raised immediately instead of being
/// collected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ContractError {
    #[error("The type '{0}' is not registered in the schema")]
    UnknownType(String),
    #[error("'{path}' cannot be traversed: '{segment}' is not a relation")]
    NotARelation { path: String, segment: String },
    #[error("'{path}' is not an array property")]
    NotAnArray { path: String },
    #[error("The relation value of '{path}' does not carry a _type")]
    MissingReferenceType { path: String },
    #[error("'{path}' is not a property of '{type_name}'")]
    UnknownProperty { type_name: String, path: String },
    #[error("The value of '{path}' does not match its declaration: {reason}")]
    InvalidValue { path: String, reason: String },
}

/// An error raised by a [TripleStore](crate::TripleStore) implementation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Error from the OS I/O layer.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The store answered with something the mapper did not ask for.
    #[error("The store returned an unexpected result: {0}")]
    UnexpectedResult(String),
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl StorageError {
    /// Wraps an arbitrary error of the store implementation.
    pub fn other(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::Other(error.into())
    }
}

impl From<StorageError> for io::Error {
    #[inline]
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Io(error) => error,
            StorageError::UnexpectedResult(error) => Self::new(io::ErrorKind::InvalidData, error),
            StorageError::Other(error) => Self::other(error),
        }
    }
}
