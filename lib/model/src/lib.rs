mod document;
mod error;
mod identifier;
mod value;

pub use document::*;
pub use error::*;
pub use identifier::*;
pub use value::*;

pub mod vocab {
    pub use oxrdf::vocab::{rdf, xsd};
}

// Re-export some oxrdf types.
pub use oxiri::Iri;
pub use oxrdf::{
    GraphName, IriParseError, Literal, LiteralRef, NamedNode, NamedNodeRef, Quad, Subject,
    SubjectRef, Term, TermRef, Triple, TripleRef, Variable, VariableNameParseError, VariableRef,
};
pub use oxsdatatypes::{Date, DateTime, DateTimeOverflowError, ParseDateTimeError};
