//! The schema model of the mapper.
//!
//! A [Schema] is built once from a [SchemaDeclaration] and is read-only afterward. It answers
//! which [Property] a (dotted) path refers to, how raw values are cast into typed
//! [Value](rdf_mapper_model::Value)s, and which schema names correspond to the IRIs found in the
//! store.

mod builder;
mod cast;
mod declaration;
mod property;
mod schema;
mod type_descriptor;

pub use cast::parse_boolean;
pub use declaration::*;
pub use property::*;
pub use schema::*;
pub use type_descriptor::TypeDescriptor;

/// The implicit identifier property of every type.
pub const ID_PROPERTY: &str = "_id";
/// The implicit type property of every type.
pub const TYPE_PROPERTY: &str = "_type";
