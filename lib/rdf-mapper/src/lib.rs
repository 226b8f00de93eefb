//! A schema driven document mapper on top of SPARQL triple stores.
//!
//! Records are described by a JSON schema declaration of types, properties, relations and
//! mixins. A [Database] validates MongoDB style filters against that schema, compiles them to
//! SPARQL with [rdf_mapper_logical] and evaluates them with a [TripleStore] supplied by the
//! caller. Results come back as typed [Document](model::Document)s.

mod config;
mod database;
mod error;

pub use config::DatabaseConfig;
pub use database::Database;
pub use error::MapperError;
pub use rdf_mapper_common::TripleStore;

pub mod model {
    pub use rdf_mapper_model::*;
}

pub mod schema {
    pub use rdf_mapper_schema::*;
}

pub mod query {
    pub use rdf_mapper_query::*;
}

pub mod logical {
    pub use rdf_mapper_logical::*;
}

pub mod common {
    pub use rdf_mapper_common::*;
}
