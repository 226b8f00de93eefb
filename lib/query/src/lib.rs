//! Validation of untyped queries against a [Schema](rdf_mapper_schema::Schema).
//!
//! The [QueryValidator] turns raw JSON filters, find options and aggregators into their typed
//! counterparts, and raw documents into [Document](rdf_mapper_model::Document)s ready to be
//! written. Every operand is cast to a native [Value](rdf_mapper_model::Value) and every
//! property path is resolved to a [FieldPath], so that compiling a validated query never
//! consults the raw input again.

mod aggregator;
mod document;
mod options;
mod path;
mod typed;
mod validator;

pub use aggregator::*;
pub use options::*;
pub use path::{Direction, FieldPath, PathTarget, Segment};
pub use typed::*;
pub use validator::*;
