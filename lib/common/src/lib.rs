pub mod error;
mod triple_store;

pub use triple_store::TripleStore;

pub use sparesults::QuerySolution;
