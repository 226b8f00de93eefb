use clap::{Args as ClapArgs, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "rdf-mapper")]
/// RDF Mapper command line toolkit
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a filter and its options and print the cast query
    Validate {
        #[command(flatten)]
        target: Target,
        /// The filter as a JSON object
        #[arg(short, long, default_value = "{}")]
        query: String,
        /// The find options as a JSON object
        #[arg(short, long)]
        options: Option<String>,
    },
    /// Print the SPARQL query compiled for a filter
    Compile {
        #[command(flatten)]
        target: Target,
        /// The filter as a JSON object
        #[arg(short, long, default_value = "{}")]
        query: String,
        /// The find or aggregate options as a JSON object
        #[arg(short, long)]
        options: Option<String>,
        /// Compile a count query instead of a find query
        #[arg(long, conflicts_with = "aggregate")]
        count: bool,
        /// Compile an aggregation with the given aggregator object
        #[arg(long)]
        aggregate: Option<String>,
    },
    /// Print the SPARQL update deleting a record and everything depending on it
    Cascade {
        #[command(flatten)]
        target: Target,
        /// The identifier of the deleted record
        #[arg(long)]
        id: String,
    },
}

/// The schema and the type an operation works on.
#[derive(ClapArgs)]
pub struct Target {
    /// JSON file with the schema declaration
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub schema: PathBuf,
    /// The record type
    #[arg(short = 't', long = "type")]
    pub type_name: String,
    /// Base IRI of classes, properties and instances
    #[arg(long, value_hint = ValueHint::Url)]
    pub base_iri: Option<String>,
}
