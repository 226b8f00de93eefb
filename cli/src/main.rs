#![allow(clippy::print_stdout)]
use crate::cli::{Args, Command, Target};
use anyhow::{bail, Context};
use clap::Parser;
use rdf_mapper::common::error::{ValidationError, ValidationErrors};
use rdf_mapper::logical::{CascadePlanner, QueryCompiler};
use rdf_mapper::model::BaseIriMapping;
use rdf_mapper::query::QueryValidator;
use rdf_mapper::schema::{Schema, SchemaOptions};
use serde_json::Value as Json;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod cli;

pub fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = Args::parse();
    match matches.command {
        Command::Validate {
            target,
            query,
            options,
        } => {
            let schema = load_schema(&target)?;
            let validator = QueryValidator::new(&schema);
            let (query, mut errors) = validator.validate(&target.type_name, &parse_json(&query)?)?;
            let (_, option_errors) = validator
                .validate_options(&target.type_name, &parse_optional_json(options.as_deref())?)?;
            errors.extend(option_errors);
            check(errors)?;
            println!("{query}");
            Ok(())
        }
        Command::Compile {
            target,
            query,
            options,
            count,
            aggregate,
        } => {
            let schema = load_schema(&target)?;
            let validator = QueryValidator::new(&schema);
            let compiler = QueryCompiler::new(&schema);
            let type_name = target.type_name.as_str();
            let (query, mut errors) = validator.validate(type_name, &parse_json(&query)?)?;
            let options = parse_optional_json(options.as_deref())?;
            let compiled = if count {
                check(errors)?;
                compiler.count(&query)?
            } else if let Some(aggregator) = aggregate {
                let (aggregator, aggregator_errors) =
                    validator.validate_aggregator(type_name, &parse_json(&aggregator)?)?;
                let (options, option_errors) = aggregator.validate_options(&options);
                errors.extend(aggregator_errors);
                errors.extend(option_errors);
                check(errors)?;
                compiler.aggregate(&query, &aggregator, &options)?
            } else {
                let (options, option_errors) = validator.validate_options(type_name, &options)?;
                errors.extend(option_errors);
                check(errors)?;
                compiler.find(&query, &options)?
            };
            println!("{compiled}");
            Ok(())
        }
        Command::Cascade { target, id } => {
            let schema = load_schema(&target)?;
            let plan = CascadePlanner::new(&schema).plan(&target.type_name, &id)?;
            println!("{}", plan.to_update());
            Ok(())
        }
    }
}

fn load_schema(target: &Target) -> anyhow::Result<Schema> {
    let file = File::open(&target.schema)
        .with_context(|| format!("Failed to open {}", target.schema.display()))?;
    let declaration: Json = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} is not valid JSON", target.schema.display()))?;
    let mapping = match &target.base_iri {
        Some(base_iri) => BaseIriMapping::new(base_iri.as_str())
            .with_context(|| format!("Invalid base IRI {base_iri}"))?,
        None => BaseIriMapping::default(),
    };
    let schema = Schema::from_json(declaration, Arc::new(mapping), SchemaOptions::default())?;
    if schema.get(&target.type_name).is_none() {
        bail!(
            "The type '{}' is not declared in {}",
            target.type_name,
            target.schema.display()
        )
    }
    tracing::debug!(types = schema.types().count(), "Loaded schema");
    Ok(schema)
}

fn parse_json(raw: &str) -> anyhow::Result<Json> {
    serde_json::from_str(raw).with_context(|| format!("'{raw}' is not valid JSON"))
}

fn parse_optional_json(raw: Option<&str>) -> anyhow::Result<Json> {
    raw.map_or(Ok(Json::Null), parse_json)
}

fn check(errors: Vec<ValidationError>) -> Result<(), ValidationErrors> {
    ValidationErrors::new(errors).into_result(())
}
