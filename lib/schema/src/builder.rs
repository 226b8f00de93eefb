use crate::{
    Constraints, ConstraintsDeclaration, InverseRelationProperty, PropagationDeclaration,
    Propagation, Property, PropertyDeclaration, PropertyDefinition, PropertyKind, ScalarType,
    Schema, SchemaDeclaration, SchemaOptions, TypeDescriptor,
};
use rdf_mapper_common::error::StructureError;
use rdf_mapper_model::{IdentifierMappingRef, NamedNode};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

type PropertyTable = BTreeMap<String, Arc<Property>>;
type InverseTable = BTreeMap<String, Arc<InverseRelationProperty>>;

/// An inverse relationship whose source property has not been checked yet.
struct PendingInverse {
    declaring_type: String,
    name: String,
    source_type: String,
    source_property: String,
    propagation: Propagation,
}

/// Turns a [SchemaDeclaration] into a [Schema].
///
/// Building happens in phases: mixin chains first, then the own properties of every type, the
/// flattened forward properties, the inverse relationships (which need the forward properties of
/// their source type) and finally the reverse IRI indices.
pub(crate) struct SchemaBuilder<'declaration> {
    declaration: &'declaration SchemaDeclaration,
    mapping: IdentifierMappingRef,
    options: SchemaOptions,
}

impl<'declaration> SchemaBuilder<'declaration> {
    pub fn new(
        declaration: &'declaration SchemaDeclaration,
        mapping: IdentifierMappingRef,
        options: SchemaOptions,
    ) -> Self {
        Self {
            declaration,
            mapping,
            options,
        }
    }

    pub fn build(self) -> Result<Schema, StructureError> {
        for type_name in self.declaration.keys() {
            check_name(type_name)?;
            check_iri(type_name, self.mapping.class_iri(type_name).as_str())?;
        }

        let mut chains = HashMap::new();
        for type_name in self.declaration.keys() {
            self.mixin_chain(type_name, &mut Vec::new(), &mut chains)?;
        }

        let mut own_properties = HashMap::new();
        let mut pending_inverses = Vec::new();
        for (type_name, declaration) in self.declaration {
            let mut properties = PropertyTable::new();
            for (name, property) in &declaration.properties {
                let (property, reverse) = self.property(type_name, name, property)?;
                pending_inverses.extend(reverse);
                properties.insert(name.clone(), Arc::new(property));
            }
            for (name, inverse) in &declaration.inverse_relationships {
                check_name(name)?;
                pending_inverses.push(PendingInverse {
                    declaring_type: type_name.clone(),
                    name: name.clone(),
                    source_type: inverse.type_name.clone(),
                    source_property: inverse.property.clone(),
                    propagation: propagation_of(inverse.propagate_deletion.as_ref()),
                });
            }
            own_properties.insert(type_name.clone(), properties);
        }

        let properties = flatten(&chains, &own_properties);
        let own_inverses = self.inverses(pending_inverses, &chains, &properties)?;
        let inverses = flatten(&chains, &own_inverses);
        check_propagation_targets(&own_properties, &own_inverses, &properties)?;

        let mut property_index = HashMap::new();
        let mut class_index = HashMap::new();
        let mut types = BTreeMap::new();
        for (type_name, declaration) in self.declaration {
            let class_iri = self.mapping.class_iri(type_name);
            class_index.insert(class_iri.as_str().to_owned(), type_name.clone());
            for property in own_properties[type_name].values() {
                let previous = property_index
                    .entry(property.iri.as_str().to_owned())
                    .or_insert_with(|| property.name.clone());
                if *previous != property.name {
                    tracing::warn!(
                        iri = property.iri.as_str(),
                        "Properties '{}' and '{}' share a predicate, the store data is read as '{}'",
                        previous,
                        property.name,
                        previous
                    );
                }
            }
            types.insert(
                type_name.clone(),
                TypeDescriptor {
                    name: type_name.clone(),
                    class_iri,
                    mixins: declaration.mixins.clone(),
                    mixin_chain: chains[type_name].clone(),
                    own_properties: own_properties[type_name].clone(),
                    own_inverse_relationships: own_inverses
                        .get(type_name)
                        .cloned()
                        .unwrap_or_default(),
                    properties: properties[type_name].clone(),
                    inverse_relationships: inverses[type_name].clone(),
                },
            );
        }

        tracing::debug!(types = types.len(), "Schema registered");
        Ok(Schema {
            types,
            mapping: self.mapping,
            options: self.options,
            property_index,
            class_index,
        })
    }

    /// Computes the flattened mixin chain of `type_name`: the chains of its mixins in order,
    /// de-duplicated (first occurrence wins), followed by the type itself.
    fn mixin_chain(
        &self,
        type_name: &str,
        stack: &mut Vec<String>,
        chains: &mut HashMap<String, Vec<String>>,
    ) -> Result<Vec<String>, StructureError> {
        if let Some(chain) = chains.get(type_name) {
            return Ok(chain.clone());
        }
        if let Some(position) = stack.iter().position(|name| name == type_name) {
            let mut cycle = stack[position..].to_vec();
            cycle.push(type_name.to_owned());
            return Err(StructureError::MixinCycle {
                type_name: stack[position].clone(),
                cycle,
            });
        }

        stack.push(type_name.to_owned());
        let mut chain: Vec<String> = Vec::new();
        for mixin in &self.declaration[type_name].mixins {
            if !self.declaration.contains_key(mixin) {
                return Err(StructureError::UnknownMixin {
                    type_name: type_name.to_owned(),
                    mixin: mixin.clone(),
                });
            }
            for name in self.mixin_chain(mixin, stack, chains)? {
                if !chain.contains(&name) {
                    chain.push(name);
                }
            }
        }
        stack.pop();

        chain.push(type_name.to_owned());
        chains.insert(type_name.to_owned(), chain.clone());
        Ok(chain)
    }

    /// Builds an own property of `type_name`. Returns the inverse relationship requested with
    /// `reverse`, if any.
    fn property(
        &self,
        type_name: &str,
        name: &str,
        declaration: &PropertyDeclaration,
    ) -> Result<(Property, Option<PendingInverse>), StructureError> {
        check_name(name)?;
        let definition = declaration.definition();
        let items = definition.items.as_ref().map(PropertyDeclaration::definition);
        let kind = self.kind(type_name, name, &definition)?;

        // Options of relation arrays may be given on the items.
        let propagate_deletion = definition
            .propagate_deletion
            .as_ref()
            .or_else(|| items.as_ref().and_then(|items| items.propagate_deletion.as_ref()));
        let reverse = definition
            .reverse
            .as_ref()
            .or_else(|| items.as_ref().and_then(|items| items.reverse.as_ref()));
        let validate = definition
            .validate
            .as_ref()
            .or_else(|| items.as_ref().and_then(|items| items.validate.as_ref()));

        let propagation = propagation_of(propagate_deletion);
        if !propagation.is_none() && !kind.is_relation() {
            return Err(invalid_property(
                type_name,
                name,
                "only relations can propagate deletion",
            ));
        }

        let iri = match &definition.uri {
            Some(uri) => NamedNode::new(uri.as_str()).map_err(|error| {
                invalid_property(type_name, name, format!("invalid uri '{uri}': {error}"))
            })?,
            None => {
                let iri = self.mapping.property_iri(name);
                check_iri(name, iri.as_str())?;
                iri
            }
        };

        let reverse = match (reverse, kind.target_type()) {
            (None, _) => None,
            (Some(_), None) => {
                return Err(invalid_property(
                    type_name,
                    name,
                    "only relations can declare a reverse",
                ))
            }
            (Some(reverse), Some(target)) => {
                check_name(reverse.name())?;
                Some(PendingInverse {
                    declaring_type: target.to_owned(),
                    name: reverse.name().to_owned(),
                    source_type: type_name.to_owned(),
                    source_property: name.to_owned(),
                    propagation: propagation_of(reverse.propagate_deletion()),
                })
            }
        };

        let property = Property {
            name: name.to_owned(),
            declaring_type: type_name.to_owned(),
            kind,
            constraints: constraints(type_name, name, validate)?,
            propagation,
            iri,
        };
        Ok((property, reverse))
    }

    fn kind(
        &self,
        type_name: &str,
        name: &str,
        definition: &PropertyDefinition,
    ) -> Result<PropertyKind, StructureError> {
        if definition.type_name == "array" {
            let Some(items) = &definition.items else {
                return Err(StructureError::MissingItems {
                    type_name: type_name.to_owned(),
                    property: name.to_owned(),
                });
            };
            let inner = self.kind(type_name, name, &items.definition())?;
            return Ok(PropertyKind::Array(Box::new(inner)));
        }
        if let Some(scalar) = ScalarType::from_name(&definition.type_name) {
            return Ok(PropertyKind::Scalar(scalar));
        }
        if self.declaration.contains_key(&definition.type_name) {
            return Ok(PropertyKind::Relation(definition.type_name.clone()));
        }
        Err(StructureError::UnknownPropertyType {
            type_name: type_name.to_owned(),
            property: name.to_owned(),
            declared: definition.type_name.clone(),
        })
    }

    /// Checks the pending inverse relationships against the forward properties of their source
    /// types and groups them by declaring type.
    fn inverses(
        &self,
        pending: Vec<PendingInverse>,
        chains: &HashMap<String, Vec<String>>,
        properties: &HashMap<String, PropertyTable>,
    ) -> Result<HashMap<String, InverseTable>, StructureError> {
        let mut inverses: HashMap<String, InverseTable> = HashMap::new();
        for inverse in pending {
            let invalid = |reason: String| StructureError::InvalidInverse {
                type_name: inverse.declaring_type.clone(),
                name: inverse.name.clone(),
                reason,
            };

            let Some(source_properties) = properties.get(&inverse.source_type) else {
                return Err(invalid(format!(
                    "the type '{}' is not declared",
                    inverse.source_type
                )));
            };
            let Some(source) = source_properties.get(&inverse.source_property) else {
                return Err(invalid(format!(
                    "'{}' is not a property of '{}'",
                    inverse.source_property, inverse.source_type
                )));
            };
            let Some(target) = source.kind.target_type() else {
                return Err(invalid(format!(
                    "'{}.{}' is not a relation",
                    inverse.source_type, inverse.source_property
                )));
            };
            if !chains[&inverse.declaring_type]
                .iter()
                .any(|name| name == target)
            {
                return Err(invalid(format!(
                    "'{}.{}' relates to '{}'",
                    inverse.source_type, inverse.source_property, target
                )));
            }

            let table = inverses.entry(inverse.declaring_type.clone()).or_default();
            if table.contains_key(&inverse.name) {
                return Err(invalid("it is declared twice".to_owned()));
            }
            let property = InverseRelationProperty {
                name: inverse.name.clone(),
                declaring_type: inverse.declaring_type.clone(),
                source_type: inverse.source_type.clone(),
                source_property: inverse.source_property.clone(),
                kind: PropertyKind::Array(Box::new(PropertyKind::Relation(
                    inverse.source_type.clone(),
                ))),
                propagation: inverse.propagation,
                iri: source.iri.clone(),
            };
            table.insert(inverse.name, Arc::new(property));
        }
        Ok(inverses)
    }
}

/// Merges the own tables of every type of a mixin chain in chain order, so that later mixins
/// override earlier ones and the type's own entries are applied last.
fn flatten<T>(
    chains: &HashMap<String, Vec<String>>,
    own: &HashMap<String, BTreeMap<String, Arc<T>>>,
) -> HashMap<String, BTreeMap<String, Arc<T>>> {
    chains
        .iter()
        .map(|(type_name, chain)| {
            let mut table = BTreeMap::new();
            for name in chain {
                if let Some(entries) = own.get(name) {
                    for (key, value) in entries {
                        table.insert(key.clone(), Arc::clone(value));
                    }
                }
            }
            (type_name.clone(), table)
        })
        .collect()
}

/// `propagateDeletion: "<property>"` must name a relation of the related type.
fn check_propagation_targets(
    own_properties: &HashMap<String, PropertyTable>,
    own_inverses: &HashMap<String, InverseTable>,
    properties: &HashMap<String, PropertyTable>,
) -> Result<(), StructureError> {
    let forward = own_properties.values().flat_map(BTreeMap::values).map(|property| {
        (
            property.declaring_type.as_str(),
            property.name.as_str(),
            &property.propagation,
            property.kind.target_type(),
        )
    });
    let inverse = own_inverses.values().flat_map(BTreeMap::values).map(|property| {
        (
            property.declaring_type.as_str(),
            property.name.as_str(),
            &property.propagation,
            Some(property.source_type.as_str()),
        )
    });

    for (type_name, name, propagation, related_type) in forward.chain(inverse) {
        let (Propagation::Unset(unset), Some(related_type)) = (propagation, related_type) else {
            continue;
        };
        let is_relation = properties
            .get(related_type)
            .and_then(|table| table.get(unset))
            .is_some_and(|property| property.kind.is_relation());
        if !is_relation {
            return Err(invalid_property(
                type_name,
                name,
                format!("'{unset}' is not a relation of '{related_type}'"),
            ));
        }
    }
    Ok(())
}

fn propagation_of(declaration: Option<&PropagationDeclaration>) -> Propagation {
    match declaration {
        None | Some(PropagationDeclaration::Flag(false)) => Propagation::None,
        Some(PropagationDeclaration::Flag(true)) => Propagation::Delete,
        Some(PropagationDeclaration::Property(property)) => Propagation::Unset(property.clone()),
    }
}

fn constraints(
    type_name: &str,
    name: &str,
    declaration: Option<&ConstraintsDeclaration>,
) -> Result<Constraints, StructureError> {
    let Some(declaration) = declaration else {
        return Ok(Constraints::default());
    };
    let pattern = declaration
        .pattern
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|error| StructureError::InvalidPattern {
            type_name: type_name.to_owned(),
            property: name.to_owned(),
            error,
        })?;
    Ok(Constraints {
        precision: declaration.precision,
        min: declaration.min,
        max: declaration.max,
        pattern,
        min_length: declaration.min_length,
        max_length: declaration.max_length,
        one_of: declaration.one_of.clone(),
    })
}

fn invalid_property(type_name: &str, name: &str, reason: impl Into<String>) -> StructureError {
    StructureError::InvalidProperty {
        type_name: type_name.to_owned(),
        property: name.to_owned(),
        reason: reason.into(),
    }
}

/// Names are used as path segments and to mint IRIs.
fn check_name(name: &str) -> Result<(), StructureError> {
    let reason = if name.is_empty() {
        Some("it is empty")
    } else if name.contains('.') {
        Some("it contains a '.'")
    } else if name.starts_with('$') {
        Some("it starts with a '$'")
    } else if name.starts_with('_') {
        Some("names starting with '_' are reserved")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StructureError::InvalidName {
            name: name.to_owned(),
            reason: reason.to_owned(),
        }),
        None => Ok(()),
    }
}

fn check_iri(name: &str, iri: &str) -> Result<(), StructureError> {
    NamedNode::new(iri)
        .map(|_| ())
        .map_err(|error| StructureError::InvalidName {
            name: name.to_owned(),
            reason: format!("<{iri}> is not a valid IRI: {error}"),
        })
}
