use rdf_mapper_model::Variable;

/// The record a query selects.
pub const SUBJECT: &str = "_subject";
/// The predicate of a fetched edge.
pub const PREDICATE: &str = "_predicate";
/// The object of a fetched edge.
pub const OBJECT: &str = "_object";
/// The result of a count query.
pub const COUNT: &str = "_count";

pub fn subject() -> Variable {
    Variable::new_unchecked(SUBJECT)
}

pub fn predicate() -> Variable {
    Variable::new_unchecked(PREDICATE)
}

pub fn object() -> Variable {
    Variable::new_unchecked(OBJECT)
}

pub fn count() -> Variable {
    Variable::new_unchecked(COUNT)
}

/// The variable bound to the values of a property path. Path segments are joined with `__`.
///
/// Schema names never start with `_`, hence path variables cannot clash with the fixed
/// variables above as long as `scope` is empty or starts with `_`.
pub fn path_variable<'name>(scope: &str, names: impl IntoIterator<Item = &'name str>) -> Variable {
    let names = names.into_iter().map(sanitize).collect::<Vec<_>>();
    Variable::new_unchecked(format!("{scope}{}", names.join("__")))
}

/// The variable holding the result of the aggregate labelled `label`.
pub fn aggregate_variable(label: &str) -> Variable {
    Variable::new_unchecked(format!("_agg_{}", sanitize(label)))
}

/// Replaces every character that is not allowed in our variable names with `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|char| {
            if char.is_ascii_alphanumeric() || char == '_' {
                char
            } else {
                '_'
            }
        })
        .collect()
}
