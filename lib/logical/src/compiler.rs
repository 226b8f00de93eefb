use crate::pattern::{conjunction, path_chain, PatternBuilder};
use crate::terms::TermCodec;
use crate::variables::{aggregate_variable, count, object, predicate, subject};
use rdf_mapper_common::error::ContractError;
use rdf_mapper_model::vocab::rdf;
use rdf_mapper_model::{NamedNode, Term, Value};
use rdf_mapper_query::{
    AggregateFunction, AggregateKind, AggregateOptions, Aggregator, Condition, FieldPath, Filter,
    FindOptions, PathTarget, TypedQuery,
};
use rdf_mapper_schema::{Schema, ID_PROPERTY, TYPE_PROPERTY};
use spargebra::algebra::{
    self, AggregateExpression, Expression, Function, GraphPattern, OrderExpression,
};
use spargebra::term::{GroundTerm, NamedNodePattern, TermPattern, TriplePattern, Variable};
use spargebra::Query;

/// Compiles validated queries into SPARQL algebra.
///
/// The compiler is a pure function of the [Schema] and its input: compiling the same query
/// twice yields identical trees, including variable names.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'schema> {
    schema: &'schema Schema,
    codec: TermCodec<'schema>,
}

impl<'schema> QueryCompiler<'schema> {
    pub fn new(schema: &'schema Schema) -> Self {
        Self {
            schema,
            codec: TermCodec::new(schema.mapping()),
        }
    }

    pub fn codec(&self) -> TermCodec<'schema> {
        self.codec
    }

    /// Compiles a find query selecting `?_subject` in the requested order.
    ///
    /// Sort keys reuse the variables bound by the filters. Other sort keys are bound optionally,
    /// so that records without a value are not dropped. The subject is always the last sort key.
    pub fn find(&self, query: &TypedQuery, options: &FindOptions) -> Result<Query, ContractError> {
        let mut builder = self.where_clause(query)?;
        let mut order = Vec::with_capacity(options.sort.len() + 1);
        for key in &options.sort {
            let variable = builder.optional_path(&key.path);
            order.push(order_expression(variable, key.descending));
        }
        order.push(order_expression(subject(), false));

        let mut pattern = GraphPattern::Project {
            inner: Box::new(GraphPattern::OrderBy {
                inner: Box::new(builder.build()),
                expression: order,
            }),
            variables: vec![subject()],
        };
        if options.distinct {
            pattern = GraphPattern::Distinct {
                inner: Box::new(pattern),
            };
        }
        let query = select(slice(pattern, options.offset, options.limit));
        tracing::debug!(%query, "Compiled find query");
        Ok(query)
    }

    /// Compiles a query counting the distinct records matching `query` into `?_count`.
    pub fn count(&self, query: &TypedQuery) -> Result<Query, ContractError> {
        let builder = self.where_clause(query)?;
        let pattern = GraphPattern::Project {
            inner: Box::new(GraphPattern::Group {
                inner: Box::new(builder.build()),
                variables: Vec::new(),
                aggregates: vec![(
                    count(),
                    AggregateExpression::FunctionCall {
                        name: algebra::AggregateFunction::Count,
                        expr: Expression::Variable(subject()),
                        distinct: true,
                    },
                )],
            }),
            variables: vec![count()],
        };
        let query = select(pattern);
        tracing::debug!(%query, "Compiled count query");
        Ok(query)
    }

    /// Compiles an aggregation. Every label of the aggregator is bound to `?_agg_<label>`.
    ///
    /// Group keys and aggregated paths are bound optionally, so that a record without a value
    /// still counts towards its group.
    pub fn aggregate(
        &self,
        query: &TypedQuery,
        aggregator: &Aggregator,
        options: &AggregateOptions,
    ) -> Result<Query, ContractError> {
        let mut builder = self.where_clause(query)?;
        let mut group_variables = Vec::new();
        let mut renamings = Vec::new();
        let mut aggregates = Vec::new();
        for field in &aggregator.fields {
            let output = aggregate_variable(&field.label);
            match &field.kind {
                AggregateKind::Group(path) => {
                    let variable = builder.optional_path(path);
                    if !group_variables.contains(&variable) {
                        group_variables.push(variable.clone());
                    }
                    renamings.push((output, variable));
                }
                AggregateKind::Apply { function, path } => {
                    let variable = match path {
                        Some(path) => builder.optional_path(path),
                        None => subject(),
                    };
                    aggregates.push((output, aggregate_expression(*function, variable)));
                }
            }
        }

        let mut pattern = GraphPattern::Group {
            inner: Box::new(builder.build()),
            variables: group_variables,
            aggregates,
        };
        for (output, variable) in renamings {
            pattern = GraphPattern::Extend {
                inner: Box::new(pattern),
                variable: output,
                expression: Expression::Variable(variable),
            };
        }

        let mut order = options
            .sort
            .iter()
            .map(|key| order_expression(aggregate_variable(&key.label), key.descending))
            .collect::<Vec<_>>();
        order.extend(
            aggregator
                .group_paths()
                .map(|(label, _)| order_expression(aggregate_variable(label), false)),
        );
        if !order.is_empty() {
            pattern = GraphPattern::OrderBy {
                inner: Box::new(pattern),
                expression: order,
            };
        }

        let pattern = GraphPattern::Project {
            inner: Box::new(pattern),
            variables: aggregator
                .fields
                .iter()
                .map(|field| aggregate_variable(&field.label))
                .collect(),
        };
        let query = select(slice(pattern, options.offset, options.limit));
        tracing::debug!(%query, "Compiled aggregate query");
        Ok(query)
    }

    /// Compiles the fetch of every outgoing edge of the records `ids` of `type_name`.
    ///
    /// With `fields`, only the `rdf:type` edges and the edges of the named forward properties
    /// are fetched.
    pub fn describe(
        &self,
        type_name: &str,
        ids: &[String],
        fields: Option<&[String]>,
    ) -> Result<Query, ContractError> {
        let descriptor = self.schema.type_descriptor(type_name)?;
        let bindings = ids
            .iter()
            .map(|id| {
                vec![Some(GroundTerm::NamedNode(
                    self.codec.identifier(type_name, id),
                ))]
            })
            .collect();
        let edge = TriplePattern {
            subject: subject().into(),
            predicate: predicate().into(),
            object: object().into(),
        };
        let mut pattern = GraphPattern::Join {
            left: Box::new(GraphPattern::Values {
                variables: vec![subject()],
                bindings,
            }),
            right: Box::new(GraphPattern::Bgp {
                patterns: vec![edge.clone()],
            }),
        };

        if let Some(fields) = fields {
            let mut predicates = vec![Expression::NamedNode(rdf::TYPE.into_owned())];
            for name in fields {
                let property = descriptor
                    .property(name)
                    .and_then(|property| property.as_forward())
                    .ok_or_else(|| ContractError::UnknownProperty {
                        type_name: type_name.to_owned(),
                        path: name.clone(),
                    })?;
                predicates.push(Expression::NamedNode(property.iri().clone()));
            }
            pattern = GraphPattern::Filter {
                expr: Expression::In(Box::new(Expression::Variable(predicate())), predicates),
                inner: Box::new(pattern),
            };
        }

        let query = Query::Construct {
            template: vec![edge],
            dataset: None,
            pattern,
            base_iri: None,
        };
        tracing::debug!(%query, "Compiled describe query");
        Ok(query)
    }

    /// Builds the `WHERE` clause shared by find, count and aggregate queries.
    fn where_clause(&self, query: &TypedQuery) -> Result<PatternBuilder, ContractError> {
        let descriptor = self.schema.type_descriptor(&query.type_name)?;
        let mut builder = PatternBuilder::new();
        builder.require([type_triple(
            TermPattern::Variable(subject()),
            descriptor.class_iri().clone().into(),
        )]);
        for filter in &query.filters {
            for condition in &filter.conditions {
                let expression = self.condition(&mut builder, filter, condition)?;
                builder.filter(expression);
            }
        }
        Ok(builder)
    }

    fn condition(
        &self,
        builder: &mut PatternBuilder,
        filter: &Filter,
        condition: &Condition,
    ) -> Result<Expression, ContractError> {
        let path = &filter.path;
        if path.target() == PathTarget::Type {
            return self.type_condition(builder, path, condition);
        }
        let label = path.to_string();
        match condition {
            Condition::Exists(exists) => {
                let scope = builder.new_scope();
                let (triples, _) = path_chain(path.segments(), &scope, None);
                Ok(negate_unless(
                    *exists,
                    Expression::Exists(Box::new(GraphPattern::Bgp { patterns: triples })),
                ))
            }
            Condition::All(values) | Condition::Nall(values) => {
                let present = matches!(condition, Condition::All(_));
                let mut tests = Vec::with_capacity(values.len());
                for value in values {
                    let scope = builder.new_scope();
                    let end = self.term(path, &label, value)?;
                    let (triples, _) = path_chain(path.segments(), &scope, Some(end));
                    tests.push(negate_unless(
                        present,
                        Expression::Exists(Box::new(GraphPattern::Bgp { patterns: triples })),
                    ));
                }
                Ok(conjunction(tests).unwrap_or_else(|| Expression::Literal(true.into())))
            }
            _ => {
                let variable = Expression::Variable(builder.require_path(path));
                self.comparison(path, &label, variable, condition)
            }
        }
    }

    fn comparison(
        &self,
        path: &FieldPath,
        label: &str,
        variable: Expression,
        condition: &Condition,
    ) -> Result<Expression, ContractError> {
        let lhs = Box::new(variable);
        Ok(match condition {
            Condition::Eq(value) => Expression::Equal(lhs, self.operand(path, label, value)?),
            Condition::Ne(value) => Expression::Not(Box::new(Expression::Equal(
                lhs,
                self.operand(path, label, value)?,
            ))),
            Condition::Gt(value) => Expression::Greater(lhs, self.operand(path, label, value)?),
            Condition::Gte(value) => {
                Expression::GreaterOrEqual(lhs, self.operand(path, label, value)?)
            }
            Condition::Lt(value) => Expression::Less(lhs, self.operand(path, label, value)?),
            Condition::Lte(value) => {
                Expression::LessOrEqual(lhs, self.operand(path, label, value)?)
            }
            Condition::In(values) => Expression::In(lhs, self.operands(path, label, values)?),
            Condition::Nin(values) => Expression::Not(Box::new(Expression::In(
                lhs,
                self.operands(path, label, values)?,
            ))),
            Condition::Regex(pattern) | Condition::IRegex(pattern) => {
                let mut arguments = vec![
                    Expression::FunctionCall(Function::Str, vec![*lhs]),
                    Expression::Literal(pattern.as_str().into()),
                ];
                if matches!(condition, Condition::IRegex(_)) {
                    arguments.push(Expression::Literal("i".into()));
                }
                Expression::FunctionCall(Function::Regex, arguments)
            }
            Condition::All(_) | Condition::Nall(_) | Condition::Exists(_) => {
                return Err(ContractError::InvalidValue {
                    path: label.to_owned(),
                    reason: format!("{} is not a comparison", condition.operator()),
                })
            }
        })
    }

    /// `_type` conditions test the classes asserted for the node at the end of the path.
    fn type_condition(
        &self,
        builder: &mut PatternBuilder,
        path: &FieldPath,
        condition: &Condition,
    ) -> Result<Expression, ContractError> {
        let scope = builder.new_scope();
        let (mut triples, node) = path_chain(path.segments(), &scope, None);
        let (expected, values) = match condition {
            Condition::Eq(value) => (true, std::slice::from_ref(value)),
            Condition::Ne(value) => (false, std::slice::from_ref(value)),
            Condition::In(values) => (true, values.as_slice()),
            Condition::Nin(values) => (false, values.as_slice()),
            _ => {
                return Err(ContractError::InvalidValue {
                    path: path.to_string(),
                    reason: format!(
                        "{} cannot be applied to {TYPE_PROPERTY}",
                        condition.operator()
                    ),
                })
            }
        };
        let classes = values
            .iter()
            .map(|value| self.class_iri(path, value))
            .collect::<Result<Vec<_>, _>>()?;

        let pattern = if let [class] = classes.as_slice() {
            triples.push(type_triple(node, class.clone().into()));
            GraphPattern::Bgp { patterns: triples }
        } else {
            let class = Variable::new_unchecked(format!("{scope}type"));
            triples.push(type_triple(node, class.clone().into()));
            GraphPattern::Filter {
                expr: Expression::In(
                    Box::new(Expression::Variable(class)),
                    classes.into_iter().map(Expression::NamedNode).collect(),
                ),
                inner: Box::new(GraphPattern::Bgp { patterns: triples }),
            }
        };
        Ok(negate_unless(expected, Expression::Exists(Box::new(pattern))))
    }

    fn class_iri(&self, path: &FieldPath, value: &Value) -> Result<NamedNode, ContractError> {
        let type_name = value.as_str().ok_or_else(|| ContractError::InvalidValue {
            path: path.to_string(),
            reason: format!("{value} is not a type name"),
        })?;
        Ok(self.schema.type_descriptor(type_name)?.class_iri().clone())
    }

    /// The node a value denotes at the end of `path`: an instance IRI for identifier paths,
    /// otherwise the encoded value.
    fn term(
        &self,
        path: &FieldPath,
        label: &str,
        value: &Value,
    ) -> Result<TermPattern, ContractError> {
        if path.target() == PathTarget::Id {
            return Ok(self.identifier(path, label, value)?.into());
        }
        Ok(match self.codec.encode(label, value)? {
            Term::NamedNode(node) => node.into(),
            Term::Literal(literal) => literal.into(),
            term => {
                return Err(ContractError::InvalidValue {
                    path: label.to_owned(),
                    reason: format!("{term} cannot be matched"),
                })
            }
        })
    }

    fn operand(
        &self,
        path: &FieldPath,
        label: &str,
        value: &Value,
    ) -> Result<Box<Expression>, ContractError> {
        if path.target() == PathTarget::Id {
            return Ok(Box::new(Expression::NamedNode(
                self.identifier(path, label, value)?,
            )));
        }
        Ok(Box::new(self.codec.expression(label, value)?))
    }

    fn operands(
        &self,
        path: &FieldPath,
        label: &str,
        values: &[Value],
    ) -> Result<Vec<Expression>, ContractError> {
        values
            .iter()
            .map(|value| self.operand(path, label, value).map(|operand| *operand))
            .collect()
    }

    fn identifier(
        &self,
        path: &FieldPath,
        label: &str,
        value: &Value,
    ) -> Result<NamedNode, ContractError> {
        let id = match value {
            Value::String(id) => id.as_str(),
            Value::Reference(reference) => reference.id.as_str(),
            other => {
                return Err(ContractError::InvalidValue {
                    path: label.to_owned(),
                    reason: format!("{other} is not an {ID_PROPERTY}"),
                })
            }
        };
        Ok(self.codec.identifier(path.record_type(), id))
    }
}

fn type_triple(node: TermPattern, class: TermPattern) -> TriplePattern {
    TriplePattern {
        subject: node,
        predicate: NamedNodePattern::NamedNode(rdf::TYPE.into_owned()),
        object: class,
    }
}

fn negate_unless(keep: bool, expression: Expression) -> Expression {
    if keep {
        expression
    } else {
        Expression::Not(Box::new(expression))
    }
}

fn order_expression(variable: Variable, descending: bool) -> OrderExpression {
    let expression = Expression::Variable(variable);
    if descending {
        OrderExpression::Desc(expression)
    } else {
        OrderExpression::Asc(expression)
    }
}

fn aggregate_expression(function: AggregateFunction, variable: Variable) -> AggregateExpression {
    let expr = Expression::Variable(variable);
    let (name, distinct, expr) = match function {
        AggregateFunction::Count => (algebra::AggregateFunction::Count, true, expr),
        AggregateFunction::Sum => (algebra::AggregateFunction::Sum, false, expr),
        AggregateFunction::Avg => (algebra::AggregateFunction::Avg, false, expr),
        AggregateFunction::Min => (algebra::AggregateFunction::Min, false, expr),
        AggregateFunction::Max => (algebra::AggregateFunction::Max, false, expr),
        AggregateFunction::Concat => (
            algebra::AggregateFunction::GroupConcat {
                separator: Some(",".to_owned()),
            },
            false,
            Expression::FunctionCall(Function::Str, vec![expr]),
        ),
    };
    AggregateExpression::FunctionCall {
        name,
        expr,
        distinct,
    }
}

fn slice(pattern: GraphPattern, offset: usize, limit: Option<usize>) -> GraphPattern {
    if offset == 0 && limit.is_none() {
        return pattern;
    }
    GraphPattern::Slice {
        inner: Box::new(pattern),
        start: offset,
        length: limit,
    }
}

fn select(pattern: GraphPattern) -> Query {
    Query::Select {
        dataset: None,
        pattern,
        base_iri: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_schema::blog;
    use rdf_mapper_query::QueryValidator;
    use serde_json::{json, Value as Json};

    fn find(raw: Json, options: Json) -> String {
        let schema = blog();
        let validator = QueryValidator::new(&schema);
        let (query, errors) = validator.validate("BlogPost", &raw).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        let (options, errors) = validator.validate_options("BlogPost", &options).unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        QueryCompiler::new(&schema)
            .find(&query, &options)
            .unwrap()
            .to_string()
    }

    #[test]
    fn filters_bind_their_paths() {
        let query = find(json!({"ratting": {"$gt": 3}, "author.name": "john"}), Json::Null);
        assert!(query.contains("?_subject <http://rdf-mapper.org/properties/ratting> ?ratting"));
        assert!(query.contains("?_subject <http://rdf-mapper.org/properties/author> ?author"));
        assert!(query.contains("?author <http://rdf-mapper.org/properties/name> ?author__name"));
        assert!(query.contains("?ratting > \"3\"^^<http://www.w3.org/2001/XMLSchema#decimal>"));
        assert!(query.contains("?author__name = \"john\""));
        assert!(query.contains("ORDER BY ASC(?_subject)"));
        assert!(!query.contains("LIMIT"));
    }

    #[test]
    fn compilation_is_deterministic() {
        let raw = json!({"tags": {"$all": ["a", "b"]}, "title": {"$iregex": "^hello"}});
        let options = json!({"sort": "-ratting", "limit": 10, "offset": 5});
        assert_eq!(find(raw.clone(), options.clone()), find(raw, options));
    }

    #[test]
    fn sort_keys_are_bound_optionally() {
        let query = find(json!({}), json!({"sort": "-ratting", "limit": 10, "offset": 5}));
        assert!(query.contains("OPTIONAL"));
        assert!(query.contains("ORDER BY DESC(?ratting) ASC(?_subject)"));
        assert!(query.contains("OFFSET 5"));
        assert!(query.contains("LIMIT 10"));
    }

    #[test]
    fn existence_tests_use_their_own_variables() {
        let query = find(json!({"comments": {"$exists": false}}), Json::Null);
        assert!(query.contains("EXISTS"));
        assert!(query.contains("?_e0_comments <http://rdf-mapper.org/properties/post> ?_subject"));
        assert!(!query.contains("?comments"));
    }

    #[test]
    fn inverse_identifiers_are_instance_iris() {
        let query = find(json!({"comments._id": "c1"}), Json::Null);
        assert!(query.contains("?comments <http://rdf-mapper.org/properties/post> ?_subject"));
        assert!(query.contains("?comments = <http://rdf-mapper.org/instances/c1>"));
    }

    #[test]
    fn dates_are_constructed() {
        let query = find(json!({"date": {"$gte": "2015-03-01"}}), Json::Null);
        assert!(query.contains(
            "?date >= <http://www.w3.org/2001/XMLSchema#dateTime>(\"2015-03-01T00:00:00\")"
        ));
    }

    #[test]
    fn type_conditions_test_the_asserted_classes() {
        let schema = blog();
        let validator = QueryValidator::new(&schema);
        let (query, errors) = validator
            .validate("Content", &json!({"_type": {"$in": ["BlogPost", "Comment"]}}))
            .unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        let query = QueryCompiler::new(&schema)
            .find(&query, &FindOptions::default())
            .unwrap()
            .to_string();
        assert!(query.contains("<http://rdf-mapper.org/classes/Content>"));
        assert!(query.contains("?_e0_type IN (<http://rdf-mapper.org/classes/BlogPost>"));
    }

    #[test]
    fn count_queries_count_distinct_subjects() {
        let schema = blog();
        let query = QueryCompiler::new(&schema)
            .count(&TypedQuery::all("Comment"))
            .unwrap()
            .to_string();
        assert!(query.contains("COUNT(DISTINCT ?_subject) AS ?_count"));
    }

    #[test]
    fn aggregations_bind_labels() {
        let schema = blog();
        let validator = QueryValidator::new(&schema);
        let (aggregator, errors) = validator
            .validate_aggregator(
                "BlogPost",
                &json!({"author": "author._id", "average": {"$avg": "ratting"}}),
            )
            .unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        let (options, _) = aggregator.validate_options(&json!({"sort": "-average"}));
        let query = QueryCompiler::new(&schema)
            .aggregate(&TypedQuery::all("BlogPost"), &aggregator, &options)
            .unwrap()
            .to_string();
        assert!(query.contains("AVG(?ratting) AS ?_agg_average"));
        assert!(query.contains("GROUP BY ?author"));
        assert!(query.contains("BIND(?author AS ?_agg_author)"));
        assert!(query.contains("ORDER BY DESC(?_agg_average) ASC(?_agg_author)"));
    }

    #[test]
    fn describe_restricts_predicates_to_projected_fields() {
        let schema = blog();
        let compiler = QueryCompiler::new(&schema);
        let query = compiler
            .describe("BlogPost", &["p1".to_owned()], Some(&["title".to_owned()]))
            .unwrap()
            .to_string();
        assert!(query.starts_with("CONSTRUCT { ?_subject ?_predicate ?_object . }"));
        assert!(query.contains("VALUES"));
        assert!(query.contains("<http://rdf-mapper.org/instances/p1>"));
        assert!(query
            .contains("?_predicate IN (<http://www.w3.org/1999/02/22-rdf-syntax-ns#type>"));
        assert!(query.contains("<http://rdf-mapper.org/properties/title>"));

        let error = compiler
            .describe("BlogPost", &[], Some(&["comments".to_owned()]))
            .unwrap_err();
        assert_eq!(
            error,
            ContractError::UnknownProperty {
                type_name: "BlogPost".to_owned(),
                path: "comments".to_owned()
            }
        );
    }
}
