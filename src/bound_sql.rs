use serde_json::{Map, Value};
use sqlx_core::{database::Database, encode::Encode, types::Type};

use crate::{
    Error,
    context::DynamicContext,
    expression::{Bindings, ExpressionEvaluator},
    parameter::ParameterMapping,
    property::{get_value, split_root},
    template_arg::TemplateArg,
};

/// A composed statement: SQL with positional markers, one mapping per
/// marker, and the values bound at the root of the template.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    sql: String,
    parameter_mappings: Vec<ParameterMapping>,
    additional_parameters: Map<String, Value>,
    database_id: Value,
}

impl BoundSql {
    pub fn new(
        sql: String,
        parameter_mappings: Vec<ParameterMapping>,
        additional_parameters: Map<String, Value>,
    ) -> Self {
        BoundSql {
            sql,
            parameter_mappings,
            additional_parameters,
            database_id: Value::Null,
        }
    }

    pub(crate) fn with_database_id(mut self, database_id: Value) -> Self {
        self.database_id = database_id;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_mappings(&self) -> &[ParameterMapping] {
        &self.parameter_mappings
    }

    pub fn additional_parameters(&self) -> &Map<String, Value> {
        &self.additional_parameters
    }

    /// Resolves a property path against the root bindings.
    pub fn additional_parameter(&self, path: &str) -> Option<&Value> {
        let (root, rest) = split_root(path);
        self.additional_parameters
            .get(root)
            .and_then(|value| get_value(value, rest))
    }

    pub fn has_additional_parameter(&self, path: &str) -> bool {
        let (root, _) = split_root(path);
        self.additional_parameters.contains_key(root)
    }

    pub fn into_parts(self) -> (String, Vec<ParameterMapping>, Map<String, Value>) {
        (self.sql, self.parameter_mappings, self.additional_parameters)
    }

    pub(crate) fn sql_mut(&mut self) -> &mut String {
        &mut self.sql
    }

    pub(crate) fn push_mapping(&mut self, mapping: ParameterMapping) {
        self.parameter_mappings.push(mapping);
    }

    /// One value per mapping, in order.
    ///
    /// A mapping resolves to, in order of preference: the value it captured
    /// during composition, its expression, a root binding, the parameter
    /// itself when it is a scalar or `null`, or its property path against
    /// the parameter. Missing paths resolve to `null`.
    pub fn parameter_values(
        &self,
        parameter: &Value,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<Vec<Value>, Error> {
        let mut ctx = DynamicContext::new(parameter, &self.database_id);
        for (name, value) in &self.additional_parameters {
            ctx.bind(name.clone(), value.clone());
        }
        self.parameter_mappings
            .iter()
            .map(|mapping| -> Result<Value, Error> {
                if let Some(value) = mapping.value() {
                    return Ok(value.clone());
                }
                if let Some(expression) = mapping.expression() {
                    return Ok(evaluator.evaluate_value(expression, &ctx)?);
                }
                let property = mapping.property();
                if self.has_additional_parameter(property) {
                    return Ok(self.additional_parameter(property).cloned().unwrap_or_default());
                }
                if !matches!(parameter, Value::Object(_) | Value::Array(_)) {
                    return Ok(parameter.clone());
                }
                let (root, rest) = split_root(property);
                Ok(ctx
                    .lookup(root)
                    .and_then(|value| get_value(value, rest))
                    .cloned()
                    .unwrap_or_default())
            })
            .collect()
    }

    /// Encodes [`parameter_values`](Self::parameter_values) into the
    /// driver's argument buffer, using each mapping's type tag for nulls.
    pub fn to_arguments<'q, DB>(
        &self,
        parameter: &Value,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<DB::Arguments<'q>, Error>
    where
        DB: Database,
        bool: Encode<'q, DB> + Type<DB>,
        i64: Encode<'q, DB> + Type<DB>,
        f64: Encode<'q, DB> + Type<DB>,
        String: Encode<'q, DB> + Type<DB>,
        Option<bool>: Encode<'q, DB>,
        Option<i64>: Encode<'q, DB>,
        Option<f64>: Encode<'q, DB>,
        Option<String>: Encode<'q, DB>,
    {
        let values = self.parameter_values(parameter, evaluator)?;
        let mut arg = TemplateArg::<DB>::new();
        for (mapping, value) in self.parameter_mappings.iter().zip(values) {
            arg.add_value(value, mapping.jdbc_type())?;
        }
        Ok(arg.into_arguments())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::DefaultEvaluator;
    use serde_json::json;

    fn bound(mappings: Vec<ParameterMapping>, extra: Value) -> BoundSql {
        let Value::Object(extra) = extra else {
            unreachable!()
        };
        BoundSql::new("select 1".into(), mappings, extra)
    }

    #[test]
    fn resolution_order() {
        let b = bound(
            vec![
                ParameterMapping::synthesized("id", json!(99)),
                ParameterMapping::parse("(age + 1)").unwrap(),
                ParameterMapping::new("pattern"),
                ParameterMapping::new("user.name"),
                ParameterMapping::new("user.missing"),
                ParameterMapping::new("_parameter.age"),
            ],
            json!({"pattern": "%a%"}),
        );
        let param = json!({"id": 1, "age": 40, "user": {"name": "Ann"}});
        let values = b.parameter_values(&param, &DefaultEvaluator).unwrap();
        assert_eq!(
            values,
            vec![
                json!(99),
                json!(41),
                json!("%a%"),
                json!("Ann"),
                Value::Null,
                json!(40)
            ]
        );
    }

    #[test]
    fn scalar_parameter_binds_itself() {
        let b = bound(vec![ParameterMapping::new("whatever")], json!({}));
        assert_eq!(
            b.parameter_values(&json!("x"), &DefaultEvaluator).unwrap(),
            vec![json!("x")]
        );
        assert_eq!(
            b.parameter_values(&Value::Null, &DefaultEvaluator).unwrap(),
            vec![Value::Null]
        );
    }

    #[test]
    fn list_parameter_aliases() {
        let b = bound(vec![ParameterMapping::new("list[1]")], json!({}));
        assert_eq!(
            b.parameter_values(&json!([5, 6]), &DefaultEvaluator).unwrap(),
            vec![json!(6)]
        );
    }

    #[test]
    fn additional_parameter_paths() {
        let b = bound(vec![], json!({"user": {"id": 3}}));
        assert!(b.has_additional_parameter("user.id"));
        assert_eq!(b.additional_parameter("user.id"), Some(&json!(3)));
        assert_eq!(b.additional_parameter("user.name"), None);
        assert!(!b.has_additional_parameter("id"));
    }
}
