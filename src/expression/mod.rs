//! Expression evaluation used by `test=`, collection and bind attributes.
//!
//! The composition core only talks to [`ExpressionEvaluator`]; the crate ships
//! [`DefaultEvaluator`] as the stock implementation.

mod evaluator;
mod parser;

pub use evaluator::DefaultEvaluator;
pub use parser::{BinaryOp, Expr, Method, parse};

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("malformed expression '{expression}' at position {position}")]
    Syntax { expression: String, position: usize },
    #[error("error evaluating expression '{expression}': {message}")]
    Evaluation { expression: String, message: String },
    #[error("the expression '{expression}' evaluated to a null value")]
    NullValue { expression: String },
    #[error("error evaluating expression '{expression}', return value ({found}) was not iterable")]
    NotIterable { expression: String, found: String },
}

/// Read-only view of the names visible to an expression.
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl Bindings for serde_json::Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// `(index or key, item)` pairs produced by a loop collection.
pub type CollectionEntries = Vec<(Value, Value)>;

pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate_value(
        &self,
        expression: &str,
        bindings: &dyn Bindings,
    ) -> Result<Value, ExpressionError>;

    fn evaluate_boolean(
        &self,
        expression: &str,
        bindings: &dyn Bindings,
    ) -> Result<bool, ExpressionError> {
        Ok(is_truthy(&self.evaluate_value(expression, bindings)?))
    }

    /// Arrays yield `(position, element)`, objects yield `(key, value)`.
    ///
    /// `null` is `Ok(None)` only when `nullable`; otherwise it is a
    /// [`ExpressionError::NullValue`].
    fn evaluate_iterable(
        &self,
        expression: &str,
        bindings: &dyn Bindings,
        nullable: bool,
    ) -> Result<Option<CollectionEntries>, ExpressionError> {
        match self.evaluate_value(expression, bindings)? {
            Value::Null if nullable => Ok(None),
            Value::Null => Err(ExpressionError::NullValue {
                expression: expression.to_string(),
            }),
            Value::Array(items) => Ok(Some(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (Value::from(i), item))
                    .collect(),
            )),
            Value::Object(map) => Ok(Some(
                map.into_iter()
                    .map(|(key, item)| (Value::String(key), item))
                    .collect(),
            )),
            other => Err(ExpressionError::NotIterable {
                expression: expression.to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Checks an expression once when a statement is built.
    fn validate(&self, _expression: &str) -> Result<(), ExpressionError> {
        Ok(())
    }
}

/// `null`, `false` and numeric zero are false; everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f != 0.0),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!("")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn iterable_shapes() {
        let scope = json!({"ids": [3, 4], "attrs": {"a": 1}, "name": "x"});
        let Value::Object(scope) = scope else {
            unreachable!()
        };
        let evaluator = DefaultEvaluator;
        assert_eq!(
            evaluator.evaluate_iterable("ids", &scope, false),
            Ok(Some(vec![(json!(0), json!(3)), (json!(1), json!(4))]))
        );
        assert_eq!(
            evaluator.evaluate_iterable("attrs", &scope, false),
            Ok(Some(vec![(json!("a"), json!(1))]))
        );
        assert_eq!(evaluator.evaluate_iterable("missing", &scope, true), Ok(None));
        assert!(matches!(
            evaluator.evaluate_iterable("missing", &scope, false),
            Err(ExpressionError::NullValue { .. })
        ));
        assert!(matches!(
            evaluator.evaluate_iterable("name", &scope, false),
            Err(ExpressionError::NotIterable { .. })
        ));
    }
}
