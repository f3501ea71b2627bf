use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::{
    Bindings, ExpressionError, ExpressionEvaluator, is_truthy,
    parser::{BinaryOp, Expr, Method, parse},
};
use crate::property::to_text;

/// Evaluates the expression language parsed by [`parse`].
///
/// Walking a member or index of `null` yields `null`, so
/// `user.address.city != null` is safe on a partial parameter.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEvaluator;

impl ExpressionEvaluator for DefaultEvaluator {
    fn evaluate_value(
        &self,
        expression: &str,
        bindings: &dyn Bindings,
    ) -> Result<Value, ExpressionError> {
        let expr = parse(expression)?;
        eval(&expr, bindings).map_err(|message| ExpressionError::Evaluation {
            expression: expression.to_string(),
            message,
        })
    }

    fn validate(&self, expression: &str) -> Result<(), ExpressionError> {
        parse(expression).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Num::Int)
                .or_else(|| n.as_f64().map(Num::Float)),
            _ => None,
        }
    }

    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        text.parse::<i64>()
            .map(Num::Int)
            .ok()
            .or_else(|| text.parse::<f64>().ok().map(Num::Float))
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn compare(self, other: Num) -> Option<Ordering> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }

    fn into_value(self) -> Result<Value, String> {
        match self {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| format!("{f} is not a finite number")),
        }
    }
}

fn eval(expr: &Expr, bindings: &dyn Bindings) -> Result<Value, String> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Variable(name) => Ok(bindings.lookup(name).cloned().unwrap_or(Value::Null)),
        Expr::Member(base, name) => match eval(base, bindings)? {
            Value::Null => Ok(Value::Null),
            Value::Object(mut map) => Ok(map.remove(name).unwrap_or(Value::Null)),
            other => Err(format!("cannot read property '{name}' of {other}")),
        },
        Expr::Index(base, index) => {
            let base = eval(base, bindings)?;
            let index = eval(index, bindings)?;
            match (base, index) {
                (Value::Null, _) => Ok(Value::Null),
                (Value::Array(mut items), Value::Number(n)) => {
                    let i = n
                        .as_u64()
                        .ok_or_else(|| format!("invalid list index {n}"))?;
                    let i = usize::try_from(i).map_err(|e| e.to_string())?;
                    if i < items.len() {
                        Ok(items.swap_remove(i))
                    } else {
                        Ok(Value::Null)
                    }
                }
                (Value::Object(mut map), key) => {
                    Ok(map.remove(to_text(&key).as_str()).unwrap_or(Value::Null))
                }
                (base, index) => Err(format!("cannot index {base} with {index}")),
            }
        }
        Expr::Call(base, method) => call(eval(base, bindings)?, *method),
        Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&eval(inner, bindings)?))),
        Expr::Negate(inner) => match eval(inner, bindings)? {
            v @ Value::Number(_) => match Num::of(&v) {
                Some(Num::Int(i)) => i
                    .checked_neg()
                    .map(Value::from)
                    .ok_or_else(|| format!("cannot negate {i}")),
                Some(Num::Float(f)) => Num::Float(-f).into_value(),
                None => Err(format!("cannot negate {v}")),
            },
            other => Err(format!("cannot negate {other}")),
        },
        Expr::Binary(left, BinaryOp::Or, right) => Ok(Value::Bool(
            is_truthy(&eval(left, bindings)?) || is_truthy(&eval(right, bindings)?),
        )),
        Expr::Binary(left, BinaryOp::And, right) => Ok(Value::Bool(
            is_truthy(&eval(left, bindings)?) && is_truthy(&eval(right, bindings)?),
        )),
        Expr::Binary(left, op, right) => {
            let left = eval(left, bindings)?;
            let right = eval(right, bindings)?;
            binary(&left, *op, &right)
        }
    }
}

fn call(base: Value, method: Method) -> Result<Value, String> {
    match (method, base) {
        (Method::Size, Value::Array(items)) => Ok(Value::from(items.len())),
        (Method::Size, Value::Object(map)) => Ok(Value::from(map.len())),
        (Method::Size, Value::String(s)) => Ok(Value::from(s.chars().count())),
        (Method::IsEmpty, Value::Array(items)) => Ok(Value::Bool(items.is_empty())),
        (Method::IsEmpty, Value::Object(map)) => Ok(Value::Bool(map.is_empty())),
        (Method::IsEmpty, Value::String(s)) => Ok(Value::Bool(s.is_empty())),
        (Method::Trim, Value::String(s)) => Ok(Value::String(s.trim().to_string())),
        (Method::ToUpperCase, Value::String(s)) => Ok(Value::String(s.to_uppercase())),
        (Method::ToLowerCase, Value::String(s)) => Ok(Value::String(s.to_lowercase())),
        (method, base) => Err(format!("cannot call {method:?} on {base}")),
    }
}

fn binary(left: &Value, op: BinaryOp, right: &Value) -> Result<Value, String> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::Lt => compare(left, right).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::Le => compare(left, right).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::Gt => compare(left, right).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::Ge => compare(left, right).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::Add if left.is_string() || right.is_string() => {
            Ok(Value::String(format!("{}{}", to_text(left), to_text(right))))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
                return Err(format!("cannot apply {op:?} to {left} and {right}"));
            };
            arithmetic(a, op, b)?.into_value()
        }
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match op {
            BinaryOp::And => is_truthy(left) && is_truthy(right),
            _ => is_truthy(left) || is_truthy(right),
        })),
    }
}

fn arithmetic(a: Num, op: BinaryOp, b: Num) -> Result<Num, String> {
    let overflow = || format!("integer overflow in {op:?}");
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => {
            let result = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                BinaryOp::Mul => x.checked_mul(y),
                BinaryOp::Div | BinaryOp::Rem if y == 0 => return Err("division by zero".into()),
                BinaryOp::Div => x.checked_div(y),
                _ => x.checked_rem(y),
            };
            result.map(Num::Int).ok_or_else(overflow)
        }
        (a, b) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Ok(Num::Float(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                _ => x % y,
            }))
        }
    }
}

/// Equality across representations: `1 == 1.0`, `'5' == 5`, `'true' == true`.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::Number(_)) => {
            numbers(left, right).is_some_and(|(a, b)| a.compare(b) == Some(Ordering::Equal))
        }
        (Value::String(s), n @ Value::Number(_)) | (n @ Value::Number(_), Value::String(s)) => {
            match (Num::parse(s), Num::of(n)) {
                (Some(a), Some(b)) => a.compare(b) == Some(Ordering::Equal),
                _ => false,
            }
        }
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => {
            s.eq_ignore_ascii_case(if *b { "true" } else { "false" })
        }
        _ => left == right,
    }
}

fn numbers(left: &Value, right: &Value) -> Option<(Num, Num)> {
    Some((Num::of(left)?, Num::of(right)?))
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, String> {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::String(s), n @ Value::Number(_)) => {
            Num::parse(s).zip(Num::of(n)).and_then(|(a, b)| a.compare(b))
        }
        (n @ Value::Number(_), Value::String(s)) => {
            Num::of(n).zip(Num::parse(s)).and_then(|(a, b)| a.compare(b))
        }
        _ => numbers(left, right).and_then(|(a, b)| a.compare(b)),
    };
    ordering.ok_or_else(|| format!("cannot compare {left} with {right}"))
}
