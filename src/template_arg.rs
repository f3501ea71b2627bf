use serde_json::Value;
use sqlx_core::{Error, arguments::Arguments, database::Database, encode::Encode, types::Type};

use crate::parameter::{JdbcType, TypeFamily};

/// Encodes JSON parameter values into a driver's argument buffer.
///
/// # Generic Parameters
/// - `'q`: Lifetime for database arguments
/// - `DB`: Database type implementing [`sqlx::Database`]
pub struct TemplateArg<'q, DB: Database> {
    arguments: DB::Arguments<'q>,
}

impl<'q, DB: Database> Default for TemplateArg<'q, DB> {
    fn default() -> Self {
        TemplateArg {
            arguments: Default::default(),
        }
    }
}

impl<'q, DB> TemplateArg<'q, DB>
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
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes one value.
    ///
    /// Booleans, integers, floats and strings map to their native types;
    /// arrays and objects are sent as JSON text. `null` becomes a typed
    /// null picked from `jdbc_type`, defaulting to a text null.
    pub fn add_value(&mut self, value: Value, jdbc_type: Option<JdbcType>) -> Result<(), Error> {
        let family = jdbc_type.map_or(TypeFamily::Other, JdbcType::family);
        let res = match (value, family) {
            (Value::Null, TypeFamily::Integer) => self.arguments.add(None::<i64>),
            (Value::Null, TypeFamily::Float) => self.arguments.add(None::<f64>),
            (Value::Null, TypeFamily::Boolean) => self.arguments.add(None::<bool>),
            (Value::Null, _) => self.arguments.add(None::<String>),
            (Value::String(s), _) => self.arguments.add(s),
            (v @ (Value::Bool(_) | Value::Number(_)), TypeFamily::Character) => {
                self.arguments.add(v.to_string())
            }
            (Value::Bool(b), _) => self.arguments.add(b),
            (Value::Number(n), TypeFamily::Float) => match n.as_f64() {
                Some(f) => self.arguments.add(f),
                None => self.arguments.add(n.to_string()),
            },
            (Value::Number(n), _) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => self.arguments.add(i),
                (None, Some(f)) if !n.is_u64() => self.arguments.add(f),
                _ => self.arguments.add(n.to_string()),
            },
            (other, _) => self.arguments.add(other.to_string()),
        };
        res.map_err(Error::Encode)
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.len() == 0
    }

    /// Takes ownership of the encoded arguments
    pub fn into_arguments(self) -> DB::Arguments<'q> {
        self.arguments
    }
}
