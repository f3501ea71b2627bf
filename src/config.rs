use std::{fmt, sync::Arc};

use regex::Regex;

use crate::{
    Error,
    db_adapter::DBType,
    expression::{DefaultEvaluator, ExpressionEvaluator},
};

/// Settings shared by every [`SqlSource`](crate::SqlSource) built from it.
#[derive(Clone)]
pub struct Configuration {
    evaluator: Arc<dyn ExpressionEvaluator>,
    encode_placeholder_fn: Option<fn(usize, &mut String)>,
    shrink_whitespaces_in_sql: bool,
    nullable_on_for_each: bool,
    database_id: Option<String>,
    injection_filter: Option<(Regex, String)>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            evaluator: Arc::new(DefaultEvaluator),
            encode_placeholder_fn: None,
            shrink_whitespaces_in_sql: false,
            nullable_on_for_each: false,
            database_id: None,
            injection_filter: None,
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("encode_placeholder_fn", &self.encode_placeholder_fn.is_some())
            .field("shrink_whitespaces_in_sql", &self.shrink_whitespaces_in_sql)
            .field("nullable_on_for_each", &self.nullable_on_for_each)
            .field("database_id", &self.database_id)
            .field(
                "injection_filter",
                &self.injection_filter.as_ref().map(|(_, p)| p),
            )
            .finish_non_exhaustive()
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the placeholder style of `db_type` and its backend name as the
    /// database id.
    pub fn for_db_type(db_type: &DBType) -> Self {
        Configuration {
            encode_placeholder_fn: db_type.get_encode_placeholder_fn(),
            database_id: Some(db_type.backend_name().to_string()),
            ..Self::default()
        }
    }

    pub fn set_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Sets custom placeholder formatting function
    ///
    /// The function receives the 1-based parameter index and appends the
    /// marker (`?`, `$1`, ...) to the buffer. Without one, `?` is written.
    pub fn set_encode_placeholder_fn(mut self, f: fn(usize, &mut String)) -> Self {
        self.encode_placeholder_fn = Some(f);
        self
    }

    /// Collapses every whitespace run in composed SQL into one space.
    pub fn set_shrink_whitespaces_in_sql(mut self, shrink: bool) -> Self {
        self.shrink_whitespaces_in_sql = shrink;
        self
    }

    /// Default for loops that do not say whether a missing collection is
    /// allowed.
    pub fn set_nullable_on_for_each(mut self, nullable: bool) -> Self {
        self.nullable_on_for_each = nullable;
        self
    }

    pub fn set_database_id(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = Some(database_id.into());
        self
    }

    /// Every `${...}` value must match `pattern` in full.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInjectionFilter`] if `pattern` does not compile.
    pub fn set_injection_filter(mut self, pattern: &str) -> Result<Self, Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        self.injection_filter = Some((regex, pattern.to_string()));
        Ok(self)
    }

    pub fn evaluator(&self) -> &dyn ExpressionEvaluator {
        self.evaluator.as_ref()
    }

    pub fn encode_placeholder_fn(&self) -> Option<fn(usize, &mut String)> {
        self.encode_placeholder_fn
    }

    pub fn shrink_whitespaces_in_sql(&self) -> bool {
        self.shrink_whitespaces_in_sql
    }

    pub fn nullable_on_for_each(&self) -> bool {
        self.nullable_on_for_each
    }

    pub fn database_id(&self) -> Option<&str> {
        self.database_id.as_deref()
    }

    /// Checks an interpolated value against the injection filter.
    pub(crate) fn check_injection(&self, value: &str) -> Result<(), Error> {
        match &self.injection_filter {
            Some((regex, pattern)) if !regex.is_match(value) => Err(Error::InjectionRejected {
                value: value.to_string(),
                pattern: pattern.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Writes the marker for the `index`-th (1-based) parameter.
    pub(crate) fn write_placeholder(&self, index: usize, sql: &mut String) {
        match self.encode_placeholder_fn {
            Some(f) => f(index, sql),
            None => sql.push('?'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injection_filter_matches_whole_value() {
        let config = Configuration::new()
            .set_injection_filter("[a-zA-Z0-9_ ,.]+")
            .unwrap();
        assert!(config.check_injection("name desc, id").is_ok());
        assert!(matches!(
            config.check_injection("name; drop table users"),
            Err(Error::InjectionRejected { .. })
        ));
        assert!(Configuration::new().check_injection("anything;").is_ok());
    }

    #[test]
    fn bad_filter_fails_to_build() {
        assert!(matches!(
            Configuration::new().set_injection_filter("(unclosed"),
            Err(Error::InvalidInjectionFilter(_))
        ));
    }

    #[test]
    fn placeholder_style_follows_db_type() {
        let mut sql = String::new();
        let pg = Configuration::for_db_type(&DBType::PostgreSQL);
        pg.write_placeholder(3, &mut sql);
        Configuration::new().write_placeholder(4, &mut sql);
        assert_eq!(sql, "$3?");
        assert_eq!(pg.database_id(), Some("PostgreSQL"));
    }
}
