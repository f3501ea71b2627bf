use serde::Serialize;
use serde_json::{Map, Value};
use sqlx_core::{database::Database, encode::Encode, types::Type};

use crate::{
    BoundSql, Error, SqlTemplateExecute,
    config::Configuration,
    context::{Composer, DynamicContext},
    parameter::ParameterMapping,
    sql_node::SqlNode,
};

/// A statement tree ready to be composed against parameters.
///
/// Trees without dynamic nodes are composed once, when the source is built,
/// and every call returns that result.
#[derive(Debug, Clone)]
pub struct SqlSource {
    root: SqlNode,
    config: Configuration,
    precomputed: Option<(String, Vec<ParameterMapping>)>,
}

impl SqlSource {
    /// Validates every expression and placeholder in `root`.
    ///
    /// # Errors
    /// Build errors for malformed placeholders or expressions.
    pub fn new(root: SqlNode, config: Configuration) -> Result<Self, Error> {
        root.validate(config.evaluator())?;
        let precomputed = if root.is_dynamic() {
            None
        } else {
            let (sql, mappings, _) = compose(&root, &config, &Value::Null)?;
            tracing::debug!(sql = %sql, mappings = mappings.len(), "precomputed static sql");
            Some((sql, mappings))
        };
        Ok(SqlSource {
            root,
            config,
            precomputed,
        })
    }

    pub fn root(&self) -> &SqlNode {
        &self.root
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn is_dynamic(&self) -> bool {
        self.precomputed.is_none()
    }

    /// Composes the statement for `parameter`.
    pub fn get_bound_sql(&self, parameter: &Value) -> Result<BoundSql, Error> {
        let database_id = self
            .config
            .database_id()
            .map_or(Value::Null, Value::from);
        let (sql, mappings, bindings) = match &self.precomputed {
            Some((sql, mappings)) => (sql.clone(), mappings.clone(), Map::new()),
            None => {
                let composed = compose(&self.root, &self.config, parameter)?;
                tracing::trace!(sql = %composed.0, mappings = composed.1.len(), "composed sql");
                composed
            }
        };
        Ok(BoundSql::new(sql, mappings, bindings).with_database_id(database_id))
    }

    /// Like [`get_bound_sql`](Self::get_bound_sql) for any serializable
    /// parameter.
    pub fn get_bound_sql_for<T: Serialize + ?Sized>(
        &self,
        parameter: &T,
    ) -> Result<BoundSql, Error> {
        self.get_bound_sql(&serde_json::to_value(parameter)?)
    }

    /// Composes the statement, encodes its arguments and returns an
    /// executable query over `sql_buffer`.
    pub fn render_execute_able<'q, DB>(
        &self,
        parameter: &Value,
        sql_buffer: &'q mut String,
    ) -> Result<SqlTemplateExecute<'q, DB>, Error>
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
        let bound = self.get_bound_sql(parameter)?;
        let arguments = bound.to_arguments::<DB>(parameter, self.config.evaluator())?;
        let (sql, mappings, _) = bound.into_parts();
        *sql_buffer = sql;
        Ok(SqlTemplateExecute::new(sql_buffer, Some(arguments)).with_marker_count(mappings.len()))
    }
}

fn compose(
    root: &SqlNode,
    config: &Configuration,
    parameter: &Value,
) -> Result<(String, Vec<ParameterMapping>, Map<String, Value>), Error> {
    let database_id = config.database_id().map_or(Value::Null, Value::from);
    let mut composer = Composer::new(config);
    let mut ctx = DynamicContext::new(parameter, &database_id);
    root.apply(&mut ctx, &mut composer)?;
    let sql = if config.shrink_whitespaces_in_sql() {
        ctx.sql().split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        ctx.sql().to_string()
    };
    Ok((sql, composer.into_mappings(), ctx.into_bindings()))
}
