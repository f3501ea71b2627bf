use serde_json::Value;

use crate::{BoundSql, Error, parameter::ParameterMapping};

pub mod sql_utils;

/// Database type enumeration supporting major database systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DBType {
    /// PostgreSQL database
    PostgreSQL,
    /// MySQL database
    MySQL,
    /// SQLite database
    SQLite,
}

impl DBType {
    /// Creates a DBType instance from a sqlx backend name
    ///
    /// # Errors
    /// Returns an error for unsupported database types
    pub fn new(db_name: &str) -> Result<Self, Error> {
        match db_name {
            "PostgreSQL" => Ok(Self::PostgreSQL),
            "MySQL" => Ok(Self::MySQL),
            "SQLite" => Ok(Self::SQLite),
            _ => Err(format!("unsupported db `{db_name}`").into()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Gets placeholder generation function for parameter binding
    ///
    /// Database-specific placeholder formats:
    /// - PostgreSQL: $1, $2...
    /// - MySQL/SQLite: ?
    pub fn get_encode_placeholder_fn(&self) -> Option<fn(usize, &mut String)> {
        match self {
            Self::PostgreSQL => Some(|i: usize, s: &mut String| s.push_str(&format!("${i}"))),
            Self::MySQL | Self::SQLite => Some(|_: usize, s: &mut String| s.push('?')),
        }
    }

    /// Wraps the statement in a count query.
    ///
    /// A trailing outer `ORDER BY` is dropped first, unless it holds
    /// parameter markers.
    pub fn write_count_sql(&self, bound: &mut BoundSql) {
        match self {
            Self::PostgreSQL | Self::MySQL | Self::SQLite => pg_mysql_sqlite_count_sql(bound),
        }
    }

    /// Appends `limit`/`offset` markers and their mappings.
    ///
    /// Page size and page number are clamped to at least 1.
    pub fn write_page_sql(&self, bound: &mut BoundSql, page_size: i64, page_no: i64) {
        match self {
            Self::PostgreSQL | Self::MySQL | Self::SQLite => {
                let f = self.get_encode_placeholder_fn();
                pg_mysql_sqlite_page_sql(bound, page_size, page_no, f)
            }
        }
    }
}

fn pg_mysql_sqlite_count_sql(bound: &mut BoundSql) {
    let sql = bound.sql_mut();
    let cut = sql_utils::truncate_sql_at_outer_order_by(sql);
    let body = if sql[cut.len()..].contains(['?', '$']) {
        sql.as_str()
    } else {
        cut.trim_end()
    };
    *sql = format!("select count(1) from ({body}) t");
}

fn pg_mysql_sqlite_page_sql(
    bound: &mut BoundSql,
    page_size: i64,
    page_no: i64,
    f: Option<fn(usize, &mut String)>,
) {
    let page_size = page_size.max(1);
    let page_no = page_no.max(1);
    let offset = (page_no - 1).saturating_mul(page_size);
    for (keyword, value) in [(" limit ", page_size), (" offset ", offset)] {
        bound.push_mapping(ParameterMapping::synthesized(keyword.trim(), Value::from(value)));
        let index = bound.parameter_mappings().len();
        let sql = bound.sql_mut();
        sql.push_str(keyword);
        match f {
            Some(f) => f(index, sql),
            None => sql.push('?'),
        }
    }
}
