use futures_core::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use sqlx_core::{
    Error,
    arguments::IntoArguments,
    database::{Database, HasStatementCache},
    executor::{Execute, Executor},
    from_row::FromRow,
    query::{Map, Query, query, query_with},
    query_as::{QueryAs, query_as, query_as_with},
};

use crate::BoundSql;

/// A composed statement bound to its encoded arguments, ready for any sqlx
/// executor.
pub struct SqlTemplateExecute<'q, DB: Database> {
    sql: &'q str,
    arguments: Option<DB::Arguments<'q>>,
    marker_count: usize,
    persistent: bool,
}

impl<'q, DB: Database> Clone for SqlTemplateExecute<'q, DB>
where
    DB::Arguments<'q>: Clone,
{
    fn clone(&self) -> Self {
        SqlTemplateExecute {
            sql: self.sql,
            arguments: self.arguments.clone(),
            marker_count: self.marker_count,
            persistent: self.persistent,
        }
    }
}

impl<'q, DB: Database> SqlTemplateExecute<'q, DB> {
    /// Wraps raw SQL. The marker count is unknown and reported as zero.
    pub fn new(sql: &'q str, arguments: Option<DB::Arguments<'q>>) -> Self {
        SqlTemplateExecute {
            sql,
            arguments,
            marker_count: 0,
            persistent: true,
        }
    }

    /// Wraps a composed statement and the arguments encoded from it with
    /// [`BoundSql::to_arguments`].
    pub fn from_bound(bound: &'q BoundSql, arguments: DB::Arguments<'q>) -> Self {
        SqlTemplateExecute {
            sql: bound.sql(),
            arguments: Some(arguments),
            marker_count: bound.parameter_mappings().len(),
            persistent: true,
        }
    }

    pub(crate) fn with_marker_count(mut self, marker_count: usize) -> Self {
        self.marker_count = marker_count;
        self
    }

    /// Number of parameter markers in the statement, when built from a
    /// [`BoundSql`].
    pub fn marker_count(&self) -> usize {
        self.marker_count
    }

    /// If `true`, the statement will get prepared once and cached to the
    /// connection's statement cache.
    ///
    /// If `false`, the prepared statement will be closed after execution.
    ///
    /// Default: `true`.
    pub fn set_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }
}

impl<'q, DB> SqlTemplateExecute<'q, DB>
where
    DB: Database + HasStatementCache,
    DB::Arguments<'q>: IntoArguments<'q, DB>,
{
    /// Converts into a `QueryAs` that maps rows through [`FromRow`].
    #[inline]
    pub fn to_query_as<O>(self) -> QueryAs<'q, DB, O, DB::Arguments<'q>>
    where
        O: Send + Unpin + for<'r> FromRow<'r, DB::Row>,
    {
        let q = match self.arguments {
            Some(args) => query_as_with(self.sql, args),
            None => query_as(self.sql),
        };
        q.persistent(self.persistent)
    }

    #[inline]
    pub fn to_query(self) -> Query<'q, DB, DB::Arguments<'q>> {
        let q = match self.arguments {
            Some(args) => query_with(self.sql, args),
            None => query(self.sql),
        };
        q.persistent(self.persistent)
    }

    /// like sqlx_core::Query::map
    #[inline]
    pub fn map<F, O>(
        self,
        f: F,
    ) -> Map<'q, DB, impl FnMut(DB::Row) -> Result<O, Error> + Send, DB::Arguments<'q>>
    where
        F: FnMut(DB::Row) -> O + Send,
        O: Unpin,
    {
        self.to_query().map(f)
    }

    /// like sqlx_core::Query::try_map
    #[inline]
    pub fn try_map<F, O>(self, f: F) -> Map<'q, DB, F, DB::Arguments<'q>>
    where
        F: FnMut(DB::Row) -> Result<O, Error> + Send,
        O: Unpin,
    {
        self.to_query().try_map(f)
    }
}

impl<'q, DB> SqlTemplateExecute<'q, DB>
where
    DB: Database,
{
    /// Execute the query and return the number of rows affected.
    #[inline]
    pub async fn execute<'e, 'c: 'e, E>(self, executor: E) -> Result<DB::QueryResult, Error>
    where
        'q: 'e,
        DB::Arguments<'q>: 'e,
        E: Executor<'c, Database = DB>,
    {
        executor.execute(self).await
    }

    /// Execute the query and return the generated results as a stream.
    #[inline]
    pub fn fetch<'e, 'c: 'e, E>(self, executor: E) -> BoxStream<'e, Result<DB::Row, Error>>
    where
        'q: 'e,
        DB::Arguments<'q>: 'e,
        E: Executor<'c, Database = DB>,
    {
        executor.fetch(self)
    }

    /// Execute the query and return all the resulting rows collected into a [`Vec`].
    ///
    /// ### Note: beware result set size.
    /// This will attempt to collect the full result set of the query into memory.
    #[inline]
    pub async fn fetch_all<'e, 'c: 'e, E>(self, executor: E) -> Result<Vec<DB::Row>, Error>
    where
        'q: 'e,
        DB::Arguments<'q>: 'e,
        E: Executor<'c, Database = DB>,
    {
        executor.fetch_all(self).await
    }

    /// Execute the query, returning the first row or [`Error::RowNotFound`] otherwise.
    #[inline]
    pub async fn fetch_one<'e, 'c: 'e, E>(self, executor: E) -> Result<DB::Row, Error>
    where
        'q: 'e,
        DB::Arguments<'q>: 'e,
        E: Executor<'c, Database = DB>,
    {
        executor.fetch_one(self).await
    }

    /// Execute the query, returning the first row or `None` otherwise.
    #[inline]
    pub async fn fetch_optional<'e, 'c: 'e, E>(self, executor: E) -> Result<Option<DB::Row>, Error>
    where
        'q: 'e,
        DB::Arguments<'q>: 'e,
        E: Executor<'c, Database = DB>,
    {
        executor.fetch_optional(self).await
    }

    /// like sqlx_core::QueryAs::fetch
    pub fn fetch_as<'e, 'c: 'e, O, E>(self, executor: E) -> BoxStream<'e, Result<O, Error>>
    where
        'q: 'e,
        DB::Arguments<'q>: 'e,
        E: 'e + Executor<'c, Database = DB>,
        DB: 'e,
        O: Send + Unpin + for<'r> FromRow<'r, DB::Row> + 'e,
    {
        executor
            .fetch(self)
            .map(|row| row.and_then(|row| O::from_row(&row)))
            .boxed()
    }

    /// like sqlx_core::QueryAs::fetch_all
    #[inline]
    pub async fn fetch_all_as<'e, 'c: 'e, O, E>(self, executor: E) -> Result<Vec<O>, Error>
    where
        'q: 'e,
        DB::Arguments<'q>: 'e,
        E: 'e + Executor<'c, Database = DB>,
        DB: 'e,
        O: Send + Unpin + for<'r> FromRow<'r, DB::Row> + 'e,
    {
        self.fetch_as(executor).try_collect().await
    }

    /// like sqlx_core::QueryAs::fetch_one
    pub async fn fetch_one_as<'e, 'c: 'e, O, E>(self, executor: E) -> Result<O, Error>
    where
        'q: 'e,
        DB::Arguments<'q>: 'e,
        E: 'e + Executor<'c, Database = DB>,
        DB: 'e,
        O: Send + Unpin + for<'r> FromRow<'r, DB::Row> + 'e,
    {
        self.fetch_optional_as(executor)
            .await
            .and_then(|row| row.ok_or(Error::RowNotFound))
    }

    /// like sqlx_core::QueryAs::fetch_optional
    pub async fn fetch_optional_as<'e, 'c: 'e, O, E>(self, executor: E) -> Result<Option<O>, Error>
    where
        'q: 'e,
        DB::Arguments<'q>: 'e,
        E: 'e + Executor<'c, Database = DB>,
        DB: 'e,
        O: Send + Unpin + for<'r> FromRow<'r, DB::Row> + 'e,
    {
        match executor.fetch_optional(self).await? {
            Some(row) => O::from_row(&row).map(Some),
            None => Ok(None),
        }
    }
}

impl<'q, DB: Database> Execute<'q, DB> for SqlTemplateExecute<'q, DB> {
    #[inline]
    fn sql(&self) -> &'q str {
        tracing::debug!(sql = self.sql, markers = self.marker_count, "executing sql");
        self.sql
    }

    #[inline]
    fn statement(&self) -> Option<&DB::Statement<'q>> {
        None
    }

    #[inline]
    fn take_arguments(
        &mut self,
    ) -> Result<Option<DB::Arguments<'q>>, sqlx_core::error::BoxDynError> {
        Ok(self.arguments.take())
    }

    #[inline]
    fn persistent(&self) -> bool {
        self.persistent
    }
}
