//! Sessions: a connection paired with a baked model graph.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlnest::prelude::*;
//!
//! let session = Session::builder(orm).show_sql(true).build(connection);
//! let cities = session
//!     .find(&cx, FindOptions::new("Cities").filter(Filter::eq("id", 1)))
//!     .await;
//! ```

use std::sync::Arc;

use sqlnest_core::{Connection, Cx, Dialect, Error, Orm, Outcome, Record, Result, Value};
use sqlnest_engine::{Executor, FindOptions, Planner, QueryContext};

/// A database session for nested find requests.
///
/// Session-wide defaults for `show_sql` and `silent` are ORed into every
/// request; a request can turn them on but not off.
#[derive(Debug)]
pub struct Session<C: Connection> {
    orm: Arc<Orm>,
    connection: C,
    show_sql: bool,
    silent: bool,
    dialect: Option<Dialect>,
}

impl<C: Connection> Session<C> {
    /// Create a session with default settings.
    pub fn new(orm: Arc<Orm>, connection: C) -> Self {
        Self {
            orm,
            connection,
            show_sql: false,
            silent: false,
            dialect: None,
        }
    }

    /// Create a session builder.
    #[must_use]
    pub fn builder(orm: Arc<Orm>) -> SessionBuilder {
        SessionBuilder::new(orm)
    }

    #[must_use]
    pub fn orm(&self) -> &Orm {
        &self.orm
    }

    #[must_use]
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Consume the session and return the underlying connection.
    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Dialect used for rendering: the override, or the connection's own.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect.unwrap_or_else(|| self.connection.dialect())
    }

    fn apply_defaults(&self, mut options: FindOptions) -> FindOptions {
        options.show_sql |= self.show_sql;
        options.silent |= self.silent;
        options
    }

    fn executor(&self) -> Executor<'_, C> {
        Executor::new(&self.orm, &self.connection).with_dialect(self.dialect())
    }

    /// Plan a request without running it.
    pub fn plan(&self, options: FindOptions) -> Result<QueryContext> {
        Planner::new(&self.orm).plan(&self.apply_defaults(options))
    }

    /// Render the root query of a request in the session dialect.
    ///
    /// Child queries depend on fetched rows and are not included.
    pub fn sql(&self, options: FindOptions) -> Result<(String, Vec<Value>)> {
        let ctx = self.plan(options)?;
        Ok(ctx.select().build_with_dialect(self.dialect()))
    }

    /// Fetch nested records for a request.
    pub async fn find(&self, cx: &Cx, options: FindOptions) -> Outcome<Vec<Record>, Error> {
        let options = self.apply_defaults(options);
        self.executor().find(cx, &options).await
    }

    /// Fetch one record by primary key, within the request's own filter.
    pub async fn get(
        &self,
        cx: &Cx,
        options: FindOptions,
        key: impl Into<Value>,
    ) -> Outcome<Option<Record>, Error> {
        let options = self.apply_defaults(options);
        self.executor().get(cx, &options, key.into()).await
    }
}

/// Builder for [`Session`].
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    orm: Arc<Orm>,
    show_sql: bool,
    silent: bool,
    dialect: Option<Dialect>,
}

impl SessionBuilder {
    #[must_use]
    pub fn new(orm: Arc<Orm>) -> Self {
        Self {
            orm,
            show_sql: false,
            silent: false,
            dialect: None,
        }
    }

    /// Log every query with its parameters and attach SQL to execution errors.
    #[must_use]
    pub const fn show_sql(mut self, show_sql: bool) -> Self {
        self.show_sql = show_sql;
        self
    }

    /// Drop unresolvable attributes instead of failing.
    #[must_use]
    pub const fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Render SQL in `dialect` regardless of what the connection reports.
    #[must_use]
    pub const fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn build<C: Connection>(self, connection: C) -> Session<C> {
        Session {
            orm: self.orm,
            connection,
            show_sql: self.show_sql,
            silent: self.silent,
            dialect: self.dialect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlnest_core::{FieldDef, ModelDef, Row};

    struct NoopConnection;

    impl Connection for NoopConnection {
        fn query(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl std::future::Future<Output = Outcome<Vec<Row>, Error>> + Send {
            async { Outcome::Ok(Vec::new()) }
        }

        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }
    }

    fn orm() -> Arc<Orm> {
        Arc::new(
            Orm::builder()
                .model(
                    ModelDef::new("Cities")
                        .table("cities")
                        .field(FieldDef::data("id").primary_key())
                        .field(FieldDef::data("name")),
                )
                .bake()
                .unwrap(),
        )
    }

    #[test]
    fn dialect_defaults_to_connection() {
        let session = Session::new(orm(), NoopConnection);
        assert_eq!(session.dialect(), Dialect::Sqlite);

        let session = Session::<NoopConnection>::builder(orm())
            .dialect(Dialect::Postgres)
            .build(NoopConnection);
        assert_eq!(session.dialect(), Dialect::Postgres);
    }

    #[test]
    fn session_defaults_apply_to_requests() {
        let session = Session::<NoopConnection>::builder(orm()).silent(true).build(NoopConnection);
        let opts = session.apply_defaults(FindOptions::new("Cities"));
        assert!(opts.silent);
        assert!(!opts.show_sql);
    }

    #[test]
    fn sql_renders_in_session_dialect() {
        let session = Session::new(orm(), NoopConnection);
        let (sql, params) = session
            .sql(FindOptions::new("Cities").filter(sqlnest_core::Filter::eq("id", 3)))
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"t\".\"id\" AS \"col1\", \"t\".\"name\" AS \"col2\" FROM \"cities\" AS \"t\" WHERE \"t\".\"id\" = ?1"
        );
        assert_eq!(params, vec![Value::Int(3)]);
    }
}
