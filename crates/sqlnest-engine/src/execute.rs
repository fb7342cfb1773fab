//! Query orchestration.
//!
//! The root context runs first. Its rows supply the key values for every
//! one-to-many child, and all children of one context run concurrently.
//! A child's own children start only after its rows arrive, so nesting depth
//! is sequential while siblings fan out. The first failure anywhere stops
//! the whole request: remaining sibling futures are dropped and no partial
//! result is returned.
//!
//! All operations take a `Cx` and return `Outcome`, so cancellation observed
//! between queries surfaces as `Outcome::Cancelled`.

use crate::assemble::{Groups, assemble, group_rows};
use crate::context::{BATCH_SLOT, QueryContext};
use crate::options::FindOptions;
use crate::planner::Planner;
use sqlnest_core::{
    Connection, Cx, Dialect, Error, Filter, Model, Orm, Outcome, Record, Result, Row,
    SyntaxErrorKind, Value, ValueKey,
};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

/// Lifecycle of one query context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Building,
    Executing,
    /// Waiting for child contexts
    Children,
    Assembled,
    Failed,
}

/// A non-`Ok` outcome carried through `Result`-based combinators.
type Halt = Outcome<(), Error>;

type Step<'s, T> = Pin<Box<dyn Future<Output = std::result::Result<T, Halt>> + Send + 's>>;

struct Fetched {
    rows: Vec<Row>,
    records: Vec<Record>,
}

/// Runs planned requests over one connection.
///
/// The same connection serves the root query and every descendant, so a
/// caller that opened a transaction reads one consistent snapshot.
#[derive(Debug)]
pub struct Executor<'a, C: Connection> {
    orm: &'a Orm,
    conn: &'a C,
    dialect: Dialect,
}

impl<'a, C: Connection> Executor<'a, C> {
    /// Create an executor rendering SQL in the connection's dialect.
    pub fn new(orm: &'a Orm, conn: &'a C) -> Self {
        Self {
            orm,
            conn,
            dialect: conn.dialect(),
        }
    }

    /// Override the SQL dialect.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Plan and run a request, returning one record per root row.
    #[tracing::instrument(level = "debug", skip(self, cx, options), fields(model = %options.model))]
    pub async fn find(&self, cx: &Cx, options: &FindOptions) -> Outcome<Vec<Record>, Error> {
        tracing::trace!(phase = ?Phase::Building, "planning");
        let ctx = match Planner::new(self.orm).plan(options) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::trace!(phase = ?Phase::Failed, error = %e, "planning failed");
                return Outcome::Err(e);
            }
        };
        self.run_plan(cx, &ctx, options.show_sql).await
    }

    /// Run an already planned root context.
    pub async fn run_plan(
        &self,
        cx: &Cx,
        ctx: &QueryContext,
        show_sql: bool,
    ) -> Outcome<Vec<Record>, Error> {
        match self.run(cx, ctx, None, show_sql).await {
            Ok(fetched) => Outcome::Ok(fetched.records),
            Err(halt) => resume(halt),
        }
    }

    /// Fetch one record by primary key.
    ///
    /// Composite keys are passed as `Value::Array` in key-field order. The key
    /// condition is ANDed onto `options.filter`, so a record that exists but
    /// fails the caller's filter yields `None`.
    #[tracing::instrument(level = "debug", skip(self, cx, options, key), fields(model = %options.model))]
    pub async fn get(
        &self,
        cx: &Cx,
        options: &FindOptions,
        key: Value,
    ) -> Outcome<Option<Record>, Error> {
        let filter = match self
            .orm
            .resolve(&options.model)
            .and_then(|m| key_filter(self.orm.model(m), key))
        {
            Ok(filter) => filter,
            Err(e) => return Outcome::Err(e),
        };
        let options = options.clone().filter(filter).limit(1);
        self.find(cx, &options)
            .await
            .map(|records| records.into_iter().next())
    }

    fn run<'s>(
        &'s self,
        cx: &'s Cx,
        ctx: &'s QueryContext,
        keys: Option<Vec<Value>>,
        show_sql: bool,
    ) -> Step<'s, Fetched> {
        Box::pin(async move {
            let mut select = ctx.select();
            if let Some(keys) = &keys {
                select.bind(BATCH_SLOT, keys);
            }
            let (sql, params) = select.build_with_dialect(self.dialect);

            tracing::trace!(phase = ?Phase::Executing, sql = %sql, "executing");
            if show_sql {
                tracing::info!(sql = %sql, params = ?params, "query");
            }
            if let Some(reason) = cx.cancel_reason() {
                return Err(Outcome::Cancelled(reason));
            }

            let rows = match self.conn.query(cx, &sql, &params).await {
                Outcome::Ok(rows) => rows,
                Outcome::Err(e) => {
                    tracing::trace!(phase = ?Phase::Failed, error = %e, "query failed");
                    let e = if show_sql { e.with_query(sql, params) } else { e };
                    return Err(Outcome::Err(e));
                }
                Outcome::Cancelled(r) => return Err(Outcome::Cancelled(r)),
                Outcome::Panicked(p) => return Err(Outcome::Panicked(p)),
            };
            tracing::debug!(rows = rows.len(), children = ctx.children.len(), "fetched rows");

            let mut groups: Vec<Groups> = Vec::new();
            if !ctx.children.is_empty() {
                tracing::trace!(phase = ?Phase::Children, count = ctx.children.len(), "running children");
                let pending = ctx.children.iter().map(|link| {
                    let keys = distinct_keys(&rows, &link.parent_key);
                    async move {
                        if keys.is_empty() {
                            tracing::debug!(alias = %link.alias, "no parent keys, skipping child query");
                            return Ok(Groups::new());
                        }
                        let fetched = self.run(cx, &link.context, Some(keys), show_sql).await?;
                        Ok::<_, Halt>(group_rows(link, &fetched.rows, fetched.records))
                    }
                });
                groups = futures::future::try_join_all(pending).await?;
            }

            let records = rows
                .iter()
                .map(|row| assemble(row, &ctx.tree, &ctx.children, &groups))
                .collect();
            tracing::trace!(phase = ?Phase::Assembled, "assembled");
            Ok::<_, Halt>(Fetched { rows, records })
        })
    }
}

/// Distinct non-NULL values of a column, in first-seen order.
fn distinct_keys(rows: &[Row], column: &str) -> Vec<Value> {
    let mut seen: HashSet<ValueKey> = HashSet::new();
    let mut keys = Vec::new();
    for row in rows {
        let value = row.value_or_null(column);
        match value.key() {
            Some(key) => {
                if seen.insert(key) {
                    keys.push(value);
                }
            }
            None => tracing::trace!(column, "skipping NULL parent key"),
        }
    }
    keys
}

fn key_filter(model: &Model, key: Value) -> Result<Filter> {
    let fields = model.key_fields();
    if fields.len() > 1 {
        let Value::Array(values) = key else {
            return Err(Error::syntax(
                SyntaxErrorKind::Filter,
                key.to_string(),
                format!("{} has a composite key of {} fields", model.name(), fields.len()),
            ));
        };
        if values.len() != fields.len() {
            return Err(Error::syntax(
                SyntaxErrorKind::Filter,
                Value::Array(values).to_string(),
                format!("expected {} key values", fields.len()),
            ));
        }
        let parts = fields
            .iter()
            .zip(values)
            .map(|(field, value)| Filter::eq(field.as_str(), value))
            .collect();
        return Ok(Filter::all(parts));
    }
    if key.is_null() {
        return Err(Error::syntax(SyntaxErrorKind::Filter, "NULL", "primary key value is NULL"));
    }
    Ok(Filter::eq(model.primary_key(), key))
}

fn resume<T>(halt: Halt) -> Outcome<T, Error> {
    match halt {
        Outcome::Ok(()) => Outcome::Err(Error::Custom(
            "query stopped without a result".to_string(),
        )),
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}
