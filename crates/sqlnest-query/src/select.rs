//! SELECT statement description and rendering.

use crate::clause::OrderBy;
use crate::expr::Expr;
use crate::join::Join;
use sqlnest_core::{Dialect, Value};

/// One `expr AS alias` entry of the select list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub expr: Expr,
    pub alias: String,
}

/// A SELECT over one table with aliased joins.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    schema: Option<String>,
    table: String,
    alias: String,
    columns: Vec<SelectColumn>,
    joins: Vec<Join>,
    where_clause: Option<Expr>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    /// Select from `table AS alias`.
    pub fn from(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
            alias: alias.into(),
            columns: Vec::new(),
            joins: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    /// Add a select-list entry.
    pub fn column(mut self, expr: Expr, alias: impl Into<String>) -> Self {
        self.columns.push(SelectColumn {
            expr,
            alias: alias.into(),
        });
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Add a WHERE condition, ANDed onto any existing one.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn columns(&self) -> &[SelectColumn] {
        &self.columns
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn where_clause(&self) -> Option<&Expr> {
        self.where_clause.as_ref()
    }

    /// Fill a batch placeholder with the parent's key values.
    pub fn bind(&mut self, slot: usize, keys: &[Value]) {
        if let Some(expr) = &mut self.where_clause {
            expr.bind_batch(slot, keys);
        }
    }

    /// Whether a batch placeholder is still waiting for keys.
    pub fn is_pending(&self) -> bool {
        self.where_clause.as_ref().is_some_and(Expr::has_batch)
    }

    /// Build the SQL and parameters (default PostgreSQL dialect).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::Postgres)
    }

    /// Build the SQL and parameters for a specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = String::from("SELECT ");

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<_> = self
                .columns
                .iter()
                .map(|c| {
                    format!(
                        "{} AS {}",
                        c.expr.build_with_dialect(dialect, &mut params, 0),
                        dialect.quote_identifier(&c.alias)
                    )
                })
                .collect();
            sql.push_str(&cols.join(", "));
        }

        // FROM
        sql.push_str(" FROM ");
        if let Some(schema) = &self.schema {
            sql.push_str(&dialect.quote_identifier(schema));
            sql.push('.');
        }
        sql.push_str(&dialect.quote_identifier(&self.table));
        sql.push_str(" AS ");
        sql.push_str(&dialect.quote_identifier(&self.alias));

        // JOINs
        for join in &self.joins {
            sql.push_str(&join.build_with_dialect(dialect, &mut params, 0));
        }

        // WHERE
        if let Some(expr) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&expr.build_with_dialect(dialect, &mut params, 0));
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            let orders: Vec<_> = self
                .order_by
                .iter()
                .map(|o| o.build_with_dialect(dialect, &mut params, 0))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }

        // LIMIT / OFFSET; an OFFSET alone still needs a LIMIT on MySQL and SQLite
        match (self.limit, self.offset, dialect) {
            (Some(n), _, _) => sql.push_str(&format!(" LIMIT {}", n)),
            (None, Some(_), Dialect::Mysql) => sql.push_str(" LIMIT 18446744073709551615"),
            (None, Some(_), Dialect::Sqlite) => sql.push_str(" LIMIT -1"),
            _ => {}
        }
        if let Some(n) = self.offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }

        (sql, params)
    }
}
