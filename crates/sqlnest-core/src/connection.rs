//! The SQL executor seam.
//!
//! sqlnest never talks to a database itself. It renders SQL text plus bound
//! parameters and hands them to a [`Connection`]; drivers, pooling and
//! transactions live behind this trait.
//!
//! All operations integrate with asupersync's structured concurrency via `Cx`
//! for cancellation and timeout handling. A timeout configured on the driver
//! surfaces as an ordinary `Outcome::Err`.

use crate::dialect::Dialect;
use crate::error::Error;
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};

/// A database connection capable of executing read queries.
///
/// One connection (or one open transaction) is reused for a root query and
/// all of its child queries, so a caller that opened a transaction sees a
/// consistent snapshot across the whole nested read.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query(&cx, "SELECT \"t\".\"id\" AS \"col1\" FROM \"cities\" AS \"t\"", &[]).await;
/// ```
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    ///
    /// Rows must expose the column aliases used in the SELECT list.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// The dialect SQL should be rendered in for this connection.
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }
}
