//! JOIN clause types.

use crate::expr::Expr;
use sqlnest_core::{Dialect, JoinType, Value};

/// An aliased JOIN against a model's table.
///
/// `nested` joins are the ones this join's own ON predicate depends on
/// (an association filter that reaches through a further association).
/// They are rendered inside a parenthesized group so the ON clause can see
/// their aliases.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub schema: Option<String>,
    pub table: String,
    pub alias: String,
    pub on: Expr,
    pub nested: Vec<Join>,
}

impl Join {
    pub fn new(join_type: JoinType, table: impl Into<String>, alias: impl Into<String>, on: Expr) -> Self {
        Self {
            join_type,
            schema: None,
            table: table.into(),
            alias: alias.into(),
            on,
            nested: Vec::new(),
        }
    }

    /// Create a LEFT JOIN.
    pub fn left(table: impl Into<String>, alias: impl Into<String>, on: Expr) -> Self {
        Self::new(JoinType::Left, table, alias, on)
    }

    /// Create an INNER JOIN.
    pub fn inner(table: impl Into<String>, alias: impl Into<String>, on: Expr) -> Self {
        Self::new(JoinType::Inner, table, alias, on)
    }

    pub fn schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    pub fn nest(mut self, join: Join) -> Self {
        self.nested.push(join);
        self
    }

    /// Generate SQL and collect parameters with a specific dialect.
    pub fn build_with_dialect(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        let mut sql = format!(" {} ", self.join_type.as_sql());
        if self.nested.is_empty() {
            sql.push_str(&self.table_ref(dialect));
        } else {
            sql.push('(');
            sql.push_str(&self.table_ref(dialect));
            for inner in &self.nested {
                sql.push_str(&inner.build_with_dialect(dialect, params, offset));
            }
            sql.push(')');
        }
        sql.push_str(" ON ");
        sql.push_str(&self.on.build_with_dialect(dialect, params, offset));
        sql
    }

    fn table_ref(&self, dialect: Dialect) -> String {
        let table = match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                dialect.quote_identifier(schema),
                dialect.quote_identifier(&self.table)
            ),
            None => dialect.quote_identifier(&self.table),
        };
        format!("{} AS {}", table, dialect.quote_identifier(&self.alias))
    }

    /// Aliases introduced by this join, including nested ones.
    pub fn aliases(&self) -> Vec<&str> {
        let mut out = vec![self.alias.as_str()];
        for inner in &self.nested {
            out.extend(inner.aliases());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_join_with_schema() {
        let join = Join::left(
            "countries",
            "j1",
            Expr::qualified("t", "country_id").eq(Expr::qualified("j1", "id")),
        )
        .schema(Some("geo".into()));
        let mut params = Vec::new();
        let sql = join.build_with_dialect(Dialect::Postgres, &mut params, 0);
        assert_eq!(
            sql,
            " LEFT JOIN \"geo\".\"countries\" AS \"j1\" ON \"t\".\"country_id\" = \"j1\".\"id\""
        );
    }

    #[test]
    fn nested_joins_are_grouped_before_on() {
        let inner = Join::inner(
            "continents",
            "j2",
            Expr::qualified("j1", "continent_id").eq(Expr::qualified("j2", "id")),
        );
        let join = Join::left(
            "countries",
            "j1",
            Expr::qualified("t", "country_id")
                .eq(Expr::qualified("j1", "id"))
                .and(Expr::qualified("j2", "name").eq(Value::from("Europe"))),
        )
        .nest(inner);

        let mut params = Vec::new();
        let sql = join.build_with_dialect(Dialect::Mysql, &mut params, 0);
        assert_eq!(
            sql,
            " LEFT JOIN (`countries` AS `j1` INNER JOIN `continents` AS `j2` ON `j1`.`continent_id` = `j2`.`id`) ON `t`.`country_id` = `j1`.`id` AND `j2`.`name` = ?"
        );
        assert_eq!(params, vec![Value::from("Europe")]);
        assert_eq!(join.aliases(), vec!["j1", "j2"]);
    }
}
