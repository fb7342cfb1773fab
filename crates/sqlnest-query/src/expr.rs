//! SQL expressions used in ON, WHERE and ORDER BY.

use crate::clause::OrderBy;
use sqlnest_core::{Dialect, Value};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference with optional table qualifier
    Column {
        /// Optional table alias
        table: Option<String>,
        /// Column name
        name: String,
    },

    /// Literal value, always bound as a parameter
    Literal(Value),

    /// Binary operation (e.g., a = b, a AND b)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// IN list; an empty list renders as a constant predicate
    In {
        expr: Box<Expr>,
        values: Vec<Value>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// LIKE / NOT LIKE
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    /// `expr IN (...)` whose list is only known after a parent query ran
    Batch { expr: Box<Expr>, slot: usize },

    /// Raw SQL fragment
    Raw(String),

    /// Parenthesized expression
    Paren(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Get the SQL representation of this operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    /// Get the precedence of this operator (higher = binds tighter).
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            _ => 3,
        }
    }
}

impl Expr {
    /// Unqualified column.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    /// Column qualified by a table alias.
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: column.into(),
        }
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn in_list(self, values: Vec<Value>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values,
            negated: false,
        }
    }

    pub fn not_in_list(self, values: Vec<Value>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values,
            negated: true,
        }
    }

    pub fn like(self, pattern: impl Into<Expr>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
            negated: false,
        }
    }

    pub fn not_like(self, pattern: impl Into<Expr>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
            negated: true,
        }
    }

    /// `self IN (<batch slot>)`, filled in by [`Expr::bind_batch`].
    pub fn batch(self, slot: usize) -> Self {
        Expr::Batch {
            expr: Box::new(self),
            slot,
        }
    }

    pub fn paren(self) -> Self {
        Expr::Paren(Box::new(self))
    }

    /// Fold a list with AND; `None` for an empty list.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::and)
    }

    /// Fold a list with OR; `None` for an empty list.
    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::or)
    }

    pub fn asc(self) -> OrderBy {
        OrderBy::asc(self)
    }

    pub fn desc(self) -> OrderBy {
        OrderBy::desc(self)
    }

    /// Replace every batch placeholder of `slot` with a concrete IN list.
    pub fn bind_batch(&mut self, slot: usize, keys: &[Value]) {
        match self {
            Expr::Batch { expr, slot: s } if *s == slot => {
                let target = std::mem::replace(expr.as_mut(), Expr::Raw(String::new()));
                *self = target.in_list(keys.to_vec());
            }
            Expr::Binary { left, right, .. } => {
                left.bind_batch(slot, keys);
                right.bind_batch(slot, keys);
            }
            Expr::In { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Batch { expr, .. }
            | Expr::Paren(expr) => expr.bind_batch(slot, keys),
            Expr::Like { expr, pattern, .. } => {
                expr.bind_batch(slot, keys);
                pattern.bind_batch(slot, keys);
            }
            Expr::Column { .. } | Expr::Literal(_) | Expr::Raw(_) => {}
        }
    }

    /// Whether any batch placeholder is still unbound.
    pub fn has_batch(&self) -> bool {
        match self {
            Expr::Batch { .. } => true,
            Expr::Binary { left, right, .. } => left.has_batch() || right.has_batch(),
            Expr::Like { expr, pattern, .. } => expr.has_batch() || pattern.has_batch(),
            Expr::In { expr, .. } | Expr::IsNull { expr, .. } | Expr::Paren(expr) => {
                expr.has_batch()
            }
            Expr::Column { .. } | Expr::Literal(_) | Expr::Raw(_) => false,
        }
    }

    /// Build SQL string and collect parameters (default PostgreSQL dialect).
    pub fn build(&self, params: &mut Vec<Value>, offset: usize) -> String {
        self.build_with_dialect(Dialect::Postgres, params, offset)
    }

    /// Build SQL string with specific dialect.
    pub fn build_with_dialect(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        match self {
            Expr::Column { table, name } => {
                if let Some(t) = table {
                    format!(
                        "{}.{}",
                        dialect.quote_identifier(t),
                        dialect.quote_identifier(name)
                    )
                } else {
                    dialect.quote_identifier(name)
                }
            }

            Expr::Literal(value) => {
                params.push(value.clone());
                dialect.placeholder(offset + params.len())
            }

            Expr::Binary { left, op, right } => {
                let left_sql = operand(left, *op, dialect, params, offset);
                let right_sql = operand(right, *op, dialect, params, offset);
                format!("{left_sql} {} {right_sql}", op.as_str())
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return if *negated { "1 = 1" } else { "1 = 0" }.to_string();
                }
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let value_sqls: Vec<_> = values
                    .iter()
                    .map(|v| {
                        params.push(v.clone());
                        dialect.placeholder(offset + params.len())
                    })
                    .collect();
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}IN ({})", value_sqls.join(", "))
            }

            Expr::IsNull { expr, negated } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let not_str = if *negated { " NOT" } else { "" };
                format!("{expr_sql} IS{not_str} NULL")
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let pattern_sql = pattern.build_with_dialect(dialect, params, offset);
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}LIKE {pattern_sql}")
            }

            // Unbound: render the shape with an empty list parameter.
            Expr::Batch { expr, .. } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                params.push(Value::Array(Vec::new()));
                format!("{expr_sql} IN ({})", dialect.placeholder(offset + params.len()))
            }

            Expr::Raw(sql) => sql.clone(),

            Expr::Paren(expr) => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                format!("({expr_sql})")
            }
        }
    }
}

fn operand(
    expr: &Expr,
    parent: BinaryOp,
    dialect: Dialect,
    params: &mut Vec<Value>,
    offset: usize,
) -> String {
    let sql = expr.build_with_dialect(dialect, params, offset);
    match expr {
        Expr::Binary { op, .. } if op.precedence() < parent.precedence() => format!("({sql})"),
        _ => sql,
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(expr: &Expr) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = expr.build(&mut params, 0);
        (sql, params)
    }

    #[test]
    fn qualified_columns_and_literals() {
        let (sql, params) = render(&Expr::qualified("t", "id").eq(Value::Int(1)));
        assert_eq!(sql, "\"t\".\"id\" = $1");
        assert_eq!(params, vec![Value::Int(1)]);
    }

    #[test]
    fn or_inside_and_is_parenthesized() {
        let expr = Expr::col("a")
            .eq(Value::Int(1))
            .or(Expr::col("b").eq(Value::Int(2)))
            .and(Expr::col("c").is_null());
        let (sql, _) = render(&expr);
        assert_eq!(sql, "(\"a\" = $1 OR \"b\" = $2) AND \"c\" IS NULL");
    }

    #[test]
    fn empty_in_lists_are_constant() {
        assert_eq!(render(&Expr::col("id").in_list(vec![])).0, "1 = 0");
        assert_eq!(render(&Expr::col("id").not_in_list(vec![])).0, "1 = 1");
    }

    #[test]
    fn batch_binding_becomes_in_list() {
        let mut expr = Expr::qualified("t", "sourceKey")
            .batch(0)
            .and(Expr::qualified("t", "kind").eq(Value::from("customer")));
        assert!(expr.has_batch());

        expr.bind_batch(0, &[Value::Int(1), Value::Int(2)]);
        assert!(!expr.has_batch());
        let (sql, params) = render(&expr);
        assert_eq!(sql, "\"t\".\"sourceKey\" IN ($1, $2) AND \"t\".\"kind\" = $3");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn other_slots_stay_unbound() {
        let mut expr = Expr::col("x").batch(1);
        expr.bind_batch(0, &[Value::Int(1)]);
        assert!(expr.has_batch());
    }

    #[test]
    fn like_binds_pattern() {
        let (sql, params) = render(&Expr::col("name").not_like(Value::from("M%")));
        assert_eq!(sql, "\"name\" NOT LIKE $1");
        assert_eq!(params, vec![Value::from("M%")]);
    }

    #[test]
    fn sqlite_placeholders_continue_numbering() {
        let mut params = vec![Value::Int(0)];
        let sql = Expr::col("id").in_list(vec![Value::Int(5), Value::Int(6)]).build_with_dialect(
            Dialect::Sqlite,
            &mut params,
            0,
        );
        assert_eq!(sql, "\"id\" IN (?2, ?3)");
    }
}
