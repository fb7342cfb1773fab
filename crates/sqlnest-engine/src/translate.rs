//! Filter and sort translation.
//!
//! Logical paths (`country.name`) are rewritten into columns of joined
//! aliases (`"j1"."name"`), planning joins on the way. Only single-value
//! associations can be walked; collections and calculated fields have no
//! column to compare against.

use crate::context::{QueryContext, ROOT_ALIAS};
use crate::joins::column_of;
use crate::planner::Build;
use sqlnest_core::{
    Error, Field, Filter, ModelRef, Operator, Result, SortKey, SyntaxErrorKind, UsageErrorKind,
    Value,
};
use sqlnest_query::{Expr, OrderBy};

impl Build<'_> {
    /// Translate a filter tree rooted at `alias`; `None` when it matches every row.
    pub(crate) fn translate_filter(
        &self,
        ctx: &mut QueryContext,
        model: ModelRef,
        alias: &str,
        filter: &Filter,
        parent: Option<usize>,
    ) -> Result<Option<Expr>> {
        match filter {
            Filter::Condition(cond) => {
                let segments: Vec<&str> = cond.segments().collect();
                let column = self.column_for_path(ctx, model, alias, &segments, parent)?;
                comparison(column, cond.op, &cond.value, &cond.field).map(Some)
            }
            Filter::And(items) => {
                let parts = self.translate_all(ctx, model, alias, items, parent)?;
                Ok(Expr::all(parts))
            }
            // An empty disjunction matches nothing.
            Filter::Or(items) if items.is_empty() => Ok(Some(Expr::raw("1 = 0"))),
            Filter::Or(items) => {
                let parts = self.translate_all(ctx, model, alias, items, parent)?;
                Ok(Expr::any(parts))
            }
        }
    }

    fn translate_all(
        &self,
        ctx: &mut QueryContext,
        model: ModelRef,
        alias: &str,
        items: &[Filter],
        parent: Option<usize>,
    ) -> Result<Vec<Expr>> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            if let Some(expr) = self.translate_filter(ctx, model, alias, item, parent)? {
                parts.push(expr);
            }
        }
        Ok(parts)
    }

    /// Translate sort keys against the context's own table.
    pub(crate) fn translate_sort(
        &self,
        ctx: &mut QueryContext,
        model: ModelRef,
        keys: &[SortKey],
    ) -> Result<Vec<OrderBy>> {
        keys.iter()
            .map(|key| {
                let segments: Vec<&str> = key.segments().collect();
                let column = self.column_for_path(ctx, model, ROOT_ALIAS, &segments, None)?;
                Ok(if key.descending {
                    column.desc()
                } else {
                    column.asc()
                })
            })
            .collect()
    }

    /// Resolve a dotted path to a qualified column, joining as needed.
    pub(crate) fn column_for_path(
        &self,
        ctx: &mut QueryContext,
        model_ref: ModelRef,
        alias: &str,
        segments: &[&str],
        parent: Option<usize>,
    ) -> Result<Expr> {
        let model = self.orm.model(model_ref);
        let Some((&name, rest)) = segments.split_first() else {
            return Err(Error::syntax(SyntaxErrorKind::Filter, "", "empty field path"));
        };
        let field = model
            .field(name)
            .ok_or_else(|| Error::unknown_field(model.qualified_name(), name))?;

        match field {
            Field::Data(data) => {
                if let Some(sub) = rest.first() {
                    return Err(Error::usage(
                        UsageErrorKind::SubFieldOnSingleValue,
                        model.name(),
                        &data.name,
                        format!("is a data field and has no sub value '{sub}'"),
                    ));
                }
                Ok(Expr::qualified(alias, &data.column_name))
            }
            Field::Calculated(calc) => Err(Error::usage(
                UsageErrorKind::NotFilterable,
                model.name(),
                &calc.name,
                "is a calculated field and cannot be used in a filter or sort",
            )),
            Field::Associated(assoc) if assoc.has_many() => Err(Error::usage(
                UsageErrorKind::MultiValueInFilter,
                model.name(),
                &assoc.name,
                "is a multi value associated field and cannot be used in a filter or sort",
            )),
            Field::Associated(assoc) => {
                let (leaf_model, leaf_alias) = self.follow(ctx, model_ref, alias, &assoc.hop, parent)?;
                let leaf = assoc.leaf();
                let foreign = self.orm.model(leaf_model);
                match (&leaf.field_name, rest.is_empty()) {
                    (Some(_), false) => Err(Error::usage(
                        UsageErrorKind::SubFieldOnSingleValue,
                        model.name(),
                        &assoc.name,
                        "is a single value associated field and has no sub value",
                    )),
                    (Some(field_name), true) => {
                        Ok(Expr::qualified(&leaf_alias, column_of(foreign, field_name)?))
                    }
                    // The association itself compares by the joined row's key.
                    (None, true) => Ok(Expr::qualified(
                        &leaf_alias,
                        column_of(foreign, &leaf.foreign_key)?,
                    )),
                    (None, false) => self.column_for_path(ctx, leaf_model, &leaf_alias, rest, parent),
                }
            }
        }
    }
}

/// Render `column op value`, turning NULL and list operands into the
/// matching SQL forms.
fn comparison(column: Expr, op: Operator, value: &Value, field: &str) -> Result<Expr> {
    let expr = match (op, value) {
        (Operator::Eq, Value::Null) => column.is_null(),
        (Operator::Ne, Value::Null) => column.is_not_null(),
        (Operator::Eq, Value::Array(items)) => column.in_list(items.clone()),
        (Operator::Ne, Value::Array(items)) => column.not_in_list(items.clone()),
        (_, Value::Array(_) | Value::Null) => {
            return Err(Error::syntax(
                SyntaxErrorKind::Filter,
                format!("{}{}", field, op.suffix()),
                "operator needs a scalar operand",
            ));
        }
        (Operator::Eq, v) => column.eq(Expr::lit(v.clone())),
        (Operator::Ne, v) => column.ne(Expr::lit(v.clone())),
        (Operator::Gt, v) => column.gt(Expr::lit(v.clone())),
        (Operator::Ge, v) => column.ge(Expr::lit(v.clone())),
        (Operator::Lt, v) => column.lt(Expr::lit(v.clone())),
        (Operator::Le, v) => column.le(Expr::lit(v.clone())),
        (Operator::Like, v) => column.like(Expr::lit(v.clone())),
        (Operator::NotLike, v) => column.not_like(Expr::lit(v.clone())),
    };
    Ok(expr)
}
