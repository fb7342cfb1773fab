//! Turning a find request into a tree of query contexts.

use crate::context::{QueryContext, ROOT_ALIAS};
use crate::options::FindOptions;
use sqlnest_core::{Orm, Result};

/// Plans find requests against a baked model graph.
///
/// Planning is pure: nothing touches a connection, so a plan can be inspected
/// (`QueryContext::select`) or executed later.
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    orm: &'a Orm,
}

impl<'a> Planner<'a> {
    pub fn new(orm: &'a Orm) -> Self {
        Self { orm }
    }

    /// Resolve attributes, then filter, then sort, into the root context.
    #[tracing::instrument(level = "debug", skip(self, options), fields(model = %options.model))]
    pub fn plan(&self, options: &FindOptions) -> Result<QueryContext> {
        let build = Build {
            orm: self.orm,
            silent: options.silent,
            request: &options.context,
        };
        let model_ref = self.orm.resolve(&options.model)?;
        let model = self.orm.model(model_ref);
        let mut ctx = QueryContext::new(model_ref, model);

        ctx.tree = build.resolve_attributes(
            &mut ctx,
            model_ref,
            ROOT_ALIAS,
            options.attributes.as_ref(),
        )?;
        if let Some(filter) = &options.filter {
            if let Some(expr) = build.translate_filter(&mut ctx, model_ref, ROOT_ALIAS, filter, None)? {
                ctx.add_filter(expr);
            }
        }
        ctx.order_by = build.translate_sort(&mut ctx, model_ref, &options.sort)?;
        ctx.limit = options.limit;
        ctx.offset = options.offset;
        ctx.seal(self.orm);

        tracing::debug!(
            columns = ctx.columns().len(),
            joins = ctx.joins().len(),
            children = ctx.children().len(),
            "planned root context"
        );
        Ok(ctx)
    }
}

/// Per-request planning state shared by the resolver, join planner and
/// translator.
pub(crate) struct Build<'a> {
    pub(crate) orm: &'a Orm,
    pub(crate) silent: bool,
    /// Caller-supplied value handed to dynamic association filters
    pub(crate) request: &'a serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlnest_core::{
        Attributes, FieldDef, Filter, HopDef, ModelDef, SortKey, UsageErrorKind, Value,
    };

    fn orm() -> Orm {
        Orm::builder()
            .model(
                ModelDef::new("Users")
                    .table("users")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("name")),
            )
            .model(
                ModelDef::new("Notes")
                    .table("notes")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("sourceKey"))
                    .field(FieldDef::data("author_id"))
                    .field(FieldDef::data("text"))
                    .field(FieldDef::associated(
                        "author",
                        HopDef::to("Users").key("author_id").foreign_key("id"),
                    )),
            )
            .model(
                ModelDef::new("Customers")
                    .table("customers")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("name"))
                    .field(FieldDef::associated(
                        "notes",
                        HopDef::to("Notes").key("id").foreign_key("sourceKey").has_many(),
                    ))
                    .field(FieldDef::associated(
                        "pinned",
                        HopDef::to("Notes")
                            .key("id")
                            .foreign_key("sourceKey")
                            .filter(Filter::eq("author.name", "Ann")),
                    ))
                    .field(FieldDef::associated(
                        "matching",
                        HopDef::to("Notes")
                            .key("id")
                            .foreign_key("sourceKey")
                            .filter_fn(|ctx| {
                                Filter::eq("text", Value::from(ctx["text"].clone()))
                            }),
                    )),
            )
            .model(
                ModelDef::new("Countries")
                    .table("countries")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("name")),
            )
            .model(
                ModelDef::new("States")
                    .table("states")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("name"))
                    .field(FieldDef::data("country_id")),
            )
            .model(
                ModelDef::new("Cities")
                    .table("cities")
                    .field(FieldDef::data("id").primary_key())
                    .field(FieldDef::data("state_id"))
                    .field(FieldDef::data("country_id"))
                    .field(FieldDef::associated(
                        "stateCountry",
                        HopDef::to("States")
                            .key("state_id")
                            .foreign_key("id")
                            .towards(HopDef::to("Countries").key("country_id").foreign_key("id")),
                    ))
                    .field(FieldDef::associated(
                        "country",
                        HopDef::to("Countries")
                            .key("country_id")
                            .foreign_key("id")
                            .join_type("inner")
                            .field_name("name"),
                    )),
            )
            .bake()
            .unwrap()
    }

    fn attrs(items: &[&str]) -> Attributes {
        Attributes::parse(items).unwrap()
    }

    #[test]
    fn collections_become_batched_children() {
        let orm = orm();
        let ctx = Planner::new(&orm)
            .plan(&FindOptions::new("Customers").attributes(attrs(&["name", "notes"])))
            .unwrap();

        assert!(!ctx.is_batched());
        assert_eq!(ctx.children().len(), 1);
        let link = &ctx.children()[0];
        assert_eq!(link.alias, "notes");
        assert_eq!(link.parent_key, "col2");
        assert_eq!(link.group_key, "col1");
        assert!(link.context.is_batched());
        assert!(link.context.select().is_pending());
    }

    #[test]
    fn limit_and_offset_stay_on_the_root() {
        let orm = orm();
        let ctx = Planner::new(&orm)
            .plan(
                &FindOptions::new("Customers")
                    .attributes(attrs(&["id", "notes"]))
                    .limit(5)
                    .offset(10),
            )
            .unwrap();

        assert!(ctx.select().build().0.ends_with("LIMIT 5 OFFSET 10"));
        let child_sql = ctx.children()[0].context.select().build().0;
        assert!(!child_sql.contains("LIMIT"));
    }

    #[test]
    fn join_filters_group_their_own_joins() {
        let orm = orm();
        let ctx = Planner::new(&orm)
            .plan(&FindOptions::new("Customers").attributes(attrs(&["id", "pinned.text"])))
            .unwrap();

        let (sql, params) = ctx.select().build();
        assert_eq!(
            sql,
            "SELECT \"t\".\"id\" AS \"col1\", \"j1\".\"text\" AS \"col2\" FROM \"customers\" AS \"t\" \
             LEFT JOIN (\"notes\" AS \"j1\" LEFT JOIN \"users\" AS \"j2\" ON \"j1\".\"author_id\" = \"j2\".\"id\") \
             ON \"t\".\"id\" = \"j1\".\"sourceKey\" AND \"j2\".\"name\" = $1"
        );
        assert_eq!(params, vec![Value::from("Ann")]);
    }

    #[test]
    fn dynamic_join_filters_see_request_context() {
        let orm = orm();
        let ctx = Planner::new(&orm)
            .plan(
                &FindOptions::new("Customers")
                    .attributes(attrs(&["matching.id"]))
                    .context(json!({"text": "urgent"})),
            )
            .unwrap();

        let (sql, params) = ctx.select().build();
        assert!(sql.ends_with("ON \"t\".\"id\" = \"j1\".\"sourceKey\" AND \"j1\".\"text\" = $1"));
        assert_eq!(params, vec![Value::from("urgent")]);
    }

    #[test]
    fn silent_mode_rolls_back_partial_joins() {
        let orm = orm();
        let options = FindOptions::new("Customers").attributes(attrs(&["id", "pinned.bogus"]));

        let err = Planner::new(&orm).plan(&options).unwrap_err();
        assert!(err.is_resolution_error());

        let ctx = Planner::new(&orm).plan(&options.silent(true)).unwrap();
        assert_eq!(ctx.tree().aliases().collect::<Vec<_>>(), vec!["id"]);
        assert!(ctx.joins().is_empty());
        assert_eq!(ctx.columns().len(), 1);
    }

    #[test]
    fn duplicate_aliases_are_rejected() {
        let orm = orm();
        let err = Planner::new(&orm)
            .plan(&FindOptions::new("Customers").attributes(attrs(&["name", "pinned.text name"])))
            .unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::DuplicateAlias));
    }

    #[test]
    fn chained_hops_share_joins_across_attributes_filters_and_sorts() {
        let orm = orm();
        let ctx = Planner::new(&orm)
            .plan(
                &FindOptions::new("Cities")
                    .attributes(attrs(&["id", "stateCountry"]))
                    .filter(Filter::eq("stateCountry.name", "Germany"))
                    .sort(SortKey::desc("stateCountry.name")),
            )
            .unwrap();

        let (sql, params) = ctx.select().build();
        assert_eq!(
            sql,
            "SELECT \"t\".\"id\" AS \"col1\", \"j2\".\"id\" AS \"col2\", \"j2\".\"name\" AS \"col3\" \
             FROM \"cities\" AS \"t\" \
             LEFT JOIN \"states\" AS \"j1\" ON \"t\".\"state_id\" = \"j1\".\"id\" \
             LEFT JOIN \"countries\" AS \"j2\" ON \"j1\".\"country_id\" = \"j2\".\"id\" \
             WHERE \"j2\".\"name\" = $1 ORDER BY \"j2\".\"name\" DESC"
        );
        assert_eq!(params, vec![Value::from("Germany")]);
        assert_eq!(ctx.joins().len(), 2);
    }

    #[test]
    fn inner_join_type_is_rendered() {
        let orm = orm();
        let ctx = Planner::new(&orm)
            .plan(&FindOptions::new("Cities").attributes(attrs(&["id", "country"])))
            .unwrap();

        let (sql, _) = ctx.select().build();
        assert!(sql.contains(
            "INNER JOIN \"countries\" AS \"j1\" ON \"t\".\"country_id\" = \"j1\".\"id\""
        ));
        assert!(!sql.contains("LEFT JOIN"));
    }

    #[test]
    fn empty_disjunction_matches_nothing() {
        let orm = orm();
        let filter = Filter::from_json(&json!({"or": []})).unwrap();
        assert_eq!(filter, Filter::Or(Vec::new()));

        let ctx = Planner::new(&orm)
            .plan(&FindOptions::new("Users").filter(filter))
            .unwrap();
        let (sql, params) = ctx.select().build();
        assert!(sql.ends_with("FROM \"users\" AS \"t\" WHERE 1 = 0"));
        assert!(params.is_empty());

        // An empty conjunction still matches everything.
        let ctx = Planner::new(&orm)
            .plan(&FindOptions::new("Users").filter(Filter::And(Vec::new())))
            .unwrap();
        assert!(!ctx.select().build().0.contains("WHERE"));
    }

    #[test]
    fn unknown_models_fail_planning() {
        let orm = orm();
        assert!(Planner::new(&orm).plan(&FindOptions::new("Invoices")).is_err());
    }
}
