//! Join planning.
//!
//! Every single-value hop becomes one aliased join. Joins are keyed by a
//! signature built from the source alias, both ends of the hop and the
//! materialized association filter, so repeated references to the same
//! relation from the same place share one alias no matter whether they come
//! from attributes, filters or sort keys.

use crate::context::{JoinEntry, QueryContext};
use crate::planner::Build;
use sqlnest_core::{Error, Hop, Model, ModelRef, Result};
use sqlnest_query::Expr;

/// Physical column of a data field.
pub(crate) fn column_of(model: &Model, field: &str) -> Result<String> {
    model
        .data_field(field)
        .map(|d| d.column_name.clone())
        .ok_or_else(|| Error::unknown_field(model.qualified_name(), field))
}

impl Build<'_> {
    /// Plan (or reuse) the join for `hop`, made from the table at `source_alias`.
    ///
    /// `parent` is the join whose ON predicate is being built, if any; joins
    /// created on its behalf are grouped under it when rendered.
    pub(crate) fn add_join(
        &self,
        ctx: &mut QueryContext,
        owner: ModelRef,
        source_alias: &str,
        hop: &Hop,
        parent: Option<usize>,
    ) -> Result<String> {
        let owner_model = self.orm.model(owner);
        let foreign = self.orm.model(hop.foreign_model);
        let filter = hop
            .filter
            .as_ref()
            .map(|f| f.materialize(self.request))
            .filter(|f| !f.is_empty());

        let signature = format!(
            "{}|{}.{}|{}.{}|{}",
            source_alias,
            owner_model.qualified_name(),
            hop.key,
            foreign.qualified_name(),
            hop.foreign_key,
            filter.as_ref().map(ToString::to_string).unwrap_or_default()
        );
        if let Some(existing) = ctx.joins.find(&signature) {
            tracing::trace!(alias = %existing.alias, %signature, "reusing join");
            return Ok(existing.alias.clone());
        }

        let alias = ctx.joins.next_alias();
        let mut on = Expr::qualified(source_alias, column_of(owner_model, &hop.key)?)
            .eq(Expr::qualified(&alias, column_of(foreign, &hop.foreign_key)?));
        let index = ctx.joins.reserve(JoinEntry {
            signature,
            source_alias: source_alias.to_string(),
            alias: alias.clone(),
            join_type: hop.join_type,
            model: hop.foreign_model,
            on: on.clone(),
            parent,
        });

        if let Some(filter) = &filter {
            if let Some(extra) =
                self.translate_filter(ctx, hop.foreign_model, &alias, filter, Some(index))?
            {
                on = on.and(extra);
            }
        }
        ctx.joins.set_on(index, on);

        tracing::debug!(
            %alias,
            from = source_alias,
            to = foreign.name(),
            join_type = ?hop.join_type,
            "planned join"
        );
        Ok(alias)
    }

    /// Join every hop of a single-value `towards` chain.
    ///
    /// Returns the leaf model and the alias its columns are reachable under.
    pub(crate) fn follow(
        &self,
        ctx: &mut QueryContext,
        owner: ModelRef,
        alias: &str,
        hop: &Hop,
        parent: Option<usize>,
    ) -> Result<(ModelRef, String)> {
        let mut owner = owner;
        let mut alias = alias.to_string();
        let mut next = Some(hop);
        while let Some(h) = next {
            alias = self.add_join(ctx, owner, &alias, h, parent)?;
            owner = h.foreign_model;
            next = h.towards.as_deref();
        }
        Ok((owner, alias))
    }
}
