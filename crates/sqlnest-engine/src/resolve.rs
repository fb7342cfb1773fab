//! Attribute resolution.
//!
//! Walks a requested attribute list against a model and produces the
//! [`AttributeTree`] the assembler follows. Data fields register columns,
//! single-value associations add joins and either a flat column or a nested
//! object, and one-to-many associations spawn a batched child context.

use crate::context::{
    AttributeNode, AttributeTree, BATCH_SLOT, ChildLink, ChildShape, QueryContext, ROOT_ALIAS,
};
use crate::joins::column_of;
use crate::planner::Build;
use sqlnest_core::{
    AssociatedField, AttributeSpec, Attributes, Error, Field, ModelRef, Result, UsageErrorKind,
};
use sqlnest_query::Expr;

impl Build<'_> {
    /// Resolve `attributes` (or the model's data fields) at `alias`.
    ///
    /// In silent mode a resolution error drops the offending alias and rolls
    /// back whatever it had registered.
    pub(crate) fn resolve_attributes(
        &self,
        ctx: &mut QueryContext,
        model_ref: ModelRef,
        alias: &str,
        attributes: Option<&Attributes>,
    ) -> Result<AttributeTree> {
        let model = self.orm.model(model_ref);
        let specs: Vec<AttributeSpec> = match attributes {
            Some(attrs) => attrs.iter().cloned().collect(),
            None => model
                .data_fields()
                .map(|d| AttributeSpec::field(&d.name))
                .collect(),
        };

        let mut tree = AttributeTree::new();
        for spec in &specs {
            let checkpoint = ctx.checkpoint();
            let resolved = if tree.contains(&spec.alias) {
                Err(Error::usage(
                    UsageErrorKind::DuplicateAlias,
                    model.name(),
                    &spec.alias,
                    "is requested more than once",
                ))
            } else {
                self.resolve_one(ctx, model_ref, alias, spec)
            };
            match resolved {
                Ok(node) => tree.push(&spec.alias, node),
                Err(err) if self.silent && err.is_resolution_error() => {
                    ctx.rollback(checkpoint);
                    tracing::debug!(alias = %spec.alias, error = %err, "dropping attribute in silent mode");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(tree)
    }

    fn resolve_one(
        &self,
        ctx: &mut QueryContext,
        model_ref: ModelRef,
        alias: &str,
        spec: &AttributeSpec,
    ) -> Result<AttributeNode> {
        let model = self.orm.model(model_ref);
        let field = model
            .field(&spec.field)
            .ok_or_else(|| Error::unknown_field(model.qualified_name(), &spec.field))?;

        match field {
            Field::Data(data) => {
                if spec.sub_field.is_some() || spec.attributes.is_some() {
                    return Err(Error::usage(
                        UsageErrorKind::SubFieldOnSingleValue,
                        model.name(),
                        &data.name,
                        "is a data field and has no sub value",
                    ));
                }
                Ok(AttributeNode::Column(
                    ctx.columns.register(alias, &data.column_name),
                ))
            }
            Field::Calculated(calc) => {
                if spec.sub_field.is_some() || spec.attributes.is_some() {
                    return Err(Error::usage(
                        UsageErrorKind::SubFieldOnSingleValue,
                        model.name(),
                        &calc.name,
                        "is a calculated field and has no sub value",
                    ));
                }
                let mut inputs = Vec::with_capacity(calc.requires.len());
                for name in &calc.requires {
                    let column = column_of(model, name)?;
                    inputs.push((name.clone(), ctx.columns.register(alias, &column)));
                }
                Ok(AttributeNode::Calculated {
                    inputs,
                    compute: calc.compute.clone(),
                })
            }
            Field::Associated(assoc) if assoc.has_many() => {
                if spec.sub_field.is_some() {
                    return Err(Error::usage(
                        UsageErrorKind::SubFieldOnMultiValue,
                        model.name(),
                        &assoc.name,
                        "is a multi value associated field and has no sub value",
                    ));
                }
                self.spawn_child(ctx, model_ref, alias, assoc, spec)
            }
            Field::Associated(assoc) => {
                let leaf = assoc.leaf();
                if leaf.field_name.is_some() && (spec.sub_field.is_some() || spec.attributes.is_some()) {
                    return Err(Error::usage(
                        UsageErrorKind::SubFieldOnSingleValue,
                        model.name(),
                        &assoc.name,
                        "is a single value associated field and has no sub value",
                    ));
                }
                let (leaf_model, leaf_alias) = self.follow(ctx, model_ref, alias, &assoc.hop, None)?;
                if let Some(field_name) = &leaf.field_name {
                    let column = column_of(self.orm.model(leaf_model), field_name)?;
                    return Ok(AttributeNode::Column(
                        ctx.columns.register(&leaf_alias, &column),
                    ));
                }
                if let Some(sub) = &spec.sub_field {
                    return self.resolve_one(ctx, leaf_model, &leaf_alias, &AttributeSpec::field(sub));
                }
                let requested = spec.attributes.as_ref().or_else(|| default_attributes(assoc));
                let tree = self.resolve_attributes(ctx, leaf_model, &leaf_alias, requested)?;
                Ok(AttributeNode::Object(tree))
            }
        }
    }

    /// Build the batched child context for a one-to-many attribute.
    fn spawn_child(
        &self,
        ctx: &mut QueryContext,
        model_ref: ModelRef,
        alias: &str,
        assoc: &AssociatedField,
        spec: &AttributeSpec,
    ) -> Result<AttributeNode> {
        let owner = self.orm.model(model_ref);
        let hop = &assoc.hop;
        let foreign_ref = hop.foreign_model;
        let foreign = self.orm.model(foreign_ref);

        let parent_key = ctx.columns.register(alias, &column_of(owner, &hop.key)?);

        let mut child = QueryContext::new(foreign_ref, foreign);
        let fk_column = column_of(foreign, &hop.foreign_key)?;
        let group_key = child.columns.register(ROOT_ALIAS, &fk_column);
        child.add_filter(Expr::qualified(ROOT_ALIAS, &fk_column).batch(BATCH_SLOT));

        if let Some(join_filter) = &hop.filter {
            let filter = join_filter.materialize(self.request);
            if let Some(expr) = self.translate_filter(&mut child, foreign_ref, ROOT_ALIAS, &filter, None)? {
                child.add_filter(expr);
            }
        }

        // Further hops (junction -> target) are joins inside the child.
        let (leaf_model, leaf_alias) = match &hop.towards {
            Some(next) => self.follow(&mut child, foreign_ref, ROOT_ALIAS, next, None)?,
            None => (foreign_ref, ROOT_ALIAS.to_string()),
        };

        let shape = match &assoc.leaf().field_name {
            Some(field_name) => {
                if spec.attributes.is_some() {
                    return Err(Error::usage(
                        UsageErrorKind::SubFieldOnSingleValue,
                        owner.name(),
                        &assoc.name,
                        "is a single value associated field and has no sub value",
                    ));
                }
                let column = column_of(self.orm.model(leaf_model), field_name)?;
                ChildShape::Values(child.columns.register(&leaf_alias, &column))
            }
            None => {
                let requested = spec.attributes.as_ref().or_else(|| default_attributes(assoc));
                child.tree = self.resolve_attributes(&mut child, leaf_model, &leaf_alias, requested)?;
                ChildShape::Objects
            }
        };

        tracing::debug!(
            alias = %spec.alias,
            model = foreign.name(),
            children = child.children.len(),
            "planned child context"
        );

        let index = ctx.children.len();
        ctx.children.push(ChildLink {
            alias: spec.alias.clone(),
            parent_key,
            group_key,
            shape,
            context: child,
        });
        Ok(AttributeNode::Many(index))
    }
}

/// Default attributes declared on the association, first hop winning.
fn default_attributes(assoc: &AssociatedField) -> Option<&Attributes> {
    assoc.hop.attributes.as_ref().or(assoc.leaf().attributes.as_ref())
}
