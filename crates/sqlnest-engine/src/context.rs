//! Query contexts: the planner's unit of work.
//!
//! A [`QueryContext`] owns everything needed to render one SELECT: the
//! column and join registries, the resolved attribute tree, WHERE and ORDER BY.
//! One-to-many attributes hang off it as [`ChildLink`]s, each holding a
//! further context that is executed once the parent's key values are known.
//!
//! Registries are append-only while the context is being built. A
//! [`Checkpoint`] records their lengths so a failed attribute can be rolled
//! back in silent mode without leaving stray joins behind.

use sqlnest_core::{ComputeFn, JoinType, Model, ModelRef, Orm};
use sqlnest_query::{Expr, Join, OrderBy, Select};
use std::collections::HashMap;

/// Alias of the context's own table in every rendered query.
pub const ROOT_ALIAS: &str = "t";

/// Batch slot used by a child context's key filter.
pub const BATCH_SLOT: usize = 0;

/// Logical `alias.column` references mapped to generated `colN` names.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    entries: Vec<ColumnEntry>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct ColumnEntry {
    pub table_alias: String,
    pub column: String,
    pub generated: String,
}

impl ColumnRegistry {
    /// Register a column, reusing the generated name of an earlier request.
    pub fn register(&mut self, table_alias: &str, column: &str) -> String {
        let logical = format!("{table_alias}.{column}");
        if let Some(&i) = self.index.get(&logical) {
            return self.entries[i].generated.clone();
        }
        let generated = format!("col{}", self.entries.len() + 1);
        self.index.insert(logical, self.entries.len());
        self.entries.push(ColumnEntry {
            table_alias: table_alias.to_string(),
            column: column.to_string(),
            generated: generated.clone(),
        });
        generated
    }

    /// Generated name of a registered column.
    pub fn generated(&self, table_alias: &str, column: &str) -> Option<&str> {
        self.index
            .get(&format!("{table_alias}.{column}"))
            .map(|&i| self.entries[i].generated.as_str())
    }

    pub fn entries(&self) -> &[ColumnEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn truncate(&mut self, len: usize) {
        for entry in self.entries.drain(len..) {
            self.index
                .remove(&format!("{}.{}", entry.table_alias, entry.column));
        }
    }
}

/// A planned join.
#[derive(Debug, Clone)]
pub struct JoinEntry {
    /// De-duplication key
    pub signature: String,
    /// Alias the join was made from
    pub source_alias: String,
    /// Alias assigned to the joined table (`j1`, `j2`, ...)
    pub alias: String,
    pub join_type: JoinType,
    pub model: ModelRef,
    /// Final ON predicate, including the association filter
    pub on: Expr,
    /// Join whose ON predicate needed this one
    pub parent: Option<usize>,
}

/// Planned joins keyed by signature.
#[derive(Debug, Clone, Default)]
pub struct JoinRegistry {
    entries: Vec<JoinEntry>,
    index: HashMap<String, usize>,
}

impl JoinRegistry {
    pub fn find(&self, signature: &str) -> Option<&JoinEntry> {
        self.index.get(signature).map(|&i| &self.entries[i])
    }

    /// Next sequential alias.
    pub fn next_alias(&self) -> String {
        format!("j{}", self.entries.len() + 1)
    }

    /// Reserve a slot so joins created while building this one's ON clause
    /// get later aliases and can point back at it.
    pub(crate) fn reserve(&mut self, entry: JoinEntry) -> usize {
        let i = self.entries.len();
        self.index.insert(entry.signature.clone(), i);
        self.entries.push(entry);
        i
    }

    pub(crate) fn set_on(&mut self, i: usize, on: Expr) {
        self.entries[i].on = on;
    }

    pub fn entries(&self) -> &[JoinEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn truncate(&mut self, len: usize) {
        for entry in self.entries.drain(len..) {
            self.index.remove(&entry.signature);
        }
    }

    /// Render the join list, grouping dependent joins under their parent.
    pub fn to_joins(&self, orm: &Orm) -> Vec<Join> {
        self.build_level(orm, None)
    }

    fn build_level(&self, orm: &Orm, parent: Option<usize>) -> Vec<Join> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.parent == parent)
            .map(|(i, e)| {
                let model = orm.model(e.model);
                let mut join = Join::new(e.join_type, model.table(), &e.alias, e.on.clone())
                    .schema(model.schema().map(str::to_string));
                for nested in self.build_level(orm, Some(i)) {
                    join = join.nest(nested);
                }
                join
            })
            .collect()
    }
}

/// Output shape of one attribute.
#[derive(Debug, Clone)]
pub enum AttributeNode {
    /// Copy a generated column
    Column(String),
    /// Nested one-to-one object
    Object(AttributeTree),
    /// Collection filled from the child context at this index
    Many(usize),
    /// Computed from the named generated columns
    Calculated {
        inputs: Vec<(String, String)>,
        compute: ComputeFn,
    },
}

/// Ordered alias -> node mapping.
#[derive(Debug, Clone, Default)]
pub struct AttributeTree {
    entries: Vec<(String, AttributeNode)>,
}

impl AttributeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.iter().any(|(a, _)| a == alias)
    }

    pub fn push(&mut self, alias: impl Into<String>, node: AttributeNode) {
        self.entries.push((alias.into(), node));
    }

    pub fn get(&self, alias: &str) -> Option<&AttributeNode> {
        self.entries.iter().find(|(a, _)| a == alias).map(|(_, n)| n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeNode)> {
        self.entries.iter().map(|(a, n)| (a.as_str(), n))
    }

    /// Aliases at this level, in order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(a, _)| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a child's rows are attached to the parent.
#[derive(Debug, Clone)]
pub enum ChildShape {
    /// One object per row, following the child's attribute tree
    Objects,
    /// One scalar per row from the named generated column
    Values(String),
}

/// A one-to-many attribute executed as a separate batched query.
#[derive(Debug, Clone)]
pub struct ChildLink {
    /// Attribute alias this child fills
    pub alias: String,
    /// Generated column in the parent holding the key values
    pub parent_key: String,
    /// Generated column in the child holding the matching foreign key
    pub group_key: String,
    pub shape: ChildShape,
    pub context: QueryContext,
}

/// Registry lengths at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    columns: usize,
    joins: usize,
    children: usize,
}

/// One SELECT plus the children that depend on its rows.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub(crate) model: ModelRef,
    pub(crate) table: String,
    pub(crate) schema: Option<String>,
    pub(crate) tree: AttributeTree,
    pub(crate) columns: ColumnRegistry,
    pub(crate) joins: JoinRegistry,
    pub(crate) where_clause: Option<Expr>,
    pub(crate) order_by: Vec<OrderBy>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) children: Vec<ChildLink>,
    /// Rendered join list, fixed once building completes
    pub(crate) rendered_joins: Vec<Join>,
}

impl QueryContext {
    pub(crate) fn new(model_ref: ModelRef, model: &Model) -> Self {
        Self {
            model: model_ref,
            table: model.table().to_string(),
            schema: model.schema().map(str::to_string),
            tree: AttributeTree::new(),
            columns: ColumnRegistry::default(),
            joins: JoinRegistry::default(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            children: Vec::new(),
            rendered_joins: Vec::new(),
        }
    }

    pub fn model(&self) -> ModelRef {
        self.model
    }

    pub fn tree(&self) -> &AttributeTree {
        &self.tree
    }

    pub fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }

    pub fn joins(&self) -> &JoinRegistry {
        &self.joins
    }

    pub fn children(&self) -> &[ChildLink] {
        &self.children
    }

    /// Whether this context waits for parent keys before it can run.
    pub fn is_batched(&self) -> bool {
        self.where_clause.as_ref().is_some_and(Expr::has_batch)
    }

    pub(crate) fn add_filter(&mut self, expr: Expr) {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            columns: self.columns.len(),
            joins: self.joins.len(),
            children: self.children.len(),
        }
    }

    pub(crate) fn rollback(&mut self, cp: Checkpoint) {
        self.columns.truncate(cp.columns);
        self.joins.truncate(cp.joins);
        self.children.truncate(cp.children);
    }

    /// Fix the join list; called once the context and its children are built.
    pub(crate) fn seal(&mut self, orm: &Orm) {
        self.rendered_joins = self.joins.to_joins(orm);
        for child in &mut self.children {
            child.context.seal(orm);
        }
    }

    /// The SELECT this context runs, with batch placeholders still unbound.
    pub fn select(&self) -> Select {
        let mut select = Select::from(&self.table, ROOT_ALIAS).schema(self.schema.clone());
        for col in self.columns.entries() {
            select = select.column(
                Expr::qualified(&col.table_alias, &col.column),
                &col.generated,
            );
        }
        for join in &self.rendered_joins {
            select = select.join(join.clone());
        }
        if let Some(expr) = &self.where_clause {
            select = select.filter(expr.clone());
        }
        for order in &self.order_by {
            select = select.order_by(order.clone());
        }
        if let Some(n) = self.limit {
            select = select.limit(n);
        }
        if let Some(n) = self.offset {
            select = select.offset(n);
        }
        select
    }
}
