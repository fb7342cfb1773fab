//! Mapping flat rows back into nested records.

use crate::context::{AttributeNode, AttributeTree, ChildLink, ChildShape};
use sqlnest_core::{Node, Record, Row, ValueKey};
use std::collections::HashMap;

/// Child nodes grouped by the parent key value they belong to.
pub type Groups = HashMap<ValueKey, Vec<Node>>;

/// Wrap one row following `tree`.
///
/// Columns missing from the row become NULL. Collection branches are left
/// empty; [`assemble`] fills them from fetched child rows.
pub fn wrap(row: &Row, tree: &AttributeTree) -> Record {
    build(row, tree, &[], &[])
}

/// Wrap one row, filling collection branches from `groups` (indexed like
/// `children`).
pub fn assemble(row: &Row, tree: &AttributeTree, children: &[ChildLink], groups: &[Groups]) -> Record {
    build(row, tree, children, groups)
}

fn build(row: &Row, tree: &AttributeTree, children: &[ChildLink], groups: &[Groups]) -> Record {
    let mut record = Record::with_capacity(tree.len());
    for (alias, node) in tree.iter() {
        let value = match node {
            AttributeNode::Column(col) => Node::Value(row.value_or_null(col)),
            AttributeNode::Object(sub) => Node::Object(build(row, sub, children, groups)),
            AttributeNode::Many(i) => {
                let items = children
                    .get(*i)
                    .and_then(|link| row.value_or_null(&link.parent_key).key())
                    .and_then(|key| groups.get(*i)?.get(&key))
                    .cloned()
                    .unwrap_or_default();
                Node::List(items)
            }
            AttributeNode::Calculated { inputs, compute } => {
                let mut args = Record::with_capacity(inputs.len());
                for (name, col) in inputs {
                    args.insert(name.as_str(), Node::Value(row.value_or_null(col)));
                }
                Node::Value(compute.call(&args))
            }
        };
        record.insert(alias, value);
    }
    record
}

/// Group a child's rows by its foreign-key column.
///
/// Rows whose key is NULL cannot belong to any parent and are skipped.
pub fn group_rows(link: &ChildLink, rows: &[Row], records: Vec<Record>) -> Groups {
    let mut groups: Groups = HashMap::new();
    for (row, record) in rows.iter().zip(records) {
        let Some(key) = row.value_or_null(&link.group_key).key() else {
            continue;
        };
        let node = match &link.shape {
            ChildShape::Objects => Node::Object(record),
            ChildShape::Values(col) => Node::Value(row.value_or_null(col)),
        };
        groups.entry(key).or_default().push(node);
    }
    groups
}
