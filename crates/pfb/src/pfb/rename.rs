//! Record-level rename operations registered by [`PfbWriter`].
//!
//! The schema side of a rename is applied once when it is registered; the
//! record side is a [`Rename`] value applied to every record written after.
//!
//! [`PfbWriter`]: crate::pfb::writer::PfbWriter

use crate::model::{Entity, Value};

/// A pending rename, applied to each record before it is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rename {
    /// Node type `from` became `to`.
    Node { from: String, to: String },
    /// Symbol `from` of enum field `field` became `to` in `nodes`.
    Enum {
        field: String,
        from: String,
        to: String,
        nodes: Vec<String>,
    },
}

impl Rename {
    /// Rewrites one record.
    pub fn apply(&self, entity: &mut Entity) {
        match self {
            Rename::Node { from, to } => {
                if entity.name == *from {
                    entity.name = to.clone();
                }
                for relation in &mut entity.relations {
                    if relation.dst_name == *from {
                        relation.dst_name = to.clone();
                    }
                }
            }
            Rename::Enum {
                field,
                from,
                to,
                nodes,
            } => {
                if !nodes.contains(&entity.name) {
                    return;
                }
                match entity.object.get_mut(field) {
                    Some(Value::Array(items)) => {
                        for item in items {
                            replace_symbol(item, from, to);
                        }
                    }
                    Some(value) => replace_symbol(value, from, to),
                    None => {}
                }
            }
        }
    }
}

fn replace_symbol(value: &mut Value, from: &str, to: &str) {
    if let Value::String(s) | Value::Enum(s) = value {
        if *s == *from {
            *s = to.to_string();
        }
    }
}
