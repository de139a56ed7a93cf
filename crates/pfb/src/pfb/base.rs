//! Node schema table shared by the reader and writer.
//!
//! Node schemas are held in decoded form (enum symbols as the consumer sees
//! them). The on-disk form is derived on demand by running every field
//! through [`transcode_field`].

use std::borrow::Cow;
use std::cell::OnceCell;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::codec::ident;
use crate::error::FormatError;
use crate::model::{Entity, EnumSite, Field, RecordSchema, Schema, Value};
use crate::pfb::envelope;

/// Which way enum identifiers are being mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Consumer text to on-disk identifier.
    Encode,
    /// On-disk identifier to consumer text.
    Decode,
}

impl Direction {
    /// Maps one identifier.
    pub fn apply(self, text: &str) -> Cow<'_, str> {
        match self {
            Direction::Encode => ident::encode(text),
            Direction::Decode => ident::decode(text),
        }
    }

    fn apply_in_place(self, text: &mut String) {
        if let Cow::Owned(mapped) = self.apply(text) {
            *text = mapped;
        }
    }
}

/// Maps the enum identifiers of one field.
///
/// Every symbol of every enum the field holds is mapped. Enums used as array
/// items also get their name mapped. A string default is mapped only when
/// the field holds an enum directly.
pub fn transcode_field(field: &mut Field, direction: Direction) {
    let mut direct = false;
    field.schema.visit_enums_mut(&mut |e, site| {
        for symbol in &mut e.symbols {
            direction.apply_in_place(symbol);
        }
        if let Some(default) = &mut e.default {
            direction.apply_in_place(default);
        }
        match site {
            EnumSite::Direct => direct = true,
            EnumSite::ArrayItem => direction.apply_in_place(&mut e.name),
        }
    });
    if direct {
        if let Some(Json::String(default)) = &mut field.default {
            direction.apply_in_place(default);
        }
    }
}

fn transcode_nodes(nodes: &[RecordSchema], direction: Direction) -> Vec<RecordSchema> {
    nodes
        .iter()
        .map(|node| {
            let mut node = node.clone();
            for field in &mut node.fields {
                transcode_field(field, direction);
            }
            node
        })
        .collect()
}

/// Deep copies decoded node schemas into their on-disk form.
pub fn encode_nodes(nodes: &[RecordSchema]) -> Vec<RecordSchema> {
    transcode_nodes(nodes, Direction::Encode)
}

/// Deep copies on-disk node schemas into their decoded form.
pub fn decode_nodes(nodes: &[RecordSchema]) -> Vec<RecordSchema> {
    transcode_nodes(nodes, Direction::Decode)
}

/// Maps a string (or enum) value, or each string element of an array.
pub(crate) fn transcode_value(value: &mut Value, direction: Direction) {
    match value {
        Value::String(s) | Value::Enum(s) => direction.apply_in_place(s),
        Value::Array(items) => {
            for item in items {
                if let Value::String(s) | Value::Enum(s) = item {
                    direction.apply_in_place(s);
                }
            }
        }
        _ => {}
    }
}

/// The decoded node schemas of a container.
#[derive(Debug, Clone, Default)]
pub struct NodeSchemas {
    nodes: Vec<RecordSchema>,
    /// node name -> names of fields holding enums
    enum_fields: OnceCell<FxHashMap<String, FxHashSet<String>>>,
}

impl PartialEq for NodeSchemas {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl NodeSchemas {
    /// Wraps node schemas that are already in decoded form.
    pub fn new(nodes: Vec<RecordSchema>) -> Self {
        Self {
            nodes,
            enum_fields: OnceCell::new(),
        }
    }

    /// Builds the table from on-disk node schemas.
    pub fn from_encoded(nodes: &[RecordSchema]) -> Self {
        Self::new(decode_nodes(nodes))
    }

    /// Builds the table from an on-disk envelope schema.
    pub fn from_envelope(schema: &Schema) -> Result<Self, FormatError> {
        Ok(Self::from_encoded(&envelope::split_envelope(schema)?))
    }

    /// The node schemas, in union order.
    pub fn nodes(&self) -> &[RecordSchema] {
        &self.nodes
    }

    /// Consumes the table, returning the node schemas.
    pub fn into_nodes(self) -> Vec<RecordSchema> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node schema by name.
    pub fn get(&self, name: &str) -> Option<&RecordSchema> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Looks up a node schema by name for mutation.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut RecordSchema> {
        self.invalidate();
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    /// Position of a node in the table.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Drops the memoized enum-field table.
    pub fn invalidate(&mut self) {
        self.enum_fields.take();
    }

    /// Whether `field` of `node` holds enum values (directly, in a union,
    /// or as array items). Unknown nodes and fields answer `false`.
    pub fn is_encode(&self, node: &str, field: &str) -> bool {
        self.enum_fields
            .get_or_init(|| {
                self.nodes
                    .iter()
                    .map(|n| {
                        let fields = n
                            .fields
                            .iter()
                            .filter(|f| f.schema.has_enum())
                            .map(|f| f.name.clone())
                            .collect();
                        (n.name.clone(), fields)
                    })
                    .collect()
            })
            .get(node)
            .is_some_and(|fields| fields.contains(field))
    }

    /// Maps the enum-typed values of a record.
    pub(crate) fn transcode_entity(&self, entity: &mut Entity, direction: Direction) {
        for (field, value) in entity.object.iter_mut() {
            if !value.is_null() && self.is_encode(&entity.name, field) {
                transcode_value(value, direction);
            }
        }
    }

    /// The on-disk form of the node schemas.
    pub fn encoded(&self) -> Vec<RecordSchema> {
        encode_nodes(&self.nodes)
    }

    /// The on-disk envelope schema.
    pub fn envelope(&self) -> Schema {
        envelope::envelope_schema(&self.encoded())
    }

    /// Builds a template record of node type `node`.
    ///
    /// Each field gets a placeholder for the first type found walking its
    /// union branches from last to first: zero for numbers, `""` for
    /// strings, the first symbol for enums. Fields with none of these get
    /// their default (or null). The record gets a fresh random id and no
    /// relations.
    pub fn make_empty_record(&self, node: &str) -> Result<Entity, FormatError> {
        let record = self.get(node).ok_or_else(|| FormatError::UnknownNode {
            name: node.to_string(),
        })?;
        let mut entity = Entity::new(record.name.clone());
        entity.id = Some(Uuid::new_v4().to_string());
        for field in &record.fields {
            entity.object.insert(field.name.clone(), placeholder(field));
        }
        Ok(entity)
    }

    /// Renames node `old` to `new`. Returns false if there is no such node,
    /// or if `new` already names a different node.
    ///
    /// The old name is kept as an alias. Enum names inside the node's fields
    /// that start with `{old}_` get the `{new}_` prefix instead.
    pub(crate) fn rename_node(&mut self, old: &str, new: &str) -> bool {
        if old != new && self.position(new).is_some() {
            return false;
        }
        let Some(node) = self.nodes.iter_mut().find(|n| n.name == old) else {
            return false;
        };
        if !node.aliases.iter().any(|a| a == old) {
            node.aliases.push(old.to_string());
        }
        node.name = new.to_string();
        let prefix = format!("{}_", old);
        for field in &mut node.fields {
            field.schema.visit_enums_mut(&mut |e, _| {
                if let Some(rest) = e.name.strip_prefix(&prefix) {
                    e.name = format!("{}_{}", new, rest);
                }
            });
        }
        self.invalidate();
        true
    }

    /// Replaces enum symbol `old` with `new` in every node whose `field`
    /// declares it. Returns the names of the nodes that changed.
    ///
    /// If `new` is already a symbol of an enum, `old` is dropped from it.
    pub(crate) fn rename_enum(&mut self, field: &str, old: &str, new: &str) -> Vec<String> {
        let mut renamed = Vec::new();
        for node in &mut self.nodes {
            let Some(f) = node.field_mut(field) else {
                continue;
            };
            let mut hit = false;
            f.schema.visit_enums_mut(&mut |e, _| {
                let Some(i) = e.index_of(old) else {
                    return;
                };
                if e.index_of(new).is_some() {
                    e.symbols.remove(i);
                } else {
                    e.symbols[i] = new.to_string();
                }
                if e.default.as_deref() == Some(old) {
                    e.default = Some(new.to_string());
                }
                hit = true;
            });
            if !hit {
                continue;
            }
            if matches!(&f.default, Some(Json::String(d)) if d == old) {
                f.default = Some(Json::String(new.to_string()));
            }
            renamed.push(node.name.clone());
        }
        if !renamed.is_empty() {
            self.invalidate();
        }
        renamed
    }
}

fn placeholder(field: &Field) -> Value {
    for branch in field.schema.branches().iter().rev() {
        match branch {
            Schema::Int => return Value::Int(0),
            Schema::Long => return Value::Long(0),
            Schema::Float => return Value::Float(0.0),
            Schema::Double => return Value::Double(0.0),
            Schema::String => return Value::String(String::new()),
            Schema::Enum(e) => {
                if let Some(first) = e.symbols.first() {
                    return Value::Enum(first.clone());
                }
            }
            _ => {}
        }
    }
    field
        .default
        .as_ref()
        .map(Value::from_json)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::EnumSchema;

    fn status_enum(name: &str) -> Schema {
        Schema::Enum(EnumSchema::new(
            name,
            vec!["Not Reported".into(), "ok".into()],
        ))
    }

    fn person() -> RecordSchema {
        RecordSchema::new(
            "person",
            vec![
                Field::new("name", Schema::Union(vec![Schema::Null, Schema::String]))
                    .with_default(json!(null)),
                Field::new(
                    "status",
                    Schema::Union(vec![status_enum("person_status"), Schema::Null]),
                )
                .with_default(json!("Not Reported")),
                Field::new(
                    "tags",
                    Schema::Array(Box::new(status_enum("person_tags"))),
                ),
                Field::new("age", Schema::Union(vec![Schema::Null, Schema::Long])),
            ],
        )
    }

    #[test]
    fn test_transcode_direct_enum_and_default() {
        let mut field = person().fields[1].clone();
        transcode_field(&mut field, Direction::Encode);

        let Schema::Union(branches) = &field.schema else {
            panic!("expected union");
        };
        let Schema::Enum(e) = &branches[0] else {
            panic!("expected enum");
        };
        assert_eq!(e.symbols, vec!["Not_20_Reported", "ok"]);
        // Direct enum names stay as they are
        assert_eq!(e.name, "person_status");
        assert_eq!(field.default, Some(json!("Not_20_Reported")));

        transcode_field(&mut field, Direction::Decode);
        assert_eq!(field, person().fields[1]);
    }

    #[test]
    fn test_transcode_array_item_enum_name() {
        let mut field = person().fields[2].clone();
        transcode_field(&mut field, Direction::Encode);
        let Schema::Array(items) = &field.schema else {
            panic!("expected array");
        };
        let Schema::Enum(e) = items.as_ref() else {
            panic!("expected enum items");
        };
        assert_eq!(e.name, "person_5f_tags");
        assert_eq!(e.symbols[0], "Not_20_Reported");
    }

    #[test]
    fn test_non_enum_fields_untouched() {
        let mut field = Field::new("note", Schema::String).with_default(json!("a b"));
        transcode_field(&mut field, Direction::Encode);
        assert_eq!(field.default, Some(json!("a b")));
    }

    #[test]
    fn test_encode_decode_nodes_inverse() {
        let nodes = vec![person()];
        assert_eq!(decode_nodes(&encode_nodes(&nodes)), nodes);
        assert_ne!(encode_nodes(&nodes), nodes);
    }

    #[test]
    fn test_is_encode() {
        let schemas = NodeSchemas::new(vec![person()]);
        assert!(schemas.is_encode("person", "status"));
        assert!(schemas.is_encode("person", "tags"));
        assert!(!schemas.is_encode("person", "name"));
        assert!(!schemas.is_encode("person", "missing"));
        assert!(!schemas.is_encode("nobody", "status"));
    }

    #[test]
    fn test_cache_invalidated_on_mutation() {
        let mut schemas = NodeSchemas::new(vec![person()]);
        assert!(!schemas.is_encode("person", "name"));
        if let Some(node) = schemas.get_mut("person") {
            node.fields[0].schema = status_enum("person_name");
        }
        assert!(schemas.is_encode("person", "name"));

        assert!(schemas.rename_node("person", "human"));
        assert!(schemas.is_encode("human", "status"));
        assert!(!schemas.is_encode("person", "status"));
    }

    #[test]
    fn test_make_empty_record() {
        let schemas = NodeSchemas::new(vec![person()]);
        let record = schemas.make_empty_record("person").unwrap();
        assert_eq!(record.name, "person");
        assert!(Uuid::parse_str(record.id.as_deref().unwrap()).is_ok());
        assert!(record.relations.is_empty());
        assert_eq!(record.get("name"), Some(&Value::String(String::new())));
        assert_eq!(record.get("status"), Some(&Value::Enum("Not Reported".into())));
        assert_eq!(record.get("age"), Some(&Value::Long(0)));
        // Arrays fall back to their (absent) default
        assert_eq!(record.get("tags"), Some(&Value::Null));

        assert_eq!(
            schemas.make_empty_record("nobody"),
            Err(FormatError::UnknownNode {
                name: "nobody".into()
            })
        );
    }

    #[test]
    fn test_rename_node_schema() {
        let mut schemas = NodeSchemas::new(vec![person()]);
        assert!(schemas.rename_node("person", "human"));
        let node = schemas.get("human").unwrap();
        assert_eq!(node.aliases, vec!["person"]);
        let mut names = Vec::new();
        for field in &node.fields {
            field.schema.visit_enums(&mut |e, _| names.push(e.name.clone()));
        }
        assert_eq!(names, vec!["human_status", "human_tags"]);

        // Renaming back and forth does not duplicate aliases
        assert!(schemas.rename_node("human", "person"));
        assert!(schemas.rename_node("person", "human"));
        assert_eq!(schemas.get("human").unwrap().aliases, vec!["person", "human"]);

        assert!(!schemas.rename_node("person", "other"));
    }

    #[test]
    fn test_rename_node_only_touches_prefix() {
        let node = RecordSchema::new(
            "a",
            vec![Field::new("category", status_enum("a_category"))],
        );
        let mut schemas = NodeSchemas::new(vec![node]);
        assert!(schemas.rename_node("a", "b"));
        let mut names = Vec::new();
        schemas.get("b").unwrap().fields[0]
            .schema
            .visit_enums(&mut |e, _| names.push(e.name.clone()));
        assert_eq!(names, vec!["b_category"]);
    }

    #[test]
    fn test_rename_node_onto_existing_node() {
        let mut pet = person();
        pet.name = "pet".into();
        let mut schemas = NodeSchemas::new(vec![person(), pet]);
        assert!(!schemas.rename_node("person", "pet"));
        assert_eq!(schemas.position("person"), Some(0));
        assert_eq!(schemas.position("pet"), Some(1));
        assert!(schemas.get("person").unwrap().aliases.is_empty());
    }

    #[test]
    fn test_rename_enum_schema() {
        let mut other = person();
        other.name = "pet".into();
        if let Some(f) = other.field_mut("status") {
            f.schema = Schema::Union(vec![
                Schema::Enum(EnumSchema::new("pet_status", vec!["ok".into()])),
                Schema::Null,
            ]);
            f.default = Some(json!("ok"));
        }
        let mut schemas = NodeSchemas::new(vec![person(), other]);

        let renamed = schemas.rename_enum("status", "Not Reported", "Unknown");
        assert_eq!(renamed, vec!["person"]);
        let status = schemas.get("person").unwrap().field("status").unwrap();
        assert_eq!(status.default, Some(json!("Unknown")));
        assert_eq!(status.schema.branches()[0], status_enum_with("Unknown"));
        // The other node's default is untouched
        assert_eq!(
            schemas.get("pet").unwrap().field("status").unwrap().default,
            Some(json!("ok"))
        );

        assert!(schemas.rename_enum("status", "Not Reported", "x").is_empty());
    }

    fn status_enum_with(first: &str) -> Schema {
        Schema::Enum(EnumSchema::new(
            "person_status",
            vec![first.into(), "ok".into()],
        ))
    }

    #[test]
    fn test_rename_enum_merges_existing_symbol() {
        let mut schemas = NodeSchemas::new(vec![person()]);
        schemas.rename_enum("status", "Not Reported", "ok");
        let status = schemas.get("person").unwrap().field("status").unwrap();
        let Schema::Enum(e) = &status.schema.branches()[0] else {
            panic!("expected enum");
        };
        assert_eq!(e.symbols, vec!["ok"]);
        assert_eq!(status.default, Some(json!("ok")));
    }

    #[test]
    fn test_transcode_entity() {
        let schemas = NodeSchemas::new(vec![person()]);
        let mut entity = Entity::new("person");
        entity.set("status", "Not Reported");
        entity.set("name", "A B");
        entity.set("tags", vec!["Not Reported", "ok"]);
        schemas.transcode_entity(&mut entity, Direction::Encode);
        assert_eq!(entity.get("status"), Some(&Value::from("Not_20_Reported")));
        assert_eq!(entity.get("name"), Some(&Value::from("A B")));
        assert_eq!(
            entity.get("tags"),
            Some(&Value::from(vec!["Not_20_Reported", "ok"]))
        );
    }
}
