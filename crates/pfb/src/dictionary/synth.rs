//! Dictionary to PFB schema synthesis.
//!
//! Each dictionary type becomes one node record schema plus one metadata
//! [`Node`]. Properties that cannot be mapped are dropped and reported as
//! [`UnsupportedType`] warnings; synthesis itself never fails.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};
use tracing::{debug, warn};

use crate::dictionary::{Dictionary, SynthesisOptions};
use crate::error::UnsupportedType;
use crate::limits::MAX_SCHEMA_DEPTH;
use crate::model::{
    EnumSchema, Field, Link, Metadata, Multiplicity, Node, Property, RecordSchema, Schema,
};
use crate::pfb::{base, envelope};

/// Identity and bookkeeping properties that never become fields.
const SKIPPED_PROPERTIES: [&str; 3] = ["id", "type", "attribution"];

/// Output of schema synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    /// Node record schemas, with plain (decoded) enum symbols.
    pub nodes: Vec<RecordSchema>,
    pub metadata: Metadata,
    pub warnings: Vec<UnsupportedType>,
}

impl Synthesized {
    /// The container envelope schema as it is stored on disk, with encoded
    /// enum symbols.
    pub fn canonical_schema(&self) -> Schema {
        envelope::envelope_schema(&base::encode_nodes(&self.nodes))
    }
}

/// Synthesizes node schemas and metadata with default options.
pub fn synthesize(dictionary: &Dictionary) -> Synthesized {
    synthesize_with_options(dictionary, &SynthesisOptions::default())
}

/// Synthesizes node schemas and metadata.
pub fn synthesize_with_options(dictionary: &Dictionary, options: &SynthesisOptions) -> Synthesized {
    let mut synth = Synthesizer {
        options: *options,
        warnings: Vec::new(),
    };
    let mut nodes = Vec::new();
    let mut meta_nodes = Vec::new();

    for (name, def) in dictionary.types() {
        let Some(def) = def.as_object() else {
            synth.warn(name, "", "type definition is not an object");
            continue;
        };
        let Some(properties) = def.get("properties").and_then(Json::as_object) else {
            synth.warn(name, "properties", "type has no properties map");
            continue;
        };
        let required: Vec<&str> = def
            .get("required")
            .and_then(Json::as_array)
            .map(|items| items.iter().filter_map(Json::as_str).collect())
            .unwrap_or_default();

        let mut fields = Vec::with_capacity(properties.len());
        let mut bindings = Vec::new();
        for (prop, prop_def) in properties {
            if SKIPPED_PROPERTIES.contains(&prop.as_str()) {
                continue;
            }
            let is_required = required.contains(&prop.as_str());
            if let Some(field) = synth.field(name, prop, prop_def, is_required) {
                fields.push(field);
            }
            if let Some(binding) = synth.binding(name, prop, prop_def) {
                bindings.push(binding);
            }
        }

        let mut node = Node::new(name);
        if let Some(term_def) = def.get("term").and_then(|t| t.get("termDef")) {
            match term_def.as_object() {
                Some(entries) => node.values = stringify_entries(entries, None),
                None => synth.warn(name, "term", "termDef is not an object"),
            }
        }
        node.links = synth.links(name, def.get("links"));
        node.properties = bindings;

        nodes.push(RecordSchema::new(name, fields));
        meta_nodes.push(node);
    }

    debug!(
        nodes = nodes.len(),
        warnings = synth.warnings.len(),
        "synthesized dictionary schema"
    );
    Synthesized {
        nodes,
        metadata: Metadata {
            nodes: meta_nodes,
            misc: BTreeMap::new(),
        },
        warnings: synth.warnings,
    }
}

struct Synthesizer {
    options: SynthesisOptions,
    warnings: Vec<UnsupportedType>,
}

impl Synthesizer {
    fn warn(&mut self, node: &str, property: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(node, property, reason = %reason, "unsupported dictionary entry");
        self.warnings.push(UnsupportedType {
            node: node.to_string(),
            property: property.to_string(),
            reason,
        });
    }

    fn field(&mut self, record: &str, prop: &str, def: &Json, required: bool) -> Option<Field> {
        let Some(def) = def.as_object() else {
            self.warn(record, prop, "property definition is not an object");
            return None;
        };
        let enum_name = format!("{}_{}", record, prop);
        let derived = match self.derive(record, prop, &enum_name, def, 0) {
            Ok(schema) => schema,
            Err(reason) => {
                self.warn(record, prop, reason);
                return None;
            }
        };

        let mut branches = Vec::new();
        push_branches(&mut branches, derived);
        let nullable = !(self.options.honor_required && required);
        if nullable && !branches.iter().any(Schema::is_null) {
            branches.push(Schema::Null);
        }

        let mut default = def.get("default").cloned();
        if let Some(value) = &default {
            if !branches.iter().any(|b| b.accepts_json(value)) {
                self.warn(
                    record,
                    prop,
                    format!("default {} matches no branch and was dropped", value),
                );
                default = None;
            }
        }

        let default = match default {
            Some(value) if !value.is_null() => {
                // The branch holding the default leads; null goes last
                if let Some(i) = branches.iter().position(|b| b.accepts_json(&value)) {
                    let branch = branches.remove(i);
                    branches.insert(0, branch);
                }
                if let Some(i) = branches.iter().position(Schema::is_null) {
                    let null = branches.remove(i);
                    branches.push(null);
                }
                Some(value)
            }
            _ => {
                if let Some(i) = branches.iter().position(Schema::is_null) {
                    let null = branches.remove(i);
                    branches.insert(0, null);
                    Some(Json::Null)
                } else if branches == [Schema::String] {
                    Some(Json::String(String::new()))
                } else {
                    None
                }
            }
        };

        let schema = if branches.len() == 1 {
            branches.remove(0)
        } else {
            Schema::Union(branches)
        };
        let mut field = Field::new(prop, schema);
        field.default = default;
        field.doc = def
            .get("description")
            .and_then(Json::as_str)
            .map(str::to_string);
        Some(field)
    }

    /// Derives the type of a property definition. Enums are named
    /// `enum_name`; `oneOf` alternative `i` uses `{enum_name}_{i}`.
    fn derive(
        &mut self,
        record: &str,
        prop: &str,
        enum_name: &str,
        def: &Map<String, Json>,
        depth: usize,
    ) -> Result<Schema, String> {
        if depth > MAX_SCHEMA_DEPTH {
            return Err("property type nests too deeply".into());
        }
        if let Some(symbols) = def.get("enum") {
            return self.enum_type(record, prop, enum_name, symbols);
        }
        if let Some(ty) = def.get("type") {
            return match ty {
                Json::String(name) => self.named_type(record, prop, enum_name, name, def, depth),
                Json::Array(names) => {
                    let mut branches = Vec::new();
                    for name in names {
                        let name = name
                            .as_str()
                            .ok_or_else(|| format!("type list entry {} is not a string", name))?;
                        let branch = self.named_type(record, prop, enum_name, name, def, depth)?;
                        push_branches(&mut branches, branch);
                    }
                    Ok(union_or_single(branches))
                }
                other => Err(format!("unsupported type declaration {}", other)),
            };
        }
        for key in ["oneOf", "anyOf"] {
            if let Some(alternatives) = def.get(key) {
                let alternatives = alternatives
                    .as_array()
                    .ok_or_else(|| format!("{} is not a list", key))?;
                let mut branches = Vec::new();
                for (i, alternative) in alternatives.iter().enumerate() {
                    let alternative = alternative
                        .as_object()
                        .ok_or_else(|| format!("{} alternative {} is not an object", key, i))?;
                    let name = format!("{}_{}", enum_name, i);
                    let branch = self.derive(record, prop, &name, alternative, depth + 1)?;
                    push_branches(&mut branches, branch);
                }
                if branches.is_empty() {
                    return Err(format!("{} has no alternatives", key));
                }
                return Ok(union_or_single(branches));
            }
        }
        if def.contains_key("$ref") {
            return Err("unresolved $ref".into());
        }
        Err("no type, enum or oneOf declaration".into())
    }

    fn named_type(
        &mut self,
        record: &str,
        prop: &str,
        enum_name: &str,
        name: &str,
        def: &Map<String, Json>,
        depth: usize,
    ) -> Result<Schema, String> {
        if name == "array" {
            let items = def
                .get("items")
                .and_then(Json::as_object)
                .ok_or("array without an items definition")?;
            let item = self.derive(record, prop, enum_name, items, depth + 1)?;
            return Ok(Schema::Array(Box::new(item)));
        }
        scalar(name).ok_or_else(|| format!("unsupported type {:?}", name))
    }

    fn enum_type(
        &mut self,
        record: &str,
        prop: &str,
        name: &str,
        symbols: &Json,
    ) -> Result<Schema, String> {
        let symbols = symbols.as_array().ok_or("enum is not a list")?;
        let mut unique: Vec<String> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let text = match symbol {
                Json::Null => continue,
                Json::String(s) => s.clone(),
                other => other.to_string(),
            };
            if unique.contains(&text) {
                self.warn(record, prop, format!("duplicate enum symbol {:?} removed", text));
                continue;
            }
            unique.push(text);
        }
        if unique.is_empty() {
            return Err("enum has no symbols".into());
        }
        Ok(Schema::Enum(EnumSchema::new(name, unique)))
    }

    fn binding(&mut self, record: &str, prop: &str, def: &Json) -> Option<Property> {
        let term_def = def.get("term")?.get("termDef")?;
        let Some(entries) = term_def.as_object() else {
            self.warn(record, prop, "termDef is not an object");
            return None;
        };
        let ontology_reference = match entries.get("term") {
            None | Some(Json::Null) => String::new(),
            Some(term) => json_text(term),
        };
        Some(Property {
            name: prop.to_string(),
            ontology_reference,
            values: stringify_entries(entries, Some("term")),
        })
    }

    fn links(&mut self, record: &str, links: Option<&Json>) -> Vec<Link> {
        let mut out = Vec::new();
        match links {
            None | Some(Json::Null) => {}
            Some(Json::Array(items)) => self.flatten_links(record, items, &mut out),
            Some(_) => self.warn(record, "links", "links is not a list"),
        }
        out
    }

    fn flatten_links(&mut self, record: &str, items: &[Json], out: &mut Vec<Link>) {
        for link in items {
            if let Some(subgroup) = link.get("subgroup") {
                match subgroup.as_array() {
                    Some(members) => self.flatten_links(record, members, out),
                    None => self.warn(record, "links", "subgroup is not a list"),
                }
                continue;
            }
            let name = link.get("name").and_then(Json::as_str);
            let dst = link.get("target_type").and_then(Json::as_str);
            let multiplicity = link
                .get("multiplicity")
                .and_then(Json::as_str)
                .and_then(|m| m.parse::<Multiplicity>().ok());
            match (name, dst, multiplicity) {
                (Some(name), Some(dst), Some(multiplicity)) => out.push(Link {
                    multiplicity,
                    dst: dst.to_string(),
                    name: name.to_string(),
                }),
                _ => self.warn(
                    record,
                    name.unwrap_or("links"),
                    "link needs name, target_type and a valid multiplicity",
                ),
            }
        }
    }
}

fn scalar(name: &str) -> Option<Schema> {
    match name {
        "integer" | "int" | "long" => Some(Schema::Long),
        "number" | "float" => Some(Schema::Float),
        "double" => Some(Schema::Double),
        "string" => Some(Schema::String),
        "boolean" => Some(Schema::Boolean),
        "null" => Some(Schema::Null),
        _ => None,
    }
}

/// Appends `schema` (flattened if it is a union), skipping repeated branches.
fn push_branches(branches: &mut Vec<Schema>, schema: Schema) {
    match schema {
        Schema::Union(members) => {
            for member in members {
                push_branches(branches, member);
            }
        }
        other => {
            if !branches.contains(&other) {
                branches.push(other);
            }
        }
    }
}

fn union_or_single(mut branches: Vec<Schema>) -> Schema {
    if branches.len() == 1 {
        branches.remove(0)
    } else {
        Schema::Union(branches)
    }
}

fn json_text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn stringify_entries(entries: &Map<String, Json>, skip: Option<&str>) -> BTreeMap<String, String> {
    entries
        .iter()
        .filter(|(k, v)| Some(k.as_str()) != skip && !v.is_null())
        .map(|(k, v)| (k.clone(), json_text(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn synth(json: Json) -> Synthesized {
        synthesize(&Dictionary::from_json(json).unwrap())
    }

    fn field<'a>(out: &'a Synthesized, node: &str, field: &str) -> &'a Field {
        out.nodes
            .iter()
            .find(|n| n.name == node)
            .and_then(|n| n.field(field))
            .unwrap()
    }

    fn enum_of(symbols: &[&str], name: &str) -> Schema {
        Schema::Enum(EnumSchema::new(
            name,
            symbols.iter().map(|s| s.to_string()).collect(),
        ))
    }

    #[test]
    fn test_person_dictionary() {
        let out = synth(json!({
            "person": {"properties": {
                "id": {"type": "string"},
                "age": {"type": "integer"},
                "role": {"enum": ["admin", "user"], "default": "user"}
            }}
        }));
        assert!(out.warnings.is_empty());
        let person = &out.nodes[0];
        assert_eq!(person.fields.len(), 2);
        assert!(person.field("id").is_none());

        let age = field(&out, "person", "age");
        assert_eq!(age.schema, Schema::Union(vec![Schema::Null, Schema::Long]));
        assert_eq!(age.default, Some(Json::Null));

        let role = field(&out, "person", "role");
        assert_eq!(
            role.schema,
            Schema::Union(vec![enum_of(&["admin", "user"], "person_role"), Schema::Null])
        );
        assert_eq!(role.default, Some(json!("user")));
    }

    #[test]
    fn test_null_position_follows_default() {
        let out = synth(json!({
            "t": {"properties": {
                "with_default": {"type": "string", "default": "x"},
                "without": {"type": "string"},
                "listed": {"type": ["string", "null"], "default": "y"},
                "flag": {"type": "boolean", "default": false}
            }}
        }));
        let branches = |name: &str| field(&out, "t", name).schema.branches().to_vec();
        assert_eq!(branches("with_default"), vec![Schema::String, Schema::Null]);
        assert_eq!(branches("without"), vec![Schema::Null, Schema::String]);
        assert_eq!(branches("listed"), vec![Schema::String, Schema::Null]);
        assert_eq!(branches("flag"), vec![Schema::Boolean, Schema::Null]);
    }

    #[test]
    fn test_one_of_alternatives_named_and_deduplicated() {
        let out = synth(json!({
            "t": {"properties": {
                "p": {"oneOf": [
                    {"enum": ["a"]},
                    {"enum": ["b"]},
                    {"type": "null"},
                    {"type": ["string", "null"]}
                ], "default": "b"}
            }}
        }));
        let p = field(&out, "t", "p");
        assert_eq!(
            p.schema,
            Schema::Union(vec![
                enum_of(&["b"], "t_p_1"),
                enum_of(&["a"], "t_p_0"),
                Schema::String,
                Schema::Null,
            ])
        );
    }

    #[test]
    fn test_array_items_keep_type() {
        let out = synth(json!({
            "t": {"properties": {
                "tags": {"type": "array", "items": {"enum": ["x", "y"]}},
                "sizes": {"type": ["array", "null"], "items": {"type": "number"}}
            }}
        }));
        assert_eq!(
            field(&out, "t", "tags").schema,
            Schema::Union(vec![
                Schema::Null,
                Schema::Array(Box::new(enum_of(&["x", "y"], "t_tags")))
            ])
        );
        assert_eq!(
            field(&out, "t", "sizes").schema,
            Schema::Union(vec![Schema::Null, Schema::Array(Box::new(Schema::Float))])
        );
    }

    #[test]
    fn test_unsupported_property_dropped_with_warning() {
        let out = synth(json!({
            "t": {"properties": {
                "blob": {"type": "object"},
                "ok": {"type": "string"},
                "bad_default": {"type": "integer", "default": "abc"}
            }}
        }));
        assert!(field(&out, "t", "ok").default.is_some());
        assert!(out.nodes[0].field("blob").is_none());
        // The unusable default is dropped, the field kept
        let bad = field(&out, "t", "bad_default");
        assert_eq!(bad.default, Some(Json::Null));
        assert_eq!(out.warnings.len(), 2);
        assert_eq!(out.warnings[0].property, "blob");
        assert_eq!(out.warnings[1].property, "bad_default");
    }

    #[test]
    fn test_honor_required() {
        let dict = Dictionary::from_json(json!({
            "t": {
                "properties": {"name": {"type": "string"}, "n": {"type": "integer"}},
                "required": ["name", "n"]
            }
        }))
        .unwrap();
        let out = synthesize_with_options(&dict, &SynthesisOptions::new().honor_required(true));
        assert_eq!(field(&out, "t", "name").schema, Schema::String);
        assert_eq!(field(&out, "t", "name").default, Some(json!("")));
        assert_eq!(field(&out, "t", "n").schema, Schema::Long);
        assert_eq!(field(&out, "t", "n").default, None);

        // Without the option required properties stay nullable
        let out = synthesize(&dict);
        assert_eq!(
            field(&out, "t", "name").schema,
            Schema::Union(vec![Schema::Null, Schema::String])
        );
    }

    #[test]
    fn test_duplicate_symbols_removed() {
        let out = synth(json!({
            "t": {"properties": {"s": {"enum": ["a", "b", "a", 1]}}}
        }));
        assert_eq!(
            field(&out, "t", "s").schema.branches()[1],
            enum_of(&["a", "b", "1"], "t_s")
        );
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_links_flattened() {
        let out = synth(json!({
            "sample": {
                "properties": {},
                "links": [
                    {"name": "cases", "target_type": "case", "multiplicity": "many_to_one"},
                    {"exclusive": true, "subgroup": [
                        {"name": "a", "target_type": "aliquot", "multiplicity": "one_to_one"},
                        {"name": "b", "target_type": "biospecimen", "multiplicity": "one_to_many"}
                    ]},
                    {"name": "broken", "target_type": "x", "multiplicity": "sideways"}
                ]
            }
        }));
        let node = out.metadata.node("sample").unwrap();
        let dsts: Vec<&str> = node.links.iter().map(|l| l.dst.as_str()).collect();
        assert_eq!(dsts, vec!["case", "aliquot", "biospecimen"]);
        assert_eq!(node.links[0].multiplicity, Multiplicity::ManyToOne);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].property, "broken");
    }

    #[test]
    fn test_ontology_bindings() {
        let out = synth(json!({
            "demographic": {
                "term": {"termDef": {"term": "Demographic", "source": "NCIt", "cde_id": null}},
                "properties": {
                    "gender": {
                        "enum": ["female", "male"],
                        "term": {"termDef": {"term": "Gender", "cde_id": 2200604, "source": "caDSR"}}
                    },
                    "age": {"type": "integer"}
                }
            }
        }));
        let node = out.metadata.node("demographic").unwrap();
        assert_eq!(node.values.get("term").map(String::as_str), Some("Demographic"));
        assert!(!node.values.contains_key("cde_id"));
        assert_eq!(node.properties.len(), 1);
        let gender = &node.properties[0];
        assert_eq!(gender.name, "gender");
        assert_eq!(gender.ontology_reference, "Gender");
        assert_eq!(gender.values.get("cde_id").map(String::as_str), Some("2200604"));
        assert!(!gender.values.contains_key("term"));
    }

    #[test]
    fn test_every_type_gets_a_node() {
        let out = synth(json!({
            "a": {"properties": {"x": {"type": "string"}}},
            "b": {"properties": {}},
            "c": {"no_properties": true}
        }));
        let names: Vec<&str> = out.metadata.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(out.metadata.nodes.iter().all(|n| n.properties.is_empty()));
        assert_eq!(out.warnings[0].node, "c");
    }

    #[test]
    fn test_canonical_schema_encodes_symbols() {
        let out = synth(json!({
            "t": {"properties": {"s": {"enum": ["Not Reported", "ok"], "default": "Not Reported"}}}
        }));
        let canonical = out.canonical_schema();
        let Schema::Record(envelope) = &canonical else {
            panic!("envelope is a record");
        };
        let object = envelope.field("object").unwrap();
        let Schema::Union(members) = &object.schema else {
            panic!("object is a union");
        };
        assert_eq!(members[0].name(), Some("Metadata"));
        let Schema::Record(t) = &members[1] else {
            panic!("node is a record");
        };
        let s = t.field("s").unwrap();
        assert_eq!(s.default, Some(json!("Not_20_Reported")));
        assert_eq!(
            s.schema.branches()[0],
            enum_of(&["Not_20_Reported", "ok"], "t_s")
        );
        // The synthesized view keeps plain symbols
        assert_eq!(field(&out, "t", "s").default, Some(json!("Not Reported")));
    }
}
