//! Avro schema model.
//!
//! Schemas are held as an explicit tree rather than as nested JSON; JSON only
//! appears at the container boundary ([`Schema::parse`] / [`Schema::to_json`]).

use rustc_hash::FxHashSet;
use serde_json::{Map, Value as Json};

use crate::error::SchemaError;
use crate::limits::MAX_SCHEMA_DEPTH;

/// An Avro schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Enum(EnumSchema),
    Array(Box<Schema>),
    Map(Box<Schema>),
    Union(Vec<Schema>),
    Record(RecordSchema),
    Fixed(FixedSchema),
    /// Reference to a named type defined elsewhere in the same schema.
    Ref(String),
}

/// A named record type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub aliases: Vec<String>,
    pub doc: Option<String>,
    pub fields: Vec<Field>,
}

/// A record field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    /// JSON default; `Some(Json::Null)` is an explicit null default.
    pub default: Option<Json>,
    pub doc: Option<String>,
    pub aliases: Vec<String>,
}

/// A named enumeration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub aliases: Vec<String>,
    pub doc: Option<String>,
    pub symbols: Vec<String>,
    pub default: Option<String>,
}

/// A named fixed-size byte type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FixedSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub aliases: Vec<String>,
    pub size: usize,
}

/// Where an enum sits relative to the field that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumSite {
    /// The field's type (or one of its union branches) is the enum.
    Direct,
    /// The enum is the item type of an array.
    ArrayItem,
}

impl RecordSchema {
    /// Creates a record with the given name and fields.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            ..Self::default()
        }
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a field by name, mutably.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Returns the namespace-qualified name.
    pub fn fullname(&self) -> String {
        fullname(&self.name, self.namespace.as_deref())
    }
}

impl Field {
    /// Creates a field with no default.
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
            doc: None,
            aliases: Vec::new(),
        }
    }

    /// Sets the JSON default.
    pub fn with_default(mut self, default: Json) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the documentation string.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

impl EnumSchema {
    /// Creates an enum with the given name and symbols.
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            symbols,
            ..Self::default()
        }
    }

    /// Returns the index of a symbol.
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }
}

pub(crate) fn fullname(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() && !name.contains('.') => format!("{}.{}", ns, name),
        _ => name.to_string(),
    }
}

fn primitive(name: &str) -> Option<Schema> {
    match name {
        "null" => Some(Schema::Null),
        "boolean" => Some(Schema::Boolean),
        "int" => Some(Schema::Int),
        "long" => Some(Schema::Long),
        "float" => Some(Schema::Float),
        "double" => Some(Schema::Double),
        "bytes" => Some(Schema::Bytes),
        "string" => Some(Schema::String),
        _ => None,
    }
}

impl Schema {
    /// Parses a schema from JSON text.
    pub fn parse_str(text: &str) -> Result<Schema, SchemaError> {
        let json: Json =
            serde_json::from_str(text).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        Schema::parse(&json)
    }

    /// Parses a schema from a JSON value.
    pub fn parse(json: &Json) -> Result<Schema, SchemaError> {
        parse_at(json, 0)
    }

    /// Serializes to the JSON form embedded in container headers.
    ///
    /// A named type is defined at its first occurrence; later occurrences
    /// are emitted as references.
    pub fn to_json(&self) -> Json {
        let mut emitted = FxHashSet::default();
        to_json_inner(self, &mut emitted)
    }

    /// The Avro type name of this schema.
    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::Null => "null",
            Schema::Boolean => "boolean",
            Schema::Int => "int",
            Schema::Long => "long",
            Schema::Float => "float",
            Schema::Double => "double",
            Schema::Bytes => "bytes",
            Schema::String => "string",
            Schema::Enum(_) => "enum",
            Schema::Array(_) => "array",
            Schema::Map(_) => "map",
            Schema::Union(_) => "union",
            Schema::Record(_) => "record",
            Schema::Fixed(_) => "fixed",
            Schema::Ref(_) => "reference",
        }
    }

    /// The name of a named type (or reference).
    pub fn name(&self) -> Option<&str> {
        match self {
            Schema::Enum(e) => Some(&e.name),
            Schema::Record(r) => Some(&r.name),
            Schema::Fixed(f) => Some(&f.name),
            Schema::Ref(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true for the `null` schema.
    pub fn is_null(&self) -> bool {
        matches!(self, Schema::Null)
    }

    /// Union members, or the schema itself for a non-union.
    pub fn branches(&self) -> &[Schema] {
        match self {
            Schema::Union(members) => members,
            other => std::slice::from_ref(other),
        }
    }

    /// True if the schema holds an enum directly, in a union branch, or as
    /// array items.
    pub fn has_enum(&self) -> bool {
        let mut found = false;
        self.visit_enums(&mut |_, _| found = true);
        found
    }

    /// Calls `f` for every enum a field value of this type can hold directly
    /// or as array items.
    pub fn visit_enums<'s>(&'s self, f: &mut dyn FnMut(&'s EnumSchema, EnumSite)) {
        match self {
            Schema::Enum(e) => f(e, EnumSite::Direct),
            Schema::Union(members) => {
                for member in members {
                    member.visit_enums(f);
                }
            }
            Schema::Array(items) => match items.as_ref() {
                Schema::Enum(e) => f(e, EnumSite::ArrayItem),
                Schema::Union(members) => {
                    for member in members {
                        if let Schema::Enum(e) = member {
                            f(e, EnumSite::ArrayItem);
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    /// Mutable counterpart of [`Schema::visit_enums`].
    pub fn visit_enums_mut(&mut self, f: &mut dyn FnMut(&mut EnumSchema, EnumSite)) {
        match self {
            Schema::Enum(e) => f(e, EnumSite::Direct),
            Schema::Union(members) => {
                for member in members {
                    member.visit_enums_mut(f);
                }
            }
            Schema::Array(items) => match items.as_mut() {
                Schema::Enum(e) => f(e, EnumSite::ArrayItem),
                Schema::Union(members) => {
                    for member in members {
                        if let Schema::Enum(e) = member {
                            f(e, EnumSite::ArrayItem);
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    /// Whether a JSON default value is valid for this schema.
    ///
    /// For unions only the first branch counts, as Avro requires.
    /// References are accepted without resolution.
    pub fn accepts_json(&self, json: &Json) -> bool {
        match (self, json) {
            (Schema::Null, Json::Null) => true,
            (Schema::Boolean, Json::Bool(_)) => true,
            (Schema::Int | Schema::Long, Json::Number(n)) => n.is_i64() || n.is_u64(),
            (Schema::Float | Schema::Double, Json::Number(_)) => true,
            (Schema::String | Schema::Bytes | Schema::Fixed(_), Json::String(_)) => true,
            (Schema::Enum(e), Json::String(s)) => e.index_of(s).is_some(),
            (Schema::Array(items), Json::Array(values)) => {
                values.iter().all(|v| items.accepts_json(v))
            }
            (Schema::Map(_) | Schema::Record(_), Json::Object(_)) => true,
            (Schema::Union(members), _) => {
                members.first().is_some_and(|first| first.accepts_json(json))
            }
            (Schema::Ref(_), _) => true,
            _ => false,
        }
    }
}

// =============================================================================
// JSON PARSING
// =============================================================================

fn parse_at(json: &Json, depth: usize) -> Result<Schema, SchemaError> {
    if depth > MAX_SCHEMA_DEPTH {
        return Err(SchemaError::DepthExceeded {
            max: MAX_SCHEMA_DEPTH,
        });
    }
    match json {
        Json::String(name) => Ok(primitive(name).unwrap_or_else(|| Schema::Ref(name.clone()))),
        Json::Array(members) => members
            .iter()
            .map(|m| parse_at(m, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Schema::Union),
        Json::Object(map) => parse_object(map, depth),
        other => Err(SchemaError::UnknownType(other.to_string())),
    }
}

fn parse_object(map: &Map<String, Json>, depth: usize) -> Result<Schema, SchemaError> {
    let type_attr = map.get("type").ok_or(SchemaError::MissingAttribute {
        context: "schema object",
        attribute: "type",
    })?;
    let type_name = match type_attr {
        Json::String(name) => name.as_str(),
        // {"type": {...}} or {"type": [...]} wraps another schema
        nested => return parse_at(nested, depth + 1),
    };

    match type_name {
        "record" | "error" => parse_record(map, depth),
        "enum" => parse_enum(map),
        "array" => {
            let items = map.get("items").ok_or(SchemaError::MissingAttribute {
                context: "array",
                attribute: "items",
            })?;
            Ok(Schema::Array(Box::new(parse_at(items, depth + 1)?)))
        }
        "map" => {
            let values = map.get("values").ok_or(SchemaError::MissingAttribute {
                context: "map",
                attribute: "values",
            })?;
            Ok(Schema::Map(Box::new(parse_at(values, depth + 1)?)))
        }
        "fixed" => {
            let size = map
                .get("size")
                .and_then(Json::as_u64)
                .ok_or(SchemaError::MissingAttribute {
                    context: "fixed",
                    attribute: "size",
                })?;
            Ok(Schema::Fixed(FixedSchema {
                name: required_str(map, "fixed", "name")?,
                namespace: optional_str(map, "namespace"),
                aliases: string_list(map, "fixed", "aliases")?,
                size: size as usize,
            }))
        }
        // Logical types and other attributes ride on the primitive
        other => Ok(primitive(other).unwrap_or_else(|| Schema::Ref(other.to_string()))),
    }
}

fn parse_record(map: &Map<String, Json>, depth: usize) -> Result<Schema, SchemaError> {
    let fields_json = map
        .get("fields")
        .and_then(Json::as_array)
        .ok_or(SchemaError::MissingAttribute {
            context: "record",
            attribute: "fields",
        })?;

    let mut fields = Vec::with_capacity(fields_json.len());
    for field_json in fields_json {
        let field_map = field_json
            .as_object()
            .ok_or(SchemaError::MalformedAttribute {
                context: "record",
                attribute: "fields",
            })?;
        let type_json = field_map.get("type").ok_or(SchemaError::MissingAttribute {
            context: "field",
            attribute: "type",
        })?;
        fields.push(Field {
            name: required_str(field_map, "field", "name")?,
            schema: parse_at(type_json, depth + 1)?,
            default: field_map.get("default").cloned(),
            doc: optional_str(field_map, "doc"),
            aliases: string_list(field_map, "field", "aliases")?,
        });
    }

    Ok(Schema::Record(RecordSchema {
        name: required_str(map, "record", "name")?,
        namespace: optional_str(map, "namespace"),
        aliases: string_list(map, "record", "aliases")?,
        doc: optional_str(map, "doc"),
        fields,
    }))
}

fn parse_enum(map: &Map<String, Json>) -> Result<Schema, SchemaError> {
    if !map.contains_key("symbols") {
        return Err(SchemaError::MissingAttribute {
            context: "enum",
            attribute: "symbols",
        });
    }
    Ok(Schema::Enum(EnumSchema {
        name: required_str(map, "enum", "name")?,
        namespace: optional_str(map, "namespace"),
        aliases: string_list(map, "enum", "aliases")?,
        doc: optional_str(map, "doc"),
        symbols: string_list(map, "enum", "symbols")?,
        default: optional_str(map, "default"),
    }))
}

fn required_str(
    map: &Map<String, Json>,
    context: &'static str,
    attribute: &'static str,
) -> Result<String, SchemaError> {
    match map.get(attribute) {
        Some(Json::String(s)) => Ok(s.clone()),
        Some(_) => Err(SchemaError::MalformedAttribute { context, attribute }),
        None => Err(SchemaError::MissingAttribute { context, attribute }),
    }
}

fn optional_str(map: &Map<String, Json>, attribute: &str) -> Option<String> {
    map.get(attribute).and_then(Json::as_str).map(str::to_string)
}

fn string_list(
    map: &Map<String, Json>,
    context: &'static str,
    attribute: &'static str,
) -> Result<Vec<String>, SchemaError> {
    match map.get(attribute) {
        None => Ok(Vec::new()),
        Some(Json::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or(SchemaError::MalformedAttribute { context, attribute })
            })
            .collect(),
        Some(_) => Err(SchemaError::MalformedAttribute { context, attribute }),
    }
}

// =============================================================================
// JSON EMISSION
// =============================================================================

fn to_json_inner(schema: &Schema, emitted: &mut FxHashSet<String>) -> Json {
    match schema {
        Schema::Null
        | Schema::Boolean
        | Schema::Int
        | Schema::Long
        | Schema::Float
        | Schema::Double
        | Schema::Bytes
        | Schema::String => Json::String(schema.type_name().to_string()),
        Schema::Ref(name) => Json::String(name.clone()),
        Schema::Union(members) => {
            Json::Array(members.iter().map(|m| to_json_inner(m, emitted)).collect())
        }
        Schema::Array(items) => {
            let mut map = Map::new();
            map.insert("type".into(), "array".into());
            map.insert("items".into(), to_json_inner(items, emitted));
            Json::Object(map)
        }
        Schema::Map(values) => {
            let mut map = Map::new();
            map.insert("type".into(), "map".into());
            map.insert("values".into(), to_json_inner(values, emitted));
            Json::Object(map)
        }
        Schema::Enum(e) => {
            if !emitted.insert(fullname(&e.name, e.namespace.as_deref())) {
                return Json::String(e.name.clone());
            }
            let mut map = named_header("enum", &e.name, e.namespace.as_deref(), &e.aliases);
            if let Some(doc) = &e.doc {
                map.insert("doc".into(), doc.clone().into());
            }
            map.insert(
                "symbols".into(),
                Json::Array(e.symbols.iter().cloned().map(Json::String).collect()),
            );
            if let Some(default) = &e.default {
                map.insert("default".into(), default.clone().into());
            }
            Json::Object(map)
        }
        Schema::Fixed(f) => {
            if !emitted.insert(fullname(&f.name, f.namespace.as_deref())) {
                return Json::String(f.name.clone());
            }
            let mut map = named_header("fixed", &f.name, f.namespace.as_deref(), &f.aliases);
            map.insert("size".into(), f.size.into());
            Json::Object(map)
        }
        Schema::Record(r) => {
            if !emitted.insert(r.fullname()) {
                return Json::String(r.name.clone());
            }
            let mut map = named_header("record", &r.name, r.namespace.as_deref(), &r.aliases);
            if let Some(doc) = &r.doc {
                map.insert("doc".into(), doc.clone().into());
            }
            let fields = r
                .fields
                .iter()
                .map(|field| {
                    let mut f = Map::new();
                    f.insert("name".into(), field.name.clone().into());
                    f.insert("type".into(), to_json_inner(&field.schema, emitted));
                    if let Some(default) = &field.default {
                        f.insert("default".into(), default.clone());
                    }
                    if let Some(doc) = &field.doc {
                        f.insert("doc".into(), doc.clone().into());
                    }
                    if !field.aliases.is_empty() {
                        f.insert("aliases".into(), field.aliases.clone().into());
                    }
                    Json::Object(f)
                })
                .collect();
            map.insert("fields".into(), Json::Array(fields));
            Json::Object(map)
        }
    }
}

fn named_header(
    kind: &str,
    name: &str,
    namespace: Option<&str>,
    aliases: &[String],
) -> Map<String, Json> {
    let mut map = Map::new();
    map.insert("type".into(), kind.into());
    map.insert("name".into(), name.into());
    if let Some(ns) = namespace {
        map.insert("namespace".into(), ns.into());
    }
    if !aliases.is_empty() {
        map.insert("aliases".into(), aliases.to_vec().into());
    }
    map
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_primitives_and_union() {
        let schema = Schema::parse(&json!(["null", "string"])).unwrap();
        assert_eq!(schema, Schema::Union(vec![Schema::Null, Schema::String]));

        let schema = Schema::parse(&json!({"type": "long", "logicalType": "timestamp-millis"}))
            .unwrap();
        assert_eq!(schema, Schema::Long);
    }

    #[test]
    fn test_record_json_roundtrip() {
        let text = r#"{
            "type": "record",
            "name": "case",
            "aliases": ["subject"],
            "fields": [
                {"name": "age", "type": ["null", "long"], "default": null},
                {"name": "status", "type": [
                    {"type": "enum", "name": "case_status", "symbols": ["A", "B"]},
                    "null"
                ], "default": "A", "doc": "Case status"},
                {"name": "tags", "type": {"type": "array", "items": "string"}}
            ]
        }"#;
        let schema = Schema::parse_str(text).unwrap();
        let Schema::Record(record) = &schema else {
            panic!("expected record");
        };
        assert_eq!(record.aliases, vec!["subject".to_string()]);
        assert_eq!(record.field("age").unwrap().default, Some(Json::Null));
        assert_eq!(record.field("tags").unwrap().default, None);
        assert_eq!(record.field("status").unwrap().doc.as_deref(), Some("Case status"));

        let reparsed = Schema::parse(&schema.to_json()).unwrap();
        assert_eq!(schema, reparsed);
    }

    #[test]
    fn test_repeated_named_type_emitted_as_reference() {
        let status = Schema::Enum(EnumSchema::new("status", vec!["A".into()]));
        let schema = Schema::Record(RecordSchema::new(
            "r",
            vec![
                Field::new("a", status.clone()),
                Field::new("b", status),
            ],
        ));
        let json = schema.to_json();
        assert_eq!(json["fields"][1]["type"], json!("status"));
        assert_eq!(json["fields"][0]["type"]["type"], json!("enum"));
    }

    #[test]
    fn test_missing_type_attribute() {
        let err = Schema::parse(&json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, SchemaError::MissingAttribute { attribute: "type", .. }));
    }

    #[test]
    fn test_visit_enums_sites() {
        let schema = Schema::parse(&json!([
            "null",
            {"type": "enum", "name": "e1", "symbols": ["x"]},
            {"type": "array", "items": {"type": "enum", "name": "e2", "symbols": ["y"]}}
        ]))
        .unwrap();
        let mut seen = Vec::new();
        schema.visit_enums(&mut |e, site| seen.push((e.name.clone(), site)));
        assert_eq!(
            seen,
            vec![
                ("e1".to_string(), EnumSite::Direct),
                ("e2".to_string(), EnumSite::ArrayItem)
            ]
        );
        assert!(schema.has_enum());
        assert!(!Schema::Union(vec![Schema::Null, Schema::String]).has_enum());
    }

    #[test]
    fn test_accepts_json_uses_first_branch() {
        let schema = Schema::Union(vec![Schema::Null, Schema::String]);
        assert!(schema.accepts_json(&Json::Null));
        assert!(!schema.accepts_json(&json!("x")));

        let e = Schema::Enum(EnumSchema::new("e", vec!["A".into()]));
        assert!(e.accepts_json(&json!("A")));
        assert!(!e.accepts_json(&json!("B")));
    }
}
