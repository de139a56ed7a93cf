//! The PFB record envelope.
//!
//! Every record in a PFB container (including the leading Metadata record)
//! is an [`Entity`]: an optional id, the node type name, the node object and
//! the relations to other records.

use std::collections::BTreeMap;

use serde_json::{json, Value as Json};

use crate::error::FormatError;
use crate::model::Value;

/// Field values of a node object, by field name.
pub type Object = BTreeMap<String, Value>;

/// A relation from one record to another.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Relation {
    pub dst_id: String,
    /// Node type of the destination record.
    pub dst_name: String,
}

impl Relation {
    pub fn new(dst_id: impl Into<String>, dst_name: impl Into<String>) -> Self {
        Self {
            dst_id: dst_id.into(),
            dst_name: dst_name.into(),
        }
    }
}

/// One record of a PFB container.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    pub id: Option<String>,
    /// Node type name, or `Metadata` for the leading record.
    pub name: String,
    pub object: Object,
    pub relations: Vec<Relation>,
}

impl Entity {
    /// Creates an entity of node type `name` with no values.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the value of an object field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.object.get(field)
    }

    /// Sets an object field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.object.insert(field.into(), value.into());
    }

    /// Converts to the envelope record value, pinning `object` to the union
    /// branch `branch`.
    pub fn into_value(self, branch: usize) -> Value {
        let relations = self
            .relations
            .into_iter()
            .map(|r| {
                Value::Record(BTreeMap::from([
                    ("dst_id".to_string(), Value::String(r.dst_id)),
                    ("dst_name".to_string(), Value::String(r.dst_name)),
                ]))
            })
            .collect();
        Value::Record(BTreeMap::from([
            ("id".to_string(), Value::from(self.id)),
            ("name".to_string(), Value::String(self.name)),
            (
                "object".to_string(),
                Value::Union(branch, Box::new(Value::Record(self.object))),
            ),
            ("relations".to_string(), Value::Array(relations)),
        ]))
    }

    /// Builds an entity from a decoded envelope record.
    pub fn from_value(value: Value) -> Result<Entity, FormatError> {
        let Value::Record(mut fields) = value else {
            return Err(invalid("envelope is not a record"));
        };
        let id = match fields.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => return Err(invalid(format!("id is a {}", other.type_name()))),
        };
        let name = match fields.remove("name") {
            Some(Value::String(s)) => s,
            _ => return Err(invalid("missing name")),
        };
        let object = match fields.remove("object") {
            Some(Value::Record(object)) => object,
            _ => return Err(invalid(format!("{} has no object record", name))),
        };
        let relations = match fields.remove("relations") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| -> Result<Relation, FormatError> {
                    let r = item
                        .as_record()
                        .ok_or_else(|| invalid("relation is not a record"))?;
                    let text = |key: &str| {
                        r.get(key)
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .ok_or_else(|| invalid(format!("relation is missing {}", key)))
                    };
                    Ok(Relation {
                        dst_id: text("dst_id")?,
                        dst_name: text("dst_name")?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(invalid("relations is not an array")),
        };
        Ok(Entity {
            id,
            name,
            object,
            relations,
        })
    }

    /// Renders the entity as JSON, one object per record.
    pub fn to_json(&self) -> Json {
        let object: serde_json::Map<String, Json> = self
            .object
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        let relations: Vec<Json> = self
            .relations
            .iter()
            .map(|r| json!({"dst_id": r.dst_id, "dst_name": r.dst_name}))
            .collect();
        json!({
            "id": self.id,
            "name": self.name,
            "object": object,
            "relations": relations,
        })
    }

    /// Parses the JSON form produced by [`Entity::to_json`].
    ///
    /// Object values are schema-less; the writer coerces them on encode.
    pub fn from_json(json: &Json) -> Result<Entity, FormatError> {
        let map = json
            .as_object()
            .ok_or_else(|| invalid("record is not a JSON object"))?;
        let name = map
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(|| invalid("missing name"))?
            .to_string();
        let id = map.get("id").and_then(Json::as_str).map(str::to_string);
        let object = match map.get("object") {
            Some(Json::Object(fields)) => fields
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect(),
            None | Some(Json::Null) => Object::new(),
            Some(_) => return Err(invalid("object is not a JSON object")),
        };
        let relations = match map.get("relations") {
            Some(Json::Array(items)) => items
                .iter()
                .map(|item| {
                    let dst_id = item.get("dst_id").and_then(Json::as_str);
                    let dst_name = item.get("dst_name").and_then(Json::as_str);
                    match (dst_id, dst_name) {
                        (Some(id), Some(name)) => Ok(Relation::new(id, name)),
                        _ => Err(invalid("relation needs dst_id and dst_name")),
                    }
                })
                .collect::<Result<Vec<_>, _>>()?,
            None | Some(Json::Null) => Vec::new(),
            Some(_) => return Err(invalid("relations is not an array")),
        };
        Ok(Entity {
            id,
            name,
            object,
            relations,
        })
    }
}

fn invalid(reason: impl Into<String>) -> FormatError {
    FormatError::InvalidEntity {
        reason: reason.into(),
    }
}
