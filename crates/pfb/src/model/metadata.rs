//! Container metadata: per-node ontology bindings and links.
//!
//! The first record of every PFB file carries a [`Metadata`] value describing
//! each node type: its ontology reference, annotated properties and the links
//! it declares to other node types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::model::Value;

/// Cardinality of a link between two node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Multiplicity {
    OneToOne,
    OneToMany,
    ManyToOne,
    #[default]
    ManyToMany,
}

impl Multiplicity {
    /// All variants, in schema symbol order.
    pub const ALL: [Multiplicity; 4] = [
        Multiplicity::OneToOne,
        Multiplicity::OneToMany,
        Multiplicity::ManyToOne,
        Multiplicity::ManyToMany,
    ];

    /// The enum symbol.
    pub fn as_str(self) -> &'static str {
        match self {
            Multiplicity::OneToOne => "ONE_TO_ONE",
            Multiplicity::OneToMany => "ONE_TO_MANY",
            Multiplicity::ManyToOne => "MANY_TO_ONE",
            Multiplicity::ManyToMany => "MANY_TO_MANY",
        }
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Multiplicity {
    type Err = FormatError;

    /// Parses a symbol case-insensitively (`one_to_many` works).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Multiplicity::ALL
            .into_iter()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| FormatError::InvalidMetadata {
                reason: format!("unknown multiplicity {:?}", s),
            })
    }
}

/// A link from a node type to another node type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Link {
    pub multiplicity: Multiplicity,
    /// Destination node type.
    pub dst: String,
    /// Link (relationship) name.
    pub name: String,
}

/// Ontology binding of one node field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub ontology_reference: String,
    pub values: BTreeMap<String, String>,
}

/// Metadata of one node type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub ontology_reference: String,
    pub values: BTreeMap<String, String>,
    pub links: Vec<Link>,
    pub properties: Vec<Property>,
}

impl Node {
    /// Creates a node with no bindings or links.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// The payload of the leading Metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub nodes: Vec<Node>,
    pub misc: BTreeMap<String, String>,
}

impl Metadata {
    /// Looks up a node by name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Looks up a node by name, mutably.
    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    /// Renames a node and every link that points at it.
    pub fn rename_node(&mut self, old: &str, new: &str) {
        for node in &mut self.nodes {
            if node.name == old {
                node.name = new.to_string();
            }
            for link in &mut node.links {
                if link.dst == old {
                    link.dst = new.to_string();
                }
            }
        }
    }

    /// Converts to the record value stored in the container.
    pub fn to_value(&self) -> Value {
        let nodes = self.nodes.iter().map(node_value).collect();
        Value::Record(BTreeMap::from([
            ("nodes".to_string(), Value::Array(nodes)),
            ("misc".to_string(), string_map(&self.misc)),
        ]))
    }

    /// Parses the decoded Metadata record.
    pub fn from_value(value: &Value) -> Result<Metadata, FormatError> {
        let fields = value.as_record().ok_or_else(|| invalid("Metadata is not a record"))?;
        let nodes = match fields.get("nodes") {
            Some(v) => v
                .as_array()
                .ok_or_else(|| invalid("nodes is not an array"))?
                .iter()
                .map(node_from_value)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(Metadata {
            nodes,
            misc: map_field(fields, "misc")?,
        })
    }
}

fn invalid(reason: impl Into<String>) -> FormatError {
    FormatError::InvalidMetadata {
        reason: reason.into(),
    }
}

fn string_map(map: &BTreeMap<String, String>) -> Value {
    Value::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn node_value(node: &Node) -> Value {
    let links = node
        .links
        .iter()
        .map(|link| {
            Value::Record(BTreeMap::from([
                (
                    "multiplicity".to_string(),
                    Value::Enum(link.multiplicity.as_str().to_string()),
                ),
                ("dst".to_string(), Value::String(link.dst.clone())),
                ("name".to_string(), Value::String(link.name.clone())),
            ]))
        })
        .collect();
    let properties = node
        .properties
        .iter()
        .map(|p| {
            Value::Record(BTreeMap::from([
                ("name".to_string(), Value::String(p.name.clone())),
                (
                    "ontology_reference".to_string(),
                    Value::String(p.ontology_reference.clone()),
                ),
                ("values".to_string(), string_map(&p.values)),
            ]))
        })
        .collect();
    Value::Record(BTreeMap::from([
        ("name".to_string(), Value::String(node.name.clone())),
        (
            "ontology_reference".to_string(),
            Value::String(node.ontology_reference.clone()),
        ),
        ("values".to_string(), string_map(&node.values)),
        ("links".to_string(), Value::Array(links)),
        ("properties".to_string(), Value::Array(properties)),
    ]))
}

fn node_from_value(value: &Value) -> Result<Node, FormatError> {
    let fields = value.as_record().ok_or_else(|| invalid("node is not a record"))?;
    let links = list_field(fields, "links")?
        .iter()
        .map(|v| -> Result<Link, FormatError> {
            let f = v.as_record().ok_or_else(|| invalid("link is not a record"))?;
            let multiplicity = match f.get("multiplicity").and_then(Value::as_str) {
                Some(s) => s.parse()?,
                None => Multiplicity::default(),
            };
            Ok(Link {
                multiplicity,
                dst: str_field(f, "dst")?,
                name: str_field(f, "name")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let properties = list_field(fields, "properties")?
        .iter()
        .map(|v| -> Result<Property, FormatError> {
            let f = v
                .as_record()
                .ok_or_else(|| invalid("property is not a record"))?;
            Ok(Property {
                name: str_field(f, "name")?,
                ontology_reference: opt_str_field(f, "ontology_reference"),
                values: map_field(f, "values")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Node {
        name: str_field(fields, "name")?,
        ontology_reference: opt_str_field(fields, "ontology_reference"),
        values: map_field(fields, "values")?,
        links,
        properties,
    })
}

fn str_field(fields: &BTreeMap<String, Value>, name: &str) -> Result<String, FormatError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("missing string field {}", name)))
}

fn opt_str_field(fields: &BTreeMap<String, Value>, name: &str) -> String {
    fields
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn list_field<'a>(
    fields: &'a BTreeMap<String, Value>,
    name: &str,
) -> Result<&'a [Value], FormatError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(&[]),
        Some(v) => v
            .as_array()
            .ok_or_else(|| invalid(format!("{} is not an array", name))),
    }
}

fn map_field(
    fields: &BTreeMap<String, Value>,
    name: &str,
) -> Result<BTreeMap<String, String>, FormatError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(v) => {
            let entries = v
                .as_record()
                .ok_or_else(|| invalid(format!("{} is not a map", name)))?;
            Ok(entries
                .iter()
                .map(|(k, v)| {
                    let text = match v.as_str() {
                        Some(s) => s.to_string(),
                        None => v.to_json().to_string(),
                    };
                    (k.clone(), text)
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        Metadata {
            nodes: vec![
                Node {
                    name: "sample".into(),
                    ontology_reference: "".into(),
                    values: BTreeMap::from([("source".into(), "dict".into())]),
                    links: vec![Link {
                        multiplicity: Multiplicity::ManyToOne,
                        dst: "case".into(),
                        name: "cases".into(),
                    }],
                    properties: vec![Property {
                        name: "age".into(),
                        ontology_reference: "C25150".into(),
                        values: BTreeMap::from([("source".into(), "NCIt".into())]),
                    }],
                },
                Node::new("case"),
            ],
            misc: BTreeMap::new(),
        }
    }

    #[test]
    fn test_value_roundtrip() {
        let metadata = sample();
        assert_eq!(Metadata::from_value(&metadata.to_value()).unwrap(), metadata);
    }

    #[test]
    fn test_multiplicity_parse() {
        assert_eq!("one_to_many".parse::<Multiplicity>().unwrap(), Multiplicity::OneToMany);
        assert_eq!("MANY_TO_MANY".parse::<Multiplicity>().unwrap(), Multiplicity::ManyToMany);
        assert!("sideways".parse::<Multiplicity>().is_err());
    }

    #[test]
    fn test_rename_node_updates_links() {
        let mut metadata = sample();
        metadata.rename_node("case", "subject");
        assert!(metadata.node("case").is_none());
        assert!(metadata.node("subject").is_some());
        assert_eq!(metadata.node("sample").unwrap().links[0].dst, "subject");
    }

    #[test]
    fn test_serde_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["nodes"][0]["links"][0]["multiplicity"], "MANY_TO_ONE");
    }

    #[test]
    fn test_from_value_rejects_non_record() {
        assert!(matches!(
            Metadata::from_value(&Value::Null),
            Err(FormatError::InvalidMetadata { .. })
        ));
    }
}
