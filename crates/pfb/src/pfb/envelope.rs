//! The fixed envelope wrapping every PFB record.
//!
//! ```text
//! Entity {
//!   id:        ["null", "string"] = null
//!   name:      string
//!   object:    [Metadata, <node record>, ...]
//!   relations: [Relation {dst_id, dst_name}] = []
//! }
//! ```

use lazy_static::lazy_static;
use serde_json::json;

use crate::error::FormatError;
use crate::model::{EnumSchema, Field, Multiplicity, RecordSchema, Schema};

/// Name of the envelope record.
pub const ENVELOPE_NAME: &str = "Entity";

/// Name of the metadata record type and of the leading record.
pub const METADATA_NAME: &str = "Metadata";

/// Position of the `object` field in the envelope.
pub const OBJECT_FIELD_INDEX: usize = 2;

lazy_static! {
    /// Schema of the Metadata record (first alternative of `object`).
    pub static ref METADATA_SCHEMA: Schema = metadata_schema();

    static ref RELATIONS_FIELD: Field = Field::new(
        "relations",
        Schema::Array(Box::new(Schema::Record(RecordSchema::new(
            "Relation",
            vec![
                Field::new("dst_id", Schema::String),
                Field::new("dst_name", Schema::String),
            ],
        )))),
    )
    .with_default(json!([]));
}

fn string_map() -> Schema {
    Schema::Map(Box::new(Schema::String))
}

fn metadata_schema() -> Schema {
    let multiplicity = Schema::Enum(EnumSchema::new(
        "Multiplicity",
        Multiplicity::ALL
            .iter()
            .map(|m| m.as_str().to_string())
            .collect(),
    ));
    let link = Schema::Record(RecordSchema::new(
        "Link",
        vec![
            Field::new("multiplicity", multiplicity),
            Field::new("dst", Schema::String),
            Field::new("name", Schema::String),
        ],
    ));
    let property = Schema::Record(RecordSchema::new(
        "Property",
        vec![
            Field::new("name", Schema::String),
            Field::new("ontology_reference", Schema::String),
            Field::new("values", string_map()),
        ],
    ));
    let node = Schema::Record(RecordSchema::new(
        "Node",
        vec![
            Field::new("name", Schema::String),
            Field::new("ontology_reference", Schema::String),
            Field::new("values", string_map()),
            Field::new("links", Schema::Array(Box::new(link))),
            Field::new("properties", Schema::Array(Box::new(property))),
        ],
    ));
    Schema::Record(RecordSchema::new(
        METADATA_NAME,
        vec![
            Field::new("nodes", Schema::Array(Box::new(node))),
            Field::new("misc", string_map()),
        ],
    ))
}

/// Builds the envelope schema around node records (already in on-disk form).
pub fn envelope_schema(nodes: &[RecordSchema]) -> Schema {
    let mut alternatives = Vec::with_capacity(nodes.len() + 1);
    alternatives.push(METADATA_SCHEMA.clone());
    alternatives.extend(nodes.iter().cloned().map(Schema::Record));

    Schema::Record(RecordSchema::new(
        ENVELOPE_NAME,
        vec![
            Field::new("id", Schema::Union(vec![Schema::Null, Schema::String]))
                .with_default(json!(null)),
            Field::new("name", Schema::String),
            Field::new("object", Schema::Union(alternatives)),
            RELATIONS_FIELD.clone(),
        ],
    ))
}

/// Checks the envelope shape and returns the node record alternatives that
/// follow Metadata.
pub fn split_envelope(schema: &Schema) -> Result<Vec<RecordSchema>, FormatError> {
    let Schema::Record(envelope) = schema else {
        return Err(FormatError::EnvelopeNotRecord);
    };
    let object = envelope
        .fields
        .get(OBJECT_FIELD_INDEX)
        .filter(|f| f.name == "object")
        .ok_or_else(|| FormatError::MissingObjectField {
            found: envelope
                .fields
                .get(OBJECT_FIELD_INDEX)
                .map(|f| f.name.clone()),
        })?;
    let Schema::Union(alternatives) = &object.schema else {
        return Err(FormatError::ObjectNotUnion);
    };
    let (first, rest) = alternatives.split_first().ok_or(FormatError::ObjectNotUnion)?;
    if first.name() != Some(METADATA_NAME) {
        return Err(FormatError::MetadataNotFirstAlternative {
            found: first.name().map(str::to_string),
        });
    }

    rest.iter()
        .enumerate()
        .map(|(i, alternative)| match alternative {
            Schema::Record(record) => Ok(record.clone()),
            _ => Err(FormatError::AlternativeNotRecord { index: i + 1 }),
        })
        .collect()
}
