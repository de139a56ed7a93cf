//! Streaming PFB reader.

use std::fs::File;
use std::io::{BufReader, Read};
use std::iter::FusedIterator;
use std::path::Path;

use tracing::debug;

use crate::codec::{Codec, ContainerReader, Header};
use crate::error::{FormatError, PfbError};
use crate::model::{Entity, Metadata, Value};
use crate::pfb::base::{Direction, NodeSchemas};
use crate::pfb::envelope::METADATA_NAME;

/// Reads a PFB container.
///
/// Opening reads the header and the leading Metadata record. Iterating
/// yields the remaining records with enum values decoded.
///
/// ```no_run
/// use pfb::PfbReader;
///
/// let reader = PfbReader::open("data.avro")?;
/// println!("{} node types", reader.schema().len());
/// for record in reader {
///     let record = record?;
///     println!("{} {:?}", record.name, record.id);
/// }
/// # Ok::<(), pfb::PfbError>(())
/// ```
#[derive(Debug)]
pub struct PfbReader<R> {
    container: ContainerReader<R>,
    schema: NodeSchemas,
    metadata: Metadata,
    done: bool,
}

impl PfbReader<BufReader<File>> {
    /// Opens a container file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PfbError> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opening PFB file");
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> PfbReader<R> {
    /// Reads the header and Metadata record from `inner`.
    pub fn new(inner: R) -> Result<Self, PfbError> {
        let mut container = ContainerReader::new(inner)?;
        let schema = NodeSchemas::from_envelope(&container.header().schema)?;

        let first = container
            .next_tagged()?
            .ok_or(FormatError::MissingMetadataRecord)?;
        let (first, branch) = untag_envelope(first)?;
        if first.name != METADATA_NAME {
            return Err(FormatError::UnexpectedFirstRecord { found: first.name }.into());
        }
        check_branch(&first.name, branch, 0)?;
        let metadata = Metadata::from_value(&Value::Record(first.object))?;

        debug!(
            nodes = schema.len(),
            metadata_nodes = metadata.nodes.len(),
            "read PFB metadata"
        );
        Ok(Self {
            container,
            schema,
            metadata,
            done: false,
        })
    }

    /// Decoded node schemas.
    pub fn schema(&self) -> &NodeSchemas {
        &self.schema
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Block compression codec of the container.
    pub fn codec(&self) -> Codec {
        self.container.header().codec
    }

    /// Raw container header. Its schema is the on-disk form, with enum
    /// symbols encoded.
    pub(crate) fn header(&self) -> &Header {
        self.container.header()
    }

    /// See [`NodeSchemas::make_empty_record`].
    pub fn make_empty_record(&self, node: &str) -> Result<Entity, FormatError> {
        self.schema.make_empty_record(node)
    }

    /// See [`NodeSchemas::is_encode`].
    pub fn is_encode(&self, node: &str, field: &str) -> bool {
        self.schema.is_encode(node, field)
    }

    /// Consumes the reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.container.into_inner()
    }

    fn read_entity(&mut self) -> Result<Option<Entity>, PfbError> {
        let Some(value) = self.container.next_tagged()? else {
            return Ok(None);
        };
        let (mut entity, branch) = untag_envelope(value)?;
        let Some(position) = self.schema.position(&entity.name) else {
            return Err(FormatError::UnknownNode { name: entity.name }.into());
        };
        check_branch(&entity.name, branch, position + 1)?;
        self.schema.transcode_entity(&mut entity, Direction::Decode);
        Ok(Some(entity))
    }
}

/// Strips the branch tags from an envelope read with
/// [`ContainerReader::next_tagged`], returning the entity and the index of
/// its `object` alternative.
fn untag_envelope(value: Value) -> Result<(Entity, usize), FormatError> {
    let Value::Record(fields) = value else {
        return Err(FormatError::InvalidEntity {
            reason: "envelope is not a record".to_string(),
        });
    };
    let mut branch = None;
    let fields = fields
        .into_iter()
        .map(|(key, value)| match value {
            Value::Union(index, inner) => {
                if key == "object" {
                    branch = Some(index);
                }
                (key, *inner)
            }
            other => (key, other),
        })
        .collect();
    let entity = Entity::from_value(Value::Record(fields))?;
    let branch = branch.ok_or_else(|| FormatError::InvalidEntity {
        reason: format!("{} has no object alternative", entity.name),
    })?;
    Ok((entity, branch))
}

fn check_branch(name: &str, branch: usize, expected: usize) -> Result<(), FormatError> {
    if branch == expected {
        Ok(())
    } else {
        Err(FormatError::ObjectBranchMismatch {
            name: name.to_string(),
            branch,
            expected,
        })
    }
}

impl<R: Read> Iterator for PfbReader<R> {
    type Item = Result<Entity, PfbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_entity() {
            Ok(Some(entity)) => Some(Ok(entity)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> FusedIterator for PfbReader<R> {}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::codec::{encode_datum, Codec, ContainerWriter, Names, Writer};
    use crate::model::{EnumSchema, Field, RecordSchema, Schema};
    use crate::pfb::envelope::envelope_schema;

    fn raw_container(records: &[Value]) -> Vec<u8> {
        let status = EnumSchema::new(
            "sample_x",
            vec!["Not_20_Reported".to_string(), "Alive".to_string()],
        );
        let schema = envelope_schema(&[
            RecordSchema::new("case", vec![Field::new("x", Schema::Long)]),
            RecordSchema::new("sample", vec![Field::new("x", Schema::Enum(status))]),
        ]);
        let names = Names::from_schema(&schema);
        let mut out = ContainerWriter::new(Vec::new(), &schema, Codec::Null, 1024).unwrap();
        for record in records {
            let mut w = Writer::new();
            encode_datum(&mut w, &schema, record, &names).unwrap();
            out.append(w.as_bytes()).unwrap();
        }
        out.into_inner().unwrap()
    }

    fn case(x: i64) -> Value {
        let mut e = Entity::new("case");
        e.set("x", x);
        e.into_value(1)
    }

    fn metadata() -> Value {
        Entity {
            id: None,
            name: METADATA_NAME.to_string(),
            object: Metadata::default().to_value().as_record().cloned().unwrap_or_default(),
            relations: Vec::new(),
        }
        .into_value(0)
    }

    #[test]
    fn test_missing_metadata_record() {
        let bytes = raw_container(&[]);
        assert!(matches!(
            PfbReader::new(bytes.as_slice()),
            Err(PfbError::Format(FormatError::MissingMetadataRecord))
        ));
    }

    #[test]
    fn test_first_record_must_be_metadata() {
        let bytes = raw_container(&[case(1)]);
        assert!(matches!(
            PfbReader::new(bytes.as_slice()),
            Err(PfbError::Format(FormatError::UnexpectedFirstRecord { found })) if found == "case"
        ));
    }

    #[test]
    fn test_metadata_record_must_use_first_alternative() {
        let mut wrong = Entity::new(METADATA_NAME);
        wrong.set("x", 1i64);
        let bytes = raw_container(&[wrong.into_value(1)]);
        assert!(matches!(
            PfbReader::new(bytes.as_slice()),
            Err(PfbError::Format(FormatError::ObjectBranchMismatch { branch: 1, expected: 0, .. }))
        ));
    }

    #[test]
    fn test_object_must_match_record_name() {
        // "case" record carrying the "sample" payload
        let mut mislabeled = Entity::new("case");
        mislabeled.set("x", Value::Enum("Not_20_Reported".to_string()));
        let bytes = raw_container(&[metadata(), case(1), mislabeled.into_value(2), case(3)]);

        let mut reader = PfbReader::new(bytes.as_slice()).unwrap();
        assert_eq!(reader.next().unwrap().unwrap().get("x"), Some(&Value::Long(1)));
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            PfbError::Format(FormatError::ObjectBranchMismatch { ref name, branch: 2, expected: 1 })
                if name == "case"
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_iteration_and_fuse() {
        let metadata = Value::Record(BTreeMap::from([
            ("id".to_string(), Value::Null),
            ("name".to_string(), Value::from("Metadata")),
            (
                "object".to_string(),
                Value::Union(0, Box::new(Metadata::default().to_value())),
            ),
            ("relations".to_string(), Value::Array(Vec::new())),
        ]));
        let bytes = raw_container(&[metadata, case(1), case(2)]);
        let mut reader = PfbReader::new(bytes.as_slice()).unwrap();
        assert_eq!(reader.metadata(), &Metadata::default());
        assert_eq!(reader.schema().nodes()[0].name, "case");

        let xs: Vec<Value> = reader
            .by_ref()
            .map(|r| r.unwrap().get("x").cloned().unwrap())
            .collect();
        assert_eq!(xs, vec![Value::Long(1), Value::Long(2)]);
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
    }
}
