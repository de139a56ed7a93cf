//! Single-pass PFB writer.
//!
//! The container header is written on the first `write`, from the node
//! schemas as they are at that point. Renames and schema changes must come
//! before it.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::codec::{encode_datum, Codec, ContainerWriter, Names, Writer as ByteWriter};
use crate::error::{FormatError, PfbError};
use crate::limits::DEFAULT_BLOCK_SIZE;
use crate::model::{Entity, Metadata, RecordSchema, Value};
use crate::pfb::base::{Direction, NodeSchemas};
use crate::pfb::envelope::METADATA_NAME;
use crate::pfb::reader::PfbReader;
use crate::pfb::rename::Rename;
use crate::validate::{validate_entity, validate_metadata};

/// Writer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Block codec for new containers. Appends keep the file's codec.
    pub codec: Codec,
    /// Uncompressed size at which a block is flushed.
    pub block_size: usize,
    /// Run [`validate_entity`] on every record.
    pub validate: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            codec: Codec::Null,
            block_size: DEFAULT_BLOCK_SIZE,
            validate: false,
        }
    }
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

#[derive(Debug)]
enum State<W: Write> {
    /// Nothing written yet.
    Pending(W),
    /// Header written; records go to the container.
    Streaming {
        container: ContainerWriter<W>,
        names: Names,
    },
    /// Only seen if writing the header failed.
    Closed,
}

/// Writes a PFB container.
///
/// ```no_run
/// use pfb::{PfbReader, PfbWriter};
///
/// let reader = PfbReader::open("in.avro")?;
/// let mut writer = PfbWriter::create("out.avro")?;
/// writer.copy_schema(&reader);
/// writer.rename_node("case", "subject");
/// writer.try_write(reader, true)?;
/// writer.finish()?;
/// # Ok::<(), pfb::PfbError>(())
/// ```
#[derive(Debug)]
pub struct PfbWriter<W: Write> {
    state: State<W>,
    options: WriterOptions,
    schema: NodeSchemas,
    metadata: Metadata,
    renames: Vec<Rename>,
    /// Set when the schema changed since the header was checked.
    schema_dirty: bool,
    metadata_written: bool,
    records_written: u64,
    scratch: ByteWriter,
}

impl PfbWriter<BufWriter<File>> {
    /// Creates (or truncates) a container file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, PfbError> {
        let file = File::create(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "creating PFB file");
        Ok(Self::new(BufWriter::new(file)))
    }

    /// Opens a container for appending records.
    ///
    /// The file's schema and metadata are loaded and its header and sync
    /// marker are reused; records go after the last block. A missing or
    /// empty file is created instead.
    pub fn open_append(path: impl AsRef<Path>) -> Result<Self, PfbError> {
        let path = path.as_ref();
        let existing = match fs::metadata(path) {
            Ok(meta) => meta.len() > 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if !existing {
            return Self::create(path);
        }

        let reader = PfbReader::open(path)?;
        let header = reader.header().clone();
        let schema = reader.schema().clone();
        let metadata = reader.metadata().clone();
        drop(reader);

        let file = OpenOptions::new().append(true).open(path)?;
        let names = Names::from_schema(&header.schema);
        let options = WriterOptions::default().codec(header.codec);
        let container = ContainerWriter::resume(BufWriter::new(file), header, options.block_size);
        info!(path = %path.display(), nodes = schema.len(), "appending to PFB file");

        Ok(Self {
            state: State::Streaming { container, names },
            options,
            schema,
            metadata,
            renames: Vec::new(),
            schema_dirty: false,
            metadata_written: true,
            records_written: 0,
            scratch: ByteWriter::new(),
        })
    }
}

impl<W: Write> PfbWriter<W> {
    /// Creates a writer over `inner` with no schema.
    pub fn new(inner: W) -> Self {
        Self {
            state: State::Pending(inner),
            options: WriterOptions::default(),
            schema: NodeSchemas::default(),
            metadata: Metadata::default(),
            renames: Vec::new(),
            schema_dirty: true,
            metadata_written: false,
            records_written: 0,
            scratch: ByteWriter::new(),
        }
    }

    /// Sets the writer options.
    ///
    /// The codec only applies to containers whose header is not yet written.
    pub fn with_options(mut self, options: WriterOptions) -> Self {
        if let State::Streaming { container, .. } = &mut self.state {
            container.set_block_size(options.block_size);
        }
        self.options = options;
        self
    }

    /// Copies the node schemas and metadata of an open reader.
    pub fn copy_schema<R: Read>(&mut self, reader: &PfbReader<R>) {
        self.schema = reader.schema().clone();
        self.metadata = reader.metadata().clone();
        self.schema_dirty = true;
    }

    /// Replaces the node schemas (decoded form).
    pub fn set_schema(&mut self, nodes: Vec<RecordSchema>) {
        self.schema = NodeSchemas::new(nodes);
        self.schema_dirty = true;
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    pub fn schema(&self) -> &NodeSchemas {
        &self.schema
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Renames registered so far, in application order.
    pub fn renames(&self) -> &[Rename] {
        &self.renames
    }

    /// Records written by this writer, excluding Metadata.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    // =========================================================================
    // Renames
    // =========================================================================

    /// Renames node type `old` to `new` in the schema, the metadata and
    /// every record written afterwards (including relation targets).
    ///
    /// Returns false, registering nothing, if there is no node `old` or if
    /// `new` already names another node.
    pub fn rename_node(&mut self, old: &str, new: &str) -> bool {
        if !self.schema.rename_node(old, new) {
            debug!(old, new, "rename_node: no such node or name taken");
            return false;
        }
        self.metadata.rename_node(old, new);
        self.renames.push(Rename::Node {
            from: old.to_string(),
            to: new.to_string(),
        });
        self.schema_dirty = true;
        info!(old, new, "renamed node");
        true
    }

    /// Renames symbol `old` of enum field `field` to `new` in every node
    /// declaring it, and in the matching values of records written
    /// afterwards to those nodes.
    ///
    /// Returns false, registering nothing, if no node declares `old`.
    pub fn rename_enum(&mut self, field: &str, old: &str, new: &str) -> bool {
        let nodes = self.schema.rename_enum(field, old, new);
        if nodes.is_empty() {
            debug!(field, old, "rename_enum: no such symbol");
            return false;
        }
        info!(field, old, new, nodes = ?nodes, "renamed enum symbol");
        self.renames.push(Rename::Enum {
            field: field.to_string(),
            from: old.to_string(),
            to: new.to_string(),
            nodes,
        });
        self.schema_dirty = true;
        true
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Writes the Metadata record (if `include_metadata`) and then `records`.
    ///
    /// Returns the number of records written, not counting Metadata.
    pub fn write<I>(&mut self, records: I, include_metadata: bool) -> Result<u64, PfbError>
    where
        I: IntoIterator<Item = Entity>,
    {
        self.try_write(records.into_iter().map(Ok::<_, PfbError>), include_metadata)
    }

    /// Like [`PfbWriter::write`] for fallible sources such as a
    /// [`PfbReader`]. Stops at the first error.
    pub fn try_write<I, E>(&mut self, records: I, include_metadata: bool) -> Result<u64, PfbError>
    where
        I: IntoIterator<Item = Result<Entity, E>>,
        E: Into<PfbError>,
    {
        self.start()?;
        if include_metadata {
            self.emit_metadata()?;
        }

        let mut count = 0;
        let result = records.into_iter().try_for_each(|record| -> Result<(), PfbError> {
            let record = match record {
                Ok(record) => record,
                Err(e) => return Err(e.into()),
            };
            self.write_record(record)?;
            count += 1;
            Ok(())
        });
        self.records_written += count;
        // Flush whatever was accepted, even after a failing record
        self.container()?.flush()?;
        result?;

        info!(
            records = count,
            total = self.records_written,
            "wrote PFB records"
        );
        Ok(count)
    }

    /// Writes only the Metadata record.
    pub fn write_metadata(&mut self) -> Result<(), PfbError> {
        self.start()?;
        self.emit_metadata()?;
        self.container()?.flush()
    }

    /// Flushes and returns the sink. A writer that never wrote returns its
    /// sink untouched.
    pub fn finish(mut self) -> Result<W, PfbError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Pending(inner) => Ok(inner),
            State::Streaming { container, .. } => container.into_inner(),
            State::Closed => Err(closed()),
        }
    }

    /// Writes the header, or checks the schema still matches it.
    fn start(&mut self) -> Result<(), PfbError> {
        if !self.schema_dirty {
            return Ok(());
        }
        let envelope = self.schema.envelope();
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Pending(inner) => {
                let container = ContainerWriter::new(
                    inner,
                    &envelope,
                    self.options.codec,
                    self.options.block_size,
                )?;
                let names = Names::from_schema(&envelope);
                self.state = State::Streaming { container, names };
            }
            State::Streaming { container, names } => {
                let unchanged = container.header().schema.to_json() == envelope.to_json();
                self.state = State::Streaming { container, names };
                if !unchanged {
                    return Err(FormatError::SchemaChanged.into());
                }
            }
            State::Closed => return Err(closed()),
        }
        self.schema_dirty = false;
        Ok(())
    }

    fn emit_metadata(&mut self) -> Result<(), PfbError> {
        if self.metadata_written || self.records_written > 0 {
            return Err(FormatError::MetadataAlreadyWritten.into());
        }
        if self.options.validate {
            validate_metadata(&self.schema, &self.metadata)?;
        }
        let record = Value::Record(BTreeMap::from([
            ("id".to_string(), Value::Null),
            ("name".to_string(), Value::String(METADATA_NAME.to_string())),
            (
                "object".to_string(),
                Value::Union(0, Box::new(self.metadata.to_value())),
            ),
            ("relations".to_string(), Value::Array(Vec::new())),
        ]));
        self.append(&record)?;
        self.metadata_written = true;
        Ok(())
    }

    fn write_record(&mut self, mut entity: Entity) -> Result<(), PfbError> {
        for rename in &self.renames {
            rename.apply(&mut entity);
        }
        let position = self
            .schema
            .position(&entity.name)
            .ok_or_else(|| FormatError::UnknownNode {
                name: entity.name.clone(),
            })?;
        if self.options.validate {
            validate_entity(&self.schema, &self.metadata, &entity)?;
        }
        self.schema.transcode_entity(&mut entity, Direction::Encode);
        // Metadata is the first alternative of the object union
        let branch = position + 1;
        self.append(&entity.into_value(branch))
    }

    /// Encodes one envelope value into the scratch buffer, then hands it to
    /// the container.
    fn append(&mut self, value: &Value) -> Result<(), PfbError> {
        let State::Streaming { container, names } = &mut self.state else {
            return Err(closed());
        };
        self.scratch.clear();
        encode_datum(&mut self.scratch, &container.header().schema, value, names)?;
        container.append(self.scratch.as_bytes())
    }

    fn container(&mut self) -> Result<&mut ContainerWriter<W>, PfbError> {
        match &mut self.state {
            State::Streaming { container, .. } => Ok(container),
            _ => Err(closed()),
        }
    }
}

fn closed() -> PfbError {
    PfbError::Io(io::Error::other("PFB writer has no open container"))
}
