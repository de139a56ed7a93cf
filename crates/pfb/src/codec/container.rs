//! Avro object container files.
//!
//! Layout: `Obj\x01` magic, a header metadata map (`avro.schema`,
//! `avro.codec`, ...), a 16-byte sync marker, then data blocks of
//! `(count, size, data, sync)`. Block data is compressed by the file codec.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use tracing::debug;

use crate::codec::datum::{decode_datum, decode_tagged, Names};
use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError, PfbError};
use crate::limits::{
    CODEC_KEY, MAGIC, MAX_BLOCK_SIZE, MAX_COLLECTION_LEN, MAX_HEADER_ENTRIES, MAX_STRING_LEN,
    MAX_VARINT_BYTES, SCHEMA_KEY, SYNC_SIZE, ZSTD_LEVEL,
};
use crate::model::schema::Schema;
use crate::model::Value;

/// Block compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    Null,
    /// Raw DEFLATE (RFC 1951), no zlib framing.
    Deflate,
    Zstandard,
}

impl Codec {
    /// The name stored under `avro.codec`.
    pub fn name(self) -> &'static str {
        match self {
            Codec::Null => "null",
            Codec::Deflate => "deflate",
            Codec::Zstandard => "zstandard",
        }
    }

    /// Parses an `avro.codec` value.
    pub fn from_name(name: &str) -> Result<Codec, DecodeError> {
        match name {
            "null" => Ok(Codec::Null),
            "deflate" => Ok(Codec::Deflate),
            "zstandard" => Ok(Codec::Zstandard),
            other => Err(DecodeError::UnsupportedCodec(other.to_string())),
        }
    }

    fn compress(self, data: &[u8]) -> Result<Vec<u8>, EncodeError> {
        match self {
            Codec::Null => Ok(data.to_vec()),
            Codec::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(data)
                    .map_err(|e| EncodeError::CompressionFailed(e.to_string()))?;
                encoder
                    .finish()
                    .map_err(|e| EncodeError::CompressionFailed(e.to_string()))
            }
            Codec::Zstandard => zstd::encode_all(data, ZSTD_LEVEL)
                .map_err(|e| EncodeError::CompressionFailed(e.to_string())),
        }
    }

    fn decompress(self, data: Vec<u8>) -> Result<Vec<u8>, DecodeError> {
        let decompressed = match self {
            Codec::Null => return Ok(data),
            Codec::Deflate => read_bounded(DeflateDecoder::new(data.as_slice()))?,
            Codec::Zstandard => {
                let decoder = zstd::Decoder::new(data.as_slice())
                    .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;
                read_bounded(decoder)?
            }
        };
        Ok(decompressed)
    }
}

fn read_bounded(decoder: impl Read) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    decoder
        .take(MAX_BLOCK_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;
    if out.len() > MAX_BLOCK_SIZE {
        return Err(DecodeError::LengthExceedsLimit {
            field: "decompressed block",
            len: out.len(),
            max: MAX_BLOCK_SIZE,
        });
    }
    Ok(out)
}

/// A parsed container header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// The file schema.
    pub schema: Schema,
    /// Schema JSON exactly as stored in the header.
    pub schema_json: String,
    pub codec: Codec,
    pub sync: [u8; SYNC_SIZE],
    /// All header entries, including the schema and codec.
    pub metadata: BTreeMap<String, Vec<u8>>,
}

impl Header {
    /// Builds a header for `schema` with a fresh random sync marker.
    pub fn new(schema: &Schema, codec: Codec) -> Self {
        let schema_json = schema.to_json().to_string();
        let mut metadata = BTreeMap::new();
        metadata.insert(SCHEMA_KEY.to_string(), schema_json.clone().into_bytes());
        metadata.insert(CODEC_KEY.to_string(), codec.name().as_bytes().to_vec());
        Self {
            schema: schema.clone(),
            schema_json,
            codec,
            sync: uuid::Uuid::new_v4().into_bytes(),
            metadata,
        }
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(self.schema_json.len() + 64);
        writer.write_bytes(MAGIC);
        writer.write_long(self.metadata.len() as i64);
        for (key, value) in &self.metadata {
            writer.write_string(key);
            writer.write_bytes_prefixed(value);
        }
        writer.write_long(0);
        writer.write_bytes(&self.sync);
        writer.into_bytes()
    }

    /// Reads a header from the start of a stream.
    pub fn read_from(input: &mut impl Read) -> Result<Header, PfbError> {
        let mut magic = [0u8; 4];
        read_exact(input, &mut magic, "magic")?;
        if &magic != MAGIC {
            return Err(DecodeError::InvalidMagic { found: magic }.into());
        }

        let mut metadata = BTreeMap::new();
        loop {
            let count = read_stream_long(input, "header map")?
                .ok_or(DecodeError::UnexpectedEof {
                    context: "header map",
                })?;
            if count == 0 {
                break;
            }
            if count < 0 {
                read_stream_long(input, "header map")?;
            }
            let count = count.unsigned_abs() as usize;
            if metadata.len() + count > MAX_HEADER_ENTRIES {
                return Err(DecodeError::LengthExceedsLimit {
                    field: "header map",
                    len: metadata.len() + count,
                    max: MAX_HEADER_ENTRIES,
                }
                .into());
            }
            for _ in 0..count {
                let key = read_stream_bytes(input, "header key")?;
                let key = String::from_utf8(key).map_err(|_| DecodeError::InvalidUtf8 {
                    field: "header key",
                })?;
                let value = read_stream_bytes(input, "header value")?;
                metadata.insert(key, value);
            }
        }

        let mut sync = [0u8; SYNC_SIZE];
        read_exact(input, &mut sync, "sync marker")?;

        let schema_bytes = metadata
            .get(SCHEMA_KEY)
            .ok_or(DecodeError::MissingHeaderEntry { key: SCHEMA_KEY })?;
        let schema_json = String::from_utf8(schema_bytes.clone()).map_err(|_| {
            DecodeError::InvalidUtf8 {
                field: "avro.schema",
            }
        })?;
        let schema = Schema::parse_str(&schema_json)?;

        // A missing codec entry means uncompressed
        let codec = match metadata.get(CODEC_KEY) {
            Some(name) => Codec::from_name(&String::from_utf8_lossy(name))?,
            None => Codec::Null,
        };

        Ok(Header {
            schema,
            schema_json,
            codec,
            sync,
            metadata,
        })
    }
}

fn read_exact(input: &mut impl Read, buf: &mut [u8], context: &'static str) -> Result<(), PfbError> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => PfbError::Decode(DecodeError::UnexpectedEof { context }),
        _ => PfbError::Io(e),
    })
}

/// Reads a zigzag long from a stream; `None` on a clean end of stream.
fn read_stream_long(input: &mut impl Read, context: &'static str) -> Result<Option<i64>, PfbError> {
    let mut buf = [0u8; MAX_VARINT_BYTES];
    let mut len = 0;
    loop {
        let mut byte = [0u8; 1];
        match input.read(&mut byte) {
            Ok(0) if len == 0 => return Ok(None),
            Ok(0) => return Err(DecodeError::UnexpectedEof { context }.into()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
        buf[len] = byte[0];
        len += 1;
        if byte[0] & 0x80 == 0 || len == MAX_VARINT_BYTES {
            break;
        }
    }
    let mut reader = Reader::new(&buf[..len]);
    Ok(Some(reader.read_long(context)?))
}

fn read_stream_len(
    input: &mut impl Read,
    max_len: usize,
    field: &'static str,
) -> Result<usize, PfbError> {
    let len = read_stream_long(input, field)?.ok_or(DecodeError::UnexpectedEof { context: field })?;
    if len < 0 {
        return Err(DecodeError::NegativeLength { field, len }.into());
    }
    let len = len as usize;
    if len > max_len {
        return Err(DecodeError::LengthExceedsLimit {
            field,
            len,
            max: max_len,
        }
        .into());
    }
    Ok(len)
}

fn read_stream_bytes(input: &mut impl Read, field: &'static str) -> Result<Vec<u8>, PfbError> {
    let len = read_stream_len(input, MAX_STRING_LEN, field)?;
    let mut buf = vec![0u8; len];
    read_exact(input, &mut buf, field)?;
    Ok(buf)
}

// =============================================================================
// READING
// =============================================================================

/// Streaming container reader, one block in memory at a time.
#[derive(Debug)]
pub struct ContainerReader<R> {
    inner: R,
    header: Header,
    names: Names,
    block: Vec<u8>,
    offset: usize,
    remaining: usize,
    blocks_read: u64,
}

impl<R: Read> ContainerReader<R> {
    /// Reads the header and positions the reader at the first block.
    pub fn new(mut inner: R) -> Result<Self, PfbError> {
        let header = Header::read_from(&mut inner)?;
        debug!(codec = header.codec.name(), "opened container");
        let names = Names::from_schema(&header.schema);
        Ok(Self {
            inner,
            header,
            names,
            block: Vec::new(),
            offset: 0,
            remaining: 0,
            blocks_read: 0,
        })
    }

    /// The container header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Decodes the next datum, or `None` after the last block.
    pub fn next_value(&mut self) -> Result<Option<Value>, PfbError> {
        self.next_with(decode_datum)
    }

    /// Like [`next_value`](Self::next_value), but top-level union fields of
    /// the record keep their branch index (see [`decode_tagged`]).
    pub fn next_tagged(&mut self) -> Result<Option<Value>, PfbError> {
        self.next_with(decode_tagged)
    }

    fn next_with(
        &mut self,
        decode: fn(&mut Reader<'_>, &Schema, &Names) -> Result<Value, DecodeError>,
    ) -> Result<Option<Value>, PfbError> {
        while self.remaining == 0 {
            if !self.load_block()? {
                return Ok(None);
            }
        }

        let mut reader = Reader::new(&self.block[self.offset..]);
        let value = decode(&mut reader, &self.header.schema, &self.names)?;
        self.offset += reader.position();
        self.remaining -= 1;
        Ok(Some(value))
    }

    fn load_block(&mut self) -> Result<bool, PfbError> {
        let Some(count) = read_stream_long(&mut self.inner, "block count")? else {
            return Ok(false);
        };
        if count < 0 || count as u64 > MAX_COLLECTION_LEN as u64 {
            return Err(DecodeError::LengthExceedsLimit {
                field: "block count",
                len: count.unsigned_abs() as usize,
                max: MAX_COLLECTION_LEN,
            }
            .into());
        }
        let size = read_stream_len(&mut self.inner, MAX_BLOCK_SIZE, "block size")?;
        let mut data = vec![0u8; size];
        read_exact(&mut self.inner, &mut data, "block data")?;

        let mut sync = [0u8; SYNC_SIZE];
        read_exact(&mut self.inner, &mut sync, "sync marker")?;
        if sync != self.header.sync {
            return Err(DecodeError::SyncMismatch.into());
        }

        self.block = self.header.codec.decompress(data)?;
        self.offset = 0;
        self.remaining = count as usize;
        self.blocks_read += 1;
        debug!(block = self.blocks_read, count, size, "read block");
        Ok(true)
    }

    /// Consumes the reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

// =============================================================================
// WRITING
// =============================================================================

/// Buffered container writer.
///
/// Datums are appended pre-encoded; a block is flushed once its buffered
/// size reaches the configured block size.
#[derive(Debug)]
pub struct ContainerWriter<W: Write> {
    inner: W,
    header: Header,
    block_size: usize,
    buffer: Writer,
    count: usize,
    blocks_written: u64,
}

impl<W: Write> ContainerWriter<W> {
    /// Writes a fresh header for `schema` and returns a writer for its blocks.
    pub fn new(
        mut inner: W,
        schema: &Schema,
        codec: Codec,
        block_size: usize,
    ) -> Result<Self, PfbError> {
        let header = Header::new(schema, codec);
        inner.write_all(&header.to_bytes())?;
        debug!(codec = codec.name(), "wrote container header");
        Ok(Self::resume(inner, header, block_size))
    }

    /// Continues an existing container; `inner` must be positioned after its
    /// last block.
    pub fn resume(inner: W, header: Header, block_size: usize) -> Self {
        Self {
            inner,
            header,
            block_size: block_size.max(1),
            buffer: Writer::with_capacity(block_size),
            count: 0,
            blocks_written: 0,
        }
    }

    /// The container header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Changes the buffered size at which blocks are flushed.
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size.max(1);
    }

    /// Appends one encoded datum.
    pub fn append(&mut self, datum: &[u8]) -> Result<(), PfbError> {
        self.buffer.write_bytes(datum);
        self.count += 1;
        if self.buffer.len() >= self.block_size {
            self.flush_block()?;
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<(), PfbError> {
        if self.count == 0 {
            return Ok(());
        }
        let data = self.header.codec.compress(self.buffer.as_bytes())?;
        let mut framing = Writer::with_capacity(2 * MAX_VARINT_BYTES);
        framing.write_long(self.count as i64);
        framing.write_long(data.len() as i64);

        self.inner.write_all(framing.as_bytes())?;
        self.inner.write_all(&data)?;
        self.inner.write_all(&self.header.sync)?;

        self.blocks_written += 1;
        debug!(
            block = self.blocks_written,
            count = self.count,
            size = data.len(),
            "flushed block"
        );
        self.buffer.clear();
        self.count = 0;
        Ok(())
    }

    /// Writes any buffered datums as a block and flushes the sink.
    pub fn flush(&mut self) -> Result<(), PfbError> {
        self.flush_block()?;
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes and returns the sink.
    pub fn into_inner(mut self) -> Result<W, PfbError> {
        self.flush()?;
        Ok(self.inner)
    }
}
