//! Error types for PFB encoding/decoding, schema handling and validation.

use thiserror::Error;

/// Error during binary decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === Container framing ===
    #[error("invalid magic bytes: expected Obj\\x01, found {found:?}")]
    InvalidMagic { found: [u8; 4] },

    #[error("sync marker mismatch after data block")]
    SyncMismatch,

    #[error("container header is missing the {key} entry")]
    MissingHeaderEntry { key: &'static str },

    #[error("unsupported block codec: {0}")]
    UnsupportedCodec(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    // === Primitives ===
    #[error("unexpected end of input while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("varint exceeds maximum length (10 bytes)")]
    VarintTooLong,

    #[error("varint overflow (value exceeds u64)")]
    VarintOverflow,

    #[error("{field} has negative length {len}")]
    NegativeLength { field: &'static str, len: i64 },

    #[error("{field} length {len} exceeds maximum {max}")]
    LengthExceedsLimit {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("invalid bool value: {value} (expected 0x00 or 0x01)")]
    InvalidBool { value: u8 },

    #[error("int value {value} does not fit in 32 bits")]
    IntOutOfRange { value: i64 },

    // === Schema-driven decoding ===
    #[error("union index {index} out of bounds (size: {size})")]
    UnionIndexOutOfBounds { index: i64, size: usize },

    #[error("enum {name} index {index} out of bounds (size: {size})")]
    EnumIndexOutOfBounds { name: String, index: i64, size: usize },

    #[error("unresolved named type: {0}")]
    UnresolvedName(String),

    #[error("schema nesting exceeds maximum depth {max}")]
    DepthExceeded { max: usize },
}

/// Error during binary encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("record {record} is missing field {field} and the field has no default")]
    MissingField { record: String, field: String },

    #[error("type mismatch: schema expects {expected}, value is {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("symbol {symbol:?} is not declared by enum {name}")]
    UnknownSymbol { name: String, symbol: String },

    #[error("no union branch accepts a {found} value")]
    NoMatchingBranch { found: &'static str },

    #[error("union index {index} out of bounds (size: {size})")]
    UnionIndexOutOfBounds { index: usize, size: usize },

    #[error("fixed {name} expects {expected} bytes, got {actual}")]
    FixedSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("unresolved named type: {0}")]
    UnresolvedName(String),

    #[error("default for {field} does not match its type")]
    InvalidDefault { field: String },

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("schema nesting exceeds maximum depth {max}")]
    DepthExceeded { max: usize },
}

/// Error while parsing an Avro JSON schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("schema is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("{context} is missing the {attribute:?} attribute")]
    MissingAttribute {
        context: &'static str,
        attribute: &'static str,
    },

    #[error("{context} has a malformed {attribute:?} attribute")]
    MalformedAttribute {
        context: &'static str,
        attribute: &'static str,
    },

    #[error("unknown schema type: {0}")]
    UnknownType(String),

    #[error("schema nesting exceeds maximum depth {max}")]
    DepthExceeded { max: usize },
}

/// The container does not have the PFB envelope shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("envelope schema is not a record")]
    EnvelopeNotRecord,

    #[error("envelope third field must be \"object\", found {found:?}")]
    MissingObjectField { found: Option<String> },

    #[error("envelope object field must be a non-empty union")]
    ObjectNotUnion,

    #[error("first object alternative must be Metadata, found {found:?}")]
    MetadataNotFirstAlternative { found: Option<String> },

    #[error("object alternative {index} is not a record")]
    AlternativeNotRecord { index: usize },

    #[error("container holds no Metadata record")]
    MissingMetadataRecord,

    #[error("first record must be Metadata, found {found:?}")]
    UnexpectedFirstRecord { found: String },

    #[error("no node schema named {name:?}")]
    UnknownNode { name: String },

    #[error("record {name:?} holds object alternative {branch}, expected {expected}")]
    ObjectBranchMismatch {
        name: String,
        branch: usize,
        expected: usize,
    },

    #[error("malformed record envelope: {reason}")]
    InvalidEntity { reason: String },

    #[error("malformed Metadata record: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Metadata record was already written to this container")]
    MetadataAlreadyWritten,

    #[error("schema changed after the container header was written")]
    SchemaChanged,
}

/// Error during advisory validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no node schema named {node:?}")]
    UnknownNode { node: String },

    #[error("node {node:?} has no field {field:?}")]
    UnknownField { node: String, field: String },

    #[error("node {node:?} declares no link matching relation to {dst_name:?}")]
    UnlinkedRelation { node: String, dst_name: String },

    #[error("node {node:?} links to unknown node {dst:?}")]
    DanglingLink { node: String, dst: String },
}

/// Umbrella error for Reader/Writer operations.
#[derive(Debug, Error)]
pub enum PfbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A dictionary property that could not be mapped to a field.
///
/// Synthesis drops the property and continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedType {
    /// Dictionary type the property belongs to.
    pub node: String,
    /// Property (or link) name.
    pub property: String,
    /// Why it was dropped.
    pub reason: String,
}

impl std::fmt::Display for UnsupportedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.node, self.property, self.reason)
    }
}
