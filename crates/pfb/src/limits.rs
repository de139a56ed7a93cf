//! Wire constants and decoder safety limits.
//!
//! The decoder reads untrusted input, so every length read from the wire is
//! checked against one of these bounds before anything is allocated.

/// Avro object container magic: `Obj` followed by format version 1.
pub const MAGIC: &[u8; 4] = b"Obj\x01";

/// Size of the per-file sync marker.
pub const SYNC_SIZE: usize = 16;

/// Maximum bytes in a 64-bit varint.
pub const MAX_VARINT_BYTES: usize = 10;

/// Maximum length of a string or bytes value (64 MiB).
pub const MAX_STRING_LEN: usize = 64 * 1024 * 1024;

/// Maximum number of items in one array or map block.
pub const MAX_COLLECTION_LEN: usize = 16 * 1024 * 1024;

/// Maximum size of one (compressed or decompressed) data block (256 MiB).
pub const MAX_BLOCK_SIZE: usize = 256 * 1024 * 1024;

/// Maximum number of entries in the container header metadata map.
pub const MAX_HEADER_ENTRIES: usize = 1024;

/// Maximum nesting depth accepted when parsing or walking a schema.
pub const MAX_SCHEMA_DEPTH: usize = 64;

/// Default uncompressed block size before a block is flushed.
pub const DEFAULT_BLOCK_SIZE: usize = 16_000;

/// Compression level used for the `zstandard` codec.
pub const ZSTD_LEVEL: i32 = 3;

/// Header key holding the JSON schema.
pub const SCHEMA_KEY: &str = "avro.schema";

/// Header key holding the codec name.
pub const CODEC_KEY: &str = "avro.codec";
