//! Reading and writing PFB containers.
//!
//! A PFB container is an Avro object container whose records all share one
//! envelope (see [`envelope`]). The first record carries the [`Metadata`];
//! every later record holds one node object. Enum symbols are stored
//! identifier-encoded on disk and exposed decoded.
//!
//! [`Metadata`]: crate::model::Metadata

pub mod base;
pub mod envelope;
pub mod reader;
pub mod rename;
pub mod writer;

pub use base::{decode_nodes, encode_nodes, transcode_field, Direction, NodeSchemas};
pub use envelope::{envelope_schema, split_envelope, METADATA_SCHEMA};
pub use reader::PfbReader;
pub use rename::Rename;
pub use writer::{PfbWriter, WriterOptions};
