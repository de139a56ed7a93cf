//! PFB: Portable Format for Biomedical Data.
//!
//! This crate reads and writes PFB containers and synthesizes their schema
//! from a data dictionary.
//!
//! # Overview
//!
//! A PFB file is an Avro object container whose records share one envelope:
//! - **Self-describing**: the schema of every node type is embedded in the file
//! - **Metadata first**: the first record describes node types, their
//!   ontology references and the links between them
//! - **Graph-shaped**: every record carries relations to other records
//!
//! # Quick Start
//!
//! ```rust
//! use pfb::{synthesize, Dictionary, EntityBuilder, PfbReader, PfbWriter};
//! use serde_json::json;
//!
//! let dictionary = Dictionary::from_json(json!({
//!     "person": {"properties": {
//!         "age": {"type": "integer"},
//!         "role": {"enum": ["admin", "user"], "default": "user"}
//!     }}
//! }))?;
//! let synthesized = synthesize(&dictionary);
//!
//! // Write a container to memory
//! let mut writer = PfbWriter::new(Vec::new());
//! writer.set_schema(synthesized.nodes);
//! writer.set_metadata(synthesized.metadata);
//! let person = EntityBuilder::new("person")
//!     .id("p1")
//!     .long("age", 30)
//!     .string("role", "admin")
//!     .build();
//! writer.write(vec![person], true)?;
//! let bytes = writer.finish()?;
//!
//! // Read it back
//! let reader = PfbReader::new(bytes.as_slice())?;
//! assert_eq!(reader.metadata().nodes[0].name, "person");
//! for record in reader {
//!     let record = record?;
//!     assert_eq!(record.get("role").and_then(|v| v.as_str()), Some("admin"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! - [`dictionary`]: Dictionary input and schema synthesis
//! - [`pfb`]: Reader, writer and rename operations
//! - [`model`]: Schemas, values, entities and metadata
//! - [`codec`]: Avro binary encoding, container files and the identifier codec
//! - [`validate`]: Advisory record validation
//! - [`error`]: Error types
//! - [`limits`]: Wire constants and decoder limits
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - String, collection and block sizes are bounded by [`limits`]
//! - Varints are limited to prevent overflow
//! - Schema nesting depth is bounded
//!
//! # Enum symbols
//!
//! Avro enum symbols must be identifiers, dictionary values often are not.
//! Symbols are stored encoded by [`codec::ident`] (`"Not Reported"` becomes
//! `"Not_20_Reported"`) and the reader hands them back decoded.

pub mod codec;
pub mod dictionary;
pub mod error;
pub mod limits;
pub mod model;
pub mod pfb;
pub mod validate;

// Re-export commonly used types at crate root
pub use codec::Codec;
pub use dictionary::{
    Dictionary, SynthesisOptions, Synthesized, synthesize, synthesize_with_options,
};
pub use error::{
    DecodeError, EncodeError, FormatError, PfbError, SchemaError, UnsupportedType,
    ValidationError,
};
pub use model::{
    Entity, EntityBuilder, EnumSchema, Field, Link, Metadata, Multiplicity, Node, Object,
    Property, RecordSchema, Relation, Schema, Value,
};
pub use pfb::{NodeSchemas, PfbReader, PfbWriter, Rename, WriterOptions};
pub use validate::{validate_entity, validate_metadata};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// PFB envelope version this crate reads and writes.
pub const FORMAT_VERSION: &str = "0.1";
