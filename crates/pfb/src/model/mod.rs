//! Data model types for PFB.
//!
//! This module contains the core types for representing PFB data:
//! - Avro schemas (the node record types and the container envelope)
//! - Dynamic datum values
//! - Entities (the records of a container) and their relations
//! - Container metadata (ontology bindings and links)
//! - Builders (ergonomic construction)

pub mod builder;
pub mod entity;
pub mod metadata;
pub mod schema;
pub mod value;

pub use builder::EntityBuilder;
pub use entity::{Entity, Object, Relation};
pub use metadata::{Link, Metadata, Multiplicity, Node, Property};
pub use schema::{EnumSchema, EnumSite, Field, FixedSchema, RecordSchema, Schema};
pub use value::Value;
