//! Binary encoding/decoding for PFB.
//!
//! Implements the Avro binary encoding and object container file layout that
//! PFB files are stored in, plus the identifier codec for enum symbols.

pub mod container;
pub mod datum;
pub mod ident;
pub mod primitives;

pub use container::{Codec, ContainerReader, ContainerWriter, Header};
pub use datum::{decode_datum, decode_tagged, encode_datum, Names};
pub use primitives::{Reader, Writer, zigzag_decode, zigzag_encode};
