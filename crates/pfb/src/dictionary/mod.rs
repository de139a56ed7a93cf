//! Data dictionary input and schema synthesis.
//!
//! A dictionary maps node type names to type definitions:
//!
//! ```json
//! {
//!   "case": {
//!     "properties": {"age": {"type": "integer"}},
//!     "links": [{"name": "studies", "target_type": "study", "multiplicity": "many_to_one"}],
//!     "required": ["age"],
//!     "term": {"termDef": {"term": "Case", "source": "NCIt"}}
//!   }
//! }
//! ```
//!
//! Keys starting with `_` (`_definitions`, `_settings`, `_terms`) hold shared
//! definitions rather than node types and are ignored.

mod synth;

pub use synth::{synthesize, synthesize_with_options, Synthesized};

use serde_json::{Map, Value as Json};

use crate::error::SchemaError;

/// A parsed data dictionary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    types: Map<String, Json>,
}

impl Dictionary {
    /// Wraps a dictionary JSON object.
    pub fn from_json(json: Json) -> Result<Dictionary, SchemaError> {
        match json {
            Json::Object(types) => Ok(Dictionary { types }),
            _ => Err(SchemaError::MalformedAttribute {
                context: "dictionary",
                attribute: "root",
            }),
        }
    }

    /// Parses dictionary JSON text.
    pub fn from_json_str(text: &str) -> Result<Dictionary, SchemaError> {
        let json: Json =
            serde_json::from_str(text).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        Dictionary::from_json(json)
    }

    /// Node type definitions in dictionary order, skipping `_` entries.
    pub fn types(&self) -> impl Iterator<Item = (&str, &Json)> {
        self.types
            .iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(name, def)| (name.as_str(), def))
    }

    /// Number of node type definitions.
    pub fn len(&self) -> usize {
        self.types().count()
    }

    /// Returns true if the dictionary defines no node types.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Synthesis configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisOptions {
    /// Leave properties listed in a type's `required` array non-nullable.
    ///
    /// Off by default: every field is nullable, as existing PFB producers
    /// emit them.
    pub honor_required: bool,
}

impl SynthesisOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`SynthesisOptions::honor_required`].
    pub fn honor_required(mut self, honor: bool) -> Self {
        self.honor_required = honor;
        self
    }
}
