//! Builder API for ergonomic Entity construction.
//!
//! # Example
//!
//! ```rust
//! use pfb::model::builder::EntityBuilder;
//!
//! let entity = EntityBuilder::new("person")
//!     .id("p1")
//!     .string("name", "Ada")
//!     .long("age", 36)
//!     .relation("g1", "group")
//!     .build();
//! assert_eq!(entity.name, "person");
//! assert_eq!(entity.relations.len(), 1);
//! ```

use crate::model::{Entity, Object, Relation, Value};

/// Builder for constructing an [`Entity`].
#[derive(Debug, Clone, Default)]
pub struct EntityBuilder {
    id: Option<String>,
    name: String,
    object: Object,
    relations: Vec<Relation>,
}

impl EntityBuilder {
    /// Creates a builder for a record of node type `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the record id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets a fresh random (v4) id.
    pub fn random_id(mut self) -> Self {
        self.id = Some(uuid::Uuid::new_v4().to_string());
        self
    }

    // =========================================================================
    // Field values
    // =========================================================================

    /// Sets a field to any value.
    pub fn value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.object.insert(field.into(), value.into());
        self
    }

    /// Sets a string field. Enum fields take their symbol as a string.
    pub fn string(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.value(field, Value::String(value.into()))
    }

    /// Sets a long field.
    pub fn long(self, field: impl Into<String>, value: i64) -> Self {
        self.value(field, Value::Long(value))
    }

    /// Sets a float/double field.
    pub fn double(self, field: impl Into<String>, value: f64) -> Self {
        self.value(field, Value::Double(value))
    }

    /// Sets a boolean field.
    pub fn boolean(self, field: impl Into<String>, value: bool) -> Self {
        self.value(field, Value::Boolean(value))
    }

    /// Sets a field to null.
    pub fn null(self, field: impl Into<String>) -> Self {
        self.value(field, Value::Null)
    }

    /// Sets an array-of-strings field.
    pub fn strings<S: Into<String>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let items = values
            .into_iter()
            .map(|s| Value::String(s.into()))
            .collect();
        self.value(field, Value::Array(items))
    }

    // =========================================================================
    // Relations
    // =========================================================================

    /// Adds a relation to record `dst_id` of node type `dst_name`.
    pub fn relation(mut self, dst_id: impl Into<String>, dst_name: impl Into<String>) -> Self {
        self.relations.push(Relation::new(dst_id, dst_name));
        self
    }

    /// Builds the entity.
    pub fn build(self) -> Entity {
        Entity {
            id: self.id,
            name: self.name,
            object: self.object,
            relations: self.relations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_builder_all_types() {
        let entity = EntityBuilder::new("sample")
            .id("s1")
            .string("submitter_id", "S-1")
            .long("count", 3)
            .double("weight", 1.5)
            .boolean("frozen", true)
            .null("notes")
            .strings("tags", ["a", "b"])
            .relation("c1", "case")
            .build();

        assert_eq!(entity.id.as_deref(), Some("s1"));
        assert_eq!(entity.object.len(), 6);
        assert_eq!(entity.get("count"), Some(&Value::Long(3)));
        assert_eq!(entity.get("notes"), Some(&Value::Null));
        assert_eq!(
            entity.get("tags"),
            Some(&Value::Array(vec!["a".into(), "b".into()]))
        );
        assert_eq!(entity.relations, vec![Relation::new("c1", "case")]);
    }

    #[test]
    fn test_random_id_is_uuid() {
        let entity = EntityBuilder::new("case").random_id().build();
        let id = entity.id.unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
