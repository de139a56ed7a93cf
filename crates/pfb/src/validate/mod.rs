//! Advisory validation of records and metadata.
//!
//! Structural validation happens during encode and decode. The checks here
//! need the container's node schemas and metadata as context:
//! - a record names a known node and only sets that node's fields
//! - each relation is backed by a link declared in the metadata
//! - metadata links point at known nodes
//!
//! **Note:** Nothing in the container format enforces these; the writer runs
//! [`validate_entity`] only when asked to.

use crate::error::ValidationError;
use crate::model::{Entity, Metadata};
use crate::pfb::NodeSchemas;

/// Validates one record against the node schemas and metadata.
///
/// A relation to `dst_name` is accepted when either side declares a link to
/// the other. Nodes without a metadata entry skip the relation check.
pub fn validate_entity(
    schema: &NodeSchemas,
    metadata: &Metadata,
    entity: &Entity,
) -> Result<(), ValidationError> {
    let node = schema
        .get(&entity.name)
        .ok_or_else(|| ValidationError::UnknownNode {
            node: entity.name.clone(),
        })?;

    for field in entity.object.keys() {
        if node.field(field).is_none() {
            return Err(ValidationError::UnknownField {
                node: entity.name.clone(),
                field: field.clone(),
            });
        }
    }

    let Some(declared) = metadata.node(&entity.name) else {
        return Ok(());
    };
    for relation in &entity.relations {
        let outgoing = declared.links.iter().any(|l| l.dst == relation.dst_name);
        let incoming = metadata
            .node(&relation.dst_name)
            .is_some_and(|dst| dst.links.iter().any(|l| l.dst == entity.name));
        if !outgoing && !incoming {
            return Err(ValidationError::UnlinkedRelation {
                node: entity.name.clone(),
                dst_name: relation.dst_name.clone(),
            });
        }
    }
    Ok(())
}

/// Validates that metadata only describes known nodes and links between them.
pub fn validate_metadata(schema: &NodeSchemas, metadata: &Metadata) -> Result<(), ValidationError> {
    for node in &metadata.nodes {
        if schema.get(&node.name).is_none() {
            return Err(ValidationError::UnknownNode {
                node: node.name.clone(),
            });
        }
        if let Some(link) = node.links.iter().find(|l| schema.get(&l.dst).is_none()) {
            return Err(ValidationError::DanglingLink {
                node: node.name.clone(),
                dst: link.dst.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityBuilder, Field, Link, Multiplicity, Node, RecordSchema, Schema};

    fn schema() -> NodeSchemas {
        let field = |name: &str| Field::new(name, Schema::Union(vec![Schema::Null, Schema::String]));
        NodeSchemas::new(vec![
            RecordSchema::new("study", vec![field("title")]),
            RecordSchema::new("case", vec![field("submitter_id")]),
            RecordSchema::new("sample", vec![field("kind")]),
        ])
    }

    fn metadata() -> Metadata {
        let mut case = Node::new("case");
        case.links.push(Link {
            multiplicity: Multiplicity::ManyToOne,
            dst: "study".into(),
            name: "studies".into(),
        });
        Metadata {
            nodes: vec![Node::new("study"), case],
            ..Metadata::default()
        }
    }

    #[test]
    fn test_valid_entity() {
        let entity = EntityBuilder::new("case")
            .string("submitter_id", "c-1")
            .relation("s1", "study")
            .build();
        assert_eq!(validate_entity(&schema(), &metadata(), &entity), Ok(()));
    }

    #[test]
    fn test_reverse_link_accepted() {
        let entity = EntityBuilder::new("study").relation("c1", "case").build();
        assert_eq!(validate_entity(&schema(), &metadata(), &entity), Ok(()));
    }

    #[test]
    fn test_unknown_node_and_field() {
        let entity = EntityBuilder::new("aliquot").build();
        assert!(matches!(
            validate_entity(&schema(), &metadata(), &entity),
            Err(ValidationError::UnknownNode { .. })
        ));

        let entity = EntityBuilder::new("case").string("colour", "red").build();
        assert_eq!(
            validate_entity(&schema(), &metadata(), &entity),
            Err(ValidationError::UnknownField {
                node: "case".into(),
                field: "colour".into()
            })
        );
    }

    #[test]
    fn test_unlinked_relation() {
        let entity = EntityBuilder::new("case").relation("x", "sample").build();
        assert_eq!(
            validate_entity(&schema(), &metadata(), &entity),
            Err(ValidationError::UnlinkedRelation {
                node: "case".into(),
                dst_name: "sample".into()
            })
        );

        // No metadata entry for sample: relations are not checked
        let entity = EntityBuilder::new("sample").relation("x", "study").build();
        assert_eq!(validate_entity(&schema(), &metadata(), &entity), Ok(()));
    }

    #[test]
    fn test_validate_metadata() {
        assert_eq!(validate_metadata(&schema(), &metadata()), Ok(()));

        let mut bad = metadata();
        bad.nodes[1].links[0].dst = "project".into();
        assert_eq!(
            validate_metadata(&schema(), &bad),
            Err(ValidationError::DanglingLink {
                node: "case".into(),
                dst: "project".into()
            })
        );
    }
}
