//! Inspect a PFB file: header, node schemas, metadata and a record preview.

use std::collections::BTreeMap;

use pfb::{PfbReader, Value};

const PREVIEW: usize = 5;

fn format_value(v: &Value) -> String {
    match v {
        Value::String(s) | Value::Enum(s) => {
            let preview: String = s.chars().take(60).collect();
            if s.chars().count() > 60 {
                format!("\"{}...\"", preview)
            } else {
                format!("\"{}\"", preview)
            }
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Bytes(b) | Value::Fixed(b) => format!("BYTES[{}]", b.len()),
        other => other.to_json().to_string(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: show_file <path.avro>")?;

    println!("Reading: {}", path);
    let reader = PfbReader::open(&path)?;

    println!("\n=== Header ===");
    println!("Codec: {}", reader.codec().name());

    println!("\n=== Node schemas ({}) ===", reader.schema().len());
    for node in reader.schema().nodes() {
        let enums = node
            .fields
            .iter()
            .filter(|f| reader.is_encode(&node.name, &f.name))
            .count();
        println!("{}: {} fields ({} enum-typed)", node.name, node.fields.len(), enums);
        if !node.aliases.is_empty() {
            println!("  aliases: {}", node.aliases.join(", "));
        }
    }

    println!("\n=== Metadata ===");
    for node in &reader.metadata().nodes {
        println!(
            "{} [{}] {} links, {} annotated properties",
            node.name,
            node.ontology_reference,
            node.links.len(),
            node.properties.len()
        );
        for link in &node.links {
            println!("  -> {} ({}, {})", link.dst, link.name, link.multiplicity);
        }
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    println!("\n=== First {} records ===", PREVIEW);
    for (i, record) in reader.enumerate() {
        let record = record?;
        if i < PREVIEW {
            println!("{} {}", record.name, record.id.as_deref().unwrap_or("-"));
            for (field, value) in &record.object {
                if !value.is_null() {
                    println!("  {}: {}", field, format_value(value));
                }
            }
            for relation in &record.relations {
                println!("  => {} {}", relation.dst_name, relation.dst_id);
            }
        }
        *counts.entry(record.name).or_default() += 1;
    }

    println!("\n=== Record counts ===");
    for (name, count) in &counts {
        println!("{}: {}", name, count);
    }
    Ok(())
}
