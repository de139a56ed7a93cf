//! Schema-driven datum encoding/decoding.
//!
//! Walks a [`Schema`] alongside a [`Value`], emitting or consuming the Avro
//! binary encoding. Named types referenced by name are resolved through
//! [`Names`].

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::codec::primitives::{Reader, Writer};
use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_COLLECTION_LEN, MAX_SCHEMA_DEPTH, MAX_STRING_LEN};
use crate::model::schema::{fullname, Schema};
use crate::model::Value;

/// Named types defined within a schema, by short and full name.
#[derive(Debug, Clone, Default)]
pub struct Names {
    types: FxHashMap<String, Schema>,
}

impl Names {
    /// Collects every record, enum and fixed type defined in `schema`.
    pub fn from_schema(schema: &Schema) -> Self {
        let mut names = Names::default();
        names.collect(schema, 0);
        names
    }

    fn collect(&mut self, schema: &Schema, depth: usize) {
        if depth > MAX_SCHEMA_DEPTH {
            return;
        }
        match schema {
            Schema::Record(r) => {
                self.register(&r.name, r.namespace.as_deref(), schema);
                for field in &r.fields {
                    self.collect(&field.schema, depth + 1);
                }
            }
            Schema::Enum(e) => self.register(&e.name, e.namespace.as_deref(), schema),
            Schema::Fixed(f) => self.register(&f.name, f.namespace.as_deref(), schema),
            Schema::Array(inner) | Schema::Map(inner) => self.collect(inner, depth + 1),
            Schema::Union(members) => {
                for member in members {
                    self.collect(member, depth + 1);
                }
            }
            _ => {}
        }
    }

    fn register(&mut self, name: &str, namespace: Option<&str>, schema: &Schema) {
        let full = fullname(name, namespace);
        // First definition wins
        if !self.types.contains_key(&full) {
            self.types.insert(full.clone(), schema.clone());
        }
        if full != name && !self.types.contains_key(name) {
            self.types.insert(name.to_string(), schema.clone());
        }
    }

    /// Looks up a named type.
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.types.get(name)
    }

    /// Returns the number of registered names.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no named types were found.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Decodes one datum of type `schema`.
///
/// Union values are returned as the selected branch's value.
pub fn decode_datum(
    reader: &mut Reader<'_>,
    schema: &Schema,
    names: &Names,
) -> Result<Value, DecodeError> {
    decode_at(reader, schema, names, 0)
}

fn decode_at(
    reader: &mut Reader<'_>,
    schema: &Schema,
    names: &Names,
    depth: usize,
) -> Result<Value, DecodeError> {
    if depth > MAX_SCHEMA_DEPTH {
        return Err(DecodeError::DepthExceeded {
            max: MAX_SCHEMA_DEPTH,
        });
    }
    match schema {
        Schema::Null => Ok(Value::Null),
        Schema::Boolean => Ok(Value::Boolean(reader.read_boolean("boolean")?)),
        Schema::Int => Ok(Value::Int(reader.read_int("int")?)),
        Schema::Long => Ok(Value::Long(reader.read_long("long")?)),
        Schema::Float => Ok(Value::Float(reader.read_float("float")?)),
        Schema::Double => Ok(Value::Double(reader.read_double("double")?)),
        Schema::Bytes => Ok(Value::Bytes(
            reader.read_bytes_prefixed(MAX_STRING_LEN, "bytes")?,
        )),
        Schema::String => Ok(Value::String(reader.read_string(MAX_STRING_LEN, "string")?)),
        Schema::Fixed(f) => Ok(Value::Fixed(reader.read_bytes(f.size, "fixed")?.to_vec())),
        Schema::Enum(e) => {
            let index = reader.read_long("enum index")?;
            usize::try_from(index)
                .ok()
                .and_then(|i| e.symbols.get(i))
                .map(|symbol| Value::Enum(symbol.clone()))
                .ok_or_else(|| DecodeError::EnumIndexOutOfBounds {
                    name: e.name.clone(),
                    index,
                    size: e.symbols.len(),
                })
        }
        Schema::Union(members) => {
            let (_, member) = read_branch(reader, members)?;
            decode_at(reader, member, names, depth + 1)
        }
        Schema::Array(items) => {
            let mut values = Vec::new();
            while let Some(count) = read_block_count(reader, values.len(), "array")? {
                values.reserve(count.min(reader.remaining_len()));
                for _ in 0..count {
                    values.push(decode_at(reader, items, names, depth + 1)?);
                }
            }
            Ok(Value::Array(values))
        }
        Schema::Map(values_schema) => {
            let mut entries = BTreeMap::new();
            let mut total = 0;
            while let Some(count) = read_block_count(reader, total, "map")? {
                total += count;
                for _ in 0..count {
                    let key = reader.read_string(MAX_STRING_LEN, "map key")?;
                    let value = decode_at(reader, values_schema, names, depth + 1)?;
                    entries.insert(key, value);
                }
            }
            Ok(Value::Map(entries))
        }
        Schema::Record(r) => {
            let mut fields = BTreeMap::new();
            for field in &r.fields {
                let value = decode_at(reader, &field.schema, names, depth + 1)?;
                fields.insert(field.name.clone(), value);
            }
            Ok(Value::Record(fields))
        }
        Schema::Ref(name) => {
            let resolved = names
                .get(name)
                .ok_or_else(|| DecodeError::UnresolvedName(name.clone()))?;
            decode_at(reader, resolved, names, depth + 1)
        }
    }
}

/// Decodes a record datum, keeping the selected branch of each top-level
/// union field as [`Value::Union`].
///
/// Nested unions decode as in [`decode_datum`]. Non-record schemas decode
/// exactly as [`decode_datum`] does.
pub fn decode_tagged(
    reader: &mut Reader<'_>,
    schema: &Schema,
    names: &Names,
) -> Result<Value, DecodeError> {
    let record = match schema {
        Schema::Record(r) => r,
        Schema::Ref(name) => match names.get(name) {
            Some(Schema::Record(r)) => r,
            Some(other) => return decode_at(reader, other, names, 1),
            None => return Err(DecodeError::UnresolvedName(name.clone())),
        },
        other => return decode_at(reader, other, names, 0),
    };
    let mut fields = BTreeMap::new();
    for field in &record.fields {
        let value = match &field.schema {
            Schema::Union(members) => {
                let (index, member) = read_branch(reader, members)?;
                Value::Union(index, Box::new(decode_at(reader, member, names, 2)?))
            }
            other => decode_at(reader, other, names, 1)?,
        };
        fields.insert(field.name.clone(), value);
    }
    Ok(Value::Record(fields))
}

fn read_branch<'s>(
    reader: &mut Reader<'_>,
    members: &'s [Schema],
) -> Result<(usize, &'s Schema), DecodeError> {
    let index = reader.read_long("union index")?;
    usize::try_from(index)
        .ok()
        .and_then(|i| members.get(i).map(|member| (i, member)))
        .ok_or(DecodeError::UnionIndexOutOfBounds {
            index,
            size: members.len(),
        })
}

/// Reads the item count of the next array/map block, or `None` at the
/// terminating zero block.
fn read_block_count(
    reader: &mut Reader<'_>,
    seen: usize,
    field: &'static str,
) -> Result<Option<usize>, DecodeError> {
    let count = reader.read_long(field)?;
    if count == 0 {
        return Ok(None);
    }
    if count < 0 {
        // Negative count: block byte size follows
        reader.read_long(field)?;
    }
    let count = count.unsigned_abs() as usize;
    let total = seen.saturating_add(count);
    if total > MAX_COLLECTION_LEN {
        return Err(DecodeError::LengthExceedsLimit {
            field,
            len: total,
            max: MAX_COLLECTION_LEN,
        });
    }
    Ok(Some(count))
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encodes `value` as a datum of type `schema`.
///
/// Plain values are matched against union branches (exact kind first, then
/// coercions); [`Value::Union`] forces a branch. Missing record fields fall
/// back to the field default.
pub fn encode_datum(
    writer: &mut Writer,
    schema: &Schema,
    value: &Value,
    names: &Names,
) -> Result<(), EncodeError> {
    encode_at(writer, schema, value, names, 0)
}

fn encode_at(
    writer: &mut Writer,
    schema: &Schema,
    value: &Value,
    names: &Names,
    depth: usize,
) -> Result<(), EncodeError> {
    if depth > MAX_SCHEMA_DEPTH {
        return Err(EncodeError::DepthExceeded {
            max: MAX_SCHEMA_DEPTH,
        });
    }
    match (schema, value) {
        (Schema::Ref(name), _) => {
            let resolved = names
                .get(name)
                .ok_or_else(|| EncodeError::UnresolvedName(name.clone()))?;
            encode_at(writer, resolved, value, names, depth + 1)
        }
        (Schema::Union(members), Value::Union(index, inner)) => {
            let member = members.get(*index).ok_or(EncodeError::UnionIndexOutOfBounds {
                index: *index,
                size: members.len(),
            })?;
            writer.write_long(*index as i64);
            encode_at(writer, member, inner, names, depth + 1)
        }
        (Schema::Union(members), _) => {
            let index = select_branch(members, value, names).ok_or(
                EncodeError::NoMatchingBranch {
                    found: value.type_name(),
                },
            )?;
            writer.write_long(index as i64);
            encode_at(writer, &members[index], value, names, depth + 1)
        }
        (_, Value::Union(_, inner)) => encode_at(writer, schema, inner, names, depth + 1),

        (Schema::Null, Value::Null) => Ok(()),
        (Schema::Boolean, Value::Boolean(b)) => {
            writer.write_boolean(*b);
            Ok(())
        }
        (Schema::Int, Value::Int(v)) => {
            writer.write_int(*v);
            Ok(())
        }
        (Schema::Int, Value::Long(v)) => {
            let v = i32::try_from(*v).map_err(|_| mismatch(schema, value))?;
            writer.write_int(v);
            Ok(())
        }
        (Schema::Long, Value::Int(_) | Value::Long(_)) => {
            writer.write_long(value.as_i64().unwrap_or_default());
            Ok(())
        }
        (Schema::Float, Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_)) => {
            writer.write_float(value.as_f64().unwrap_or_default() as f32);
            Ok(())
        }
        (Schema::Double, Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_)) => {
            writer.write_double(value.as_f64().unwrap_or_default());
            Ok(())
        }
        (Schema::Bytes, Value::Bytes(b) | Value::Fixed(b)) => {
            writer.write_bytes_prefixed(b);
            Ok(())
        }
        (Schema::Bytes, Value::String(s)) => {
            writer.write_bytes_prefixed(s.as_bytes());
            Ok(())
        }
        (Schema::String, Value::String(s) | Value::Enum(s)) => {
            writer.write_string(s);
            Ok(())
        }
        (Schema::Fixed(f), Value::Fixed(b) | Value::Bytes(b)) => {
            if b.len() != f.size {
                return Err(EncodeError::FixedSizeMismatch {
                    name: f.name.clone(),
                    expected: f.size,
                    actual: b.len(),
                });
            }
            writer.write_bytes(b);
            Ok(())
        }
        (Schema::Enum(e), Value::Enum(s) | Value::String(s)) => {
            let index = e.index_of(s).ok_or_else(|| EncodeError::UnknownSymbol {
                name: e.name.clone(),
                symbol: s.clone(),
            })?;
            writer.write_long(index as i64);
            Ok(())
        }
        (Schema::Array(items), Value::Array(values)) => {
            if !values.is_empty() {
                writer.write_long(values.len() as i64);
                for v in values {
                    encode_at(writer, items, v, names, depth + 1)?;
                }
            }
            writer.write_long(0);
            Ok(())
        }
        (Schema::Map(values_schema), Value::Map(entries) | Value::Record(entries)) => {
            if !entries.is_empty() {
                writer.write_long(entries.len() as i64);
                for (key, v) in entries {
                    writer.write_string(key);
                    encode_at(writer, values_schema, v, names, depth + 1)?;
                }
            }
            writer.write_long(0);
            Ok(())
        }
        (Schema::Record(r), Value::Record(fields) | Value::Map(fields)) => {
            for field in &r.fields {
                match fields.get(&field.name) {
                    Some(v) => encode_at(writer, &field.schema, v, names, depth + 1)?,
                    None => {
                        let default = field.default.as_ref().ok_or_else(|| {
                            EncodeError::MissingField {
                                record: r.name.clone(),
                                field: field.name.clone(),
                            }
                        })?;
                        encode_at(
                            writer,
                            &field.schema,
                            &Value::from_json(default),
                            names,
                            depth + 1,
                        )
                        .map_err(|_| EncodeError::InvalidDefault {
                            field: field.name.clone(),
                        })?;
                    }
                }
            }
            Ok(())
        }
        _ => Err(mismatch(schema, value)),
    }
}

fn mismatch(schema: &Schema, value: &Value) -> EncodeError {
    EncodeError::TypeMismatch {
        expected: schema.type_name(),
        found: value.type_name(),
    }
}

/// Picks the union branch for a plain value: an exact kind match wins over
/// a coercion; ties go to the earliest branch.
fn select_branch(members: &[Schema], value: &Value, names: &Names) -> Option<usize> {
    members
        .iter()
        .position(|m| branch_matches(m, value, names, true))
        .or_else(|| {
            members
                .iter()
                .position(|m| branch_matches(m, value, names, false))
        })
}

fn branch_matches(member: &Schema, value: &Value, names: &Names, exact: bool) -> bool {
    let member = match member {
        Schema::Ref(name) => match names.get(name) {
            Some(resolved) => resolved,
            None => return false,
        },
        other => other,
    };
    let exact_match = match (member, value) {
        (Schema::Null, Value::Null)
        | (Schema::Boolean, Value::Boolean(_))
        | (Schema::Int, Value::Int(_))
        | (Schema::Long, Value::Long(_))
        | (Schema::Float, Value::Float(_))
        | (Schema::Double, Value::Double(_))
        | (Schema::Bytes, Value::Bytes(_))
        | (Schema::String, Value::String(_))
        | (Schema::Array(_), Value::Array(_))
        | (Schema::Map(_), Value::Map(_)) => true,
        (Schema::Enum(e), Value::Enum(s)) => e.index_of(s).is_some(),
        (Schema::Fixed(f), Value::Fixed(b)) => b.len() == f.size,
        (Schema::Record(r), Value::Record(fields)) => {
            fields.keys().all(|k| r.field(k).is_some())
        }
        _ => false,
    };
    if exact || exact_match {
        return exact_match;
    }
    match (member, value) {
        (Schema::Int, Value::Long(v)) => i32::try_from(*v).is_ok(),
        (Schema::Long, Value::Int(_)) => true,
        (Schema::Float | Schema::Double, v) => v.as_f64().is_some(),
        (Schema::Enum(e), Value::String(s)) => e.index_of(s).is_some(),
        (Schema::String, Value::Enum(_)) => true,
        (Schema::Bytes, Value::String(_) | Value::Fixed(_)) => true,
        (Schema::Fixed(f), Value::Bytes(b)) => b.len() == f.size,
        (Schema::Record(r), Value::Map(fields)) => fields.keys().all(|k| r.field(k).is_some()),
        (Schema::Map(_), Value::Record(_)) => true,
        _ => false,
    }
}
