//! Flattening of nested Avro record schemas into leaf field descriptors

use crate::type_mapping::{map_schema, split_nullable};
use crate::{AvroFormatError, FieldDescriptor, Result};
use apache_avro::schema::{Name, RecordSchema};
use apache_avro::Schema;
use std::collections::{HashMap, HashSet};

/// Named types (records, enums, fixed) declared anywhere in a schema
#[derive(Debug, Clone, Default)]
pub struct NamedSchemas {
    by_name: HashMap<Name, Schema>,
}

impl NamedSchemas {
    /// Collect every named definition reachable from `schema`
    pub fn collect(schema: &Schema) -> Self {
        let mut names = Self::default();
        names.register(schema);
        names
    }

    fn register(&mut self, schema: &Schema) {
        match schema {
            Schema::Record(record) => {
                if self.by_name.contains_key(&record.name) {
                    return;
                }
                self.by_name.insert(record.name.clone(), schema.clone());
                for field in &record.fields {
                    self.register(&field.schema);
                }
            }
            Schema::Enum(e) => {
                self.by_name.insert(e.name.clone(), schema.clone());
            }
            Schema::Fixed(f) => {
                self.by_name.insert(f.name.clone(), schema.clone());
            }
            Schema::Array(array) => self.register(&array.items),
            Schema::Map(map) => self.register(&map.types),
            Schema::Union(union) => {
                for variant in union.variants() {
                    self.register(variant);
                }
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Follow a `Ref` to its definition; other schemas are returned as-is
    pub fn resolve<'a>(&'a self, schema: &'a Schema) -> Result<&'a Schema> {
        match schema {
            Schema::Ref { name } => self.by_name.get(name).ok_or_else(|| {
                AvroFormatError::schema(format!(
                    "reference to undefined named type {}",
                    name.fullname(None)
                ))
            }),
            other => Ok(other),
        }
    }

    /// Resolve references and strip a `[null, T]` wrapper in one step
    pub fn resolve_nullable<'a>(&'a self, schema: &'a Schema) -> Result<(&'a Schema, bool)> {
        let (inner, nullable) = split_nullable(self.resolve(schema)?)?;
        Ok((self.resolve(inner)?, nullable))
    }
}

/// Return the top-level record of a schema, unwrapping a nullable union around it
pub fn root_record<'a>(schema: &'a Schema, names: &'a NamedSchemas) -> Result<&'a RecordSchema> {
    match names.resolve_nullable(schema)?.0 {
        Schema::Record(record) => Ok(record),
        other => Err(AvroFormatError::schema(format!(
            "top-level schema must be a record, got {:?}",
            other
        ))),
    }
}

/// Produce the leaf fields of a record schema, depth-first in declaration order.
///
/// Records are descended into; every other type is a leaf. A record that is
/// already being walked (a recursive reference) is reported as a leaf too.
pub fn leaf_fields(schema: &Schema) -> Result<Vec<FieldDescriptor>> {
    let names = NamedSchemas::collect(schema);
    let root = root_record(schema, &names)?;

    let mut walker = Walker {
        names: &names,
        stack: vec![root.name.clone()],
        seen: HashSet::new(),
        out: Vec::new(),
    };
    walker.walk_record(root, "", false)?;

    tracing::debug!(
        record = %root.name.fullname(None),
        leaves = walker.out.len(),
        "walked Avro schema"
    );
    Ok(walker.out)
}

struct Walker<'a> {
    names: &'a NamedSchemas,
    stack: Vec<Name>,
    seen: HashSet<String>,
    out: Vec<FieldDescriptor>,
}

impl Walker<'_> {
    fn walk_record(&mut self, record: &RecordSchema, prefix: &str, nullable: bool) -> Result<()> {
        for field in &record.fields {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{}.{}", prefix, field.name)
            };

            let (inner, field_nullable) = self.names.resolve_nullable(&field.schema)?;
            let nullable = nullable || field_nullable;

            if let Schema::Record(nested) = inner {
                if !self.stack.contains(&nested.name) {
                    self.stack.push(nested.name.clone());
                    self.walk_record(nested, &path, nullable)?;
                    self.stack.pop();
                    continue;
                }
            }

            let mapping = map_schema(inner)?;
            if !self.seen.insert(path.clone()) {
                return Err(AvroFormatError::schema(format!(
                    "duplicate field path '{}'",
                    path
                )));
            }
            self.out.push(FieldDescriptor {
                path,
                avro_type: mapping.avro_type,
                value_type: mapping.value_type,
                precision: mapping.precision,
                scale: mapping.scale,
                nullable,
                default: field.default.clone(),
            });
        }
        Ok(())
    }
}
