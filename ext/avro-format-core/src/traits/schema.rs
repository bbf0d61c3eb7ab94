use crate::type_mapping::split_nullable;
use crate::walker::{leaf_fields, NamedSchemas};
use crate::{FieldDescriptor, Result};
use apache_avro::schema::{Name, RecordSchema};
use apache_avro::Schema;

/// Trait for schema introspection
///
/// This trait provides methods for examining and querying Avro schemas
/// without modifying them.
pub trait SchemaInspector {
    /// Flatten the schema into its leaf fields
    fn leaf_fields(&self) -> Result<Vec<FieldDescriptor>>;

    /// Get the total number of record fields (including nested)
    fn field_count(&self) -> usize;

    /// Get field schema by dotted path (e.g., "address.city")
    fn get_field_by_path(&self, path: &str) -> Option<&Schema>;

    /// Check if schema contains a specific field
    fn has_field(&self, name: &str) -> bool;

    /// Get all record field paths in the schema, parents before children
    fn all_field_paths(&self) -> Vec<String>;
}

impl SchemaInspector for Schema {
    fn leaf_fields(&self) -> Result<Vec<FieldDescriptor>> {
        leaf_fields(self)
    }

    fn field_count(&self) -> usize {
        self.all_field_paths().len()
    }

    fn get_field_by_path(&self, path: &str) -> Option<&Schema> {
        let mut current = record_of(self, self)?;
        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            let field = current.fields.iter().find(|f| f.name == part)?;
            if parts.peek().is_none() {
                return Some(&field.schema);
            }
            current = record_of(self, &field.schema)?;
        }
        None
    }

    fn has_field(&self, name: &str) -> bool {
        self.get_field_by_path(name).is_some()
    }

    fn all_field_paths(&self) -> Vec<String> {
        let names = NamedSchemas::collect(self);
        let mut paths = Vec::new();
        if let Ok((Schema::Record(record), _)) = names.resolve_nullable(self) {
            let mut stack = vec![record.name.clone()];
            collect_field_paths(&names, record, String::new(), &mut stack, &mut paths);
        }
        paths
    }
}

// Helper functions for schema inspection

/// The record behind `schema`, following the same `[null, T]` rule as the walker.
/// Unions with several non-null branches have no record.
fn record_of<'a>(root: &'a Schema, schema: &'a Schema) -> Option<&'a RecordSchema> {
    let (schema, _) = split_nullable(schema).ok()?;
    match schema {
        Schema::Record(record) => Some(record),
        Schema::Ref { name } => match find_named(root, name)? {
            Schema::Record(record) => Some(record),
            _ => None,
        },
        _ => None,
    }
}

fn find_named<'a>(schema: &'a Schema, name: &Name) -> Option<&'a Schema> {
    match schema {
        Schema::Record(record) if &record.name == name => Some(schema),
        Schema::Enum(e) if &e.name == name => Some(schema),
        Schema::Fixed(f) if &f.name == name => Some(schema),
        Schema::Record(record) => record
            .fields
            .iter()
            .find_map(|f| find_named(&f.schema, name)),
        Schema::Array(array) => find_named(&array.items, name),
        Schema::Map(map) => find_named(&map.types, name),
        Schema::Union(union) => union.variants().iter().find_map(|v| find_named(v, name)),
        _ => None,
    }
}

fn collect_field_paths(
    names: &NamedSchemas,
    record: &RecordSchema,
    prefix: String,
    stack: &mut Vec<Name>,
    paths: &mut Vec<String>,
) {
    for field in &record.fields {
        let current_path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", prefix, field.name)
        };

        paths.push(current_path.clone());

        if let Ok((Schema::Record(nested), _)) = names.resolve_nullable(&field.schema) {
            if !stack.contains(&nested.name) {
                stack.push(nested.name.clone());
                collect_field_paths(names, nested, current_path, stack, paths);
                stack.pop();
            }
        }
    }
}
