//! Field paths into Avro datums (`$.a.b`, `$.list[0]`, `$.map[key]`, `$.list[*].x`)

use crate::conversion::avro_to_kettle;
use crate::reader::InputField;
use crate::type_mapping::split_nullable;
use crate::walker::NamedSchemas;
use crate::{AvroFormatError, KettleValue, Result, Variables};
use apache_avro::types::Value;
use apache_avro::Schema;

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Named field of a record
    Field(String),
    /// Array index or map key, decided by the container it is applied to
    Key(String),
    /// `[*]`: every element of an array or every entry of a map
    Expand,
}

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        let body = trimmed.strip_prefix('$').unwrap_or(trimmed);

        let mut segments = Vec::new();
        let mut rest = body;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                rest = after;
                continue;
            }
            if let Some(after) = rest.strip_prefix('[') {
                let end = after.find(']').ok_or_else(|| {
                    AvroFormatError::invalid_path(format!("unterminated '[' in {}", path))
                })?;
                let key = after[..end].trim();
                segments.push(match key {
                    "*" => Segment::Expand,
                    "" => {
                        return Err(AvroFormatError::invalid_path(format!(
                            "empty subscript in {}",
                            path
                        )))
                    }
                    key => Segment::Key(key.to_string()),
                });
                rest = &after[end + 1..];
                continue;
            }
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            segments.push(Segment::Field(rest[..end].to_string()));
            rest = &rest[end..];
        }

        if segments.is_empty() {
            return Err(AvroFormatError::invalid_path(format!(
                "path '{}' does not name a field",
                path
            )));
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn expansion_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Expand))
            .count()
    }

    /// Split around the single `[*]`: segments up to it and segments after it
    fn split_expansion(&self) -> Option<(&[Segment], &[Segment])> {
        let idx = self
            .segments
            .iter()
            .position(|s| matches!(s, Segment::Expand))?;
        Some((&self.segments[..idx], &self.segments[idx + 1..]))
    }
}

/// Replace dots inside `${...}` references with underscores
pub fn cleanse_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start + 2]);
        out.push_str(&after[..end].replace('.', "_"));
        out.push('}');
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Shared state for walking datums
#[derive(Clone, Copy)]
pub struct NavContext<'a> {
    pub names: &'a NamedSchemas,
    pub ignore_missing: bool,
}

/// Unwrap unions and named references. `None` means the value is null.
fn normalize<'v>(
    value: &'v Value,
    schema: &'v Schema,
    ctx: NavContext<'v>,
) -> Result<Option<(&'v Value, &'v Schema)>> {
    let mut schema = ctx.names.resolve(schema)?;
    let mut value = value;

    if let Value::Union(branch, inner) = value {
        if let Schema::Union(union) = schema {
            schema = union.variants().get(*branch as usize).ok_or_else(|| {
                AvroFormatError::schema(format!("union branch {} out of range", branch))
            })?;
        }
        value = inner.as_ref();
    } else if matches!(schema, Schema::Union(_)) {
        schema = split_nullable(schema)?.0;
    }
    let schema = ctx.names.resolve(schema)?;

    if matches!(value, Value::Null) {
        return Ok(None);
    }
    Ok(Some((value, schema)))
}

/// Follow `segments` from `value`. `Ok(None)` when the path runs into a null,
/// an out-of-range index or a missing map key.
pub fn navigate<'v>(
    value: &'v Value,
    schema: &'v Schema,
    segments: &[Segment],
    ctx: NavContext<'v>,
) -> Result<Option<(&'v Value, &'v Schema)>> {
    let Some((mut value, mut schema)) = normalize(value, schema, ctx)? else {
        return Ok(None);
    };

    for segment in segments {
        let next = match segment {
            Segment::Field(name) => record_field(value, schema, name, ctx)?,
            Segment::Key(key) => subscript(value, schema, key)?,
            Segment::Expand => {
                return Err(AvroFormatError::invalid_path(
                    "[*] can only be evaluated through an expansion",
                ))
            }
        };
        let Some((child, child_schema)) = next else {
            return Ok(None);
        };
        match normalize(child, child_schema, ctx)? {
            Some((v, s)) => {
                value = v;
                schema = s;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((value, schema)))
}

fn record_field<'v>(
    value: &'v Value,
    schema: &'v Schema,
    name: &str,
    ctx: NavContext<'v>,
) -> Result<Option<(&'v Value, &'v Schema)>> {
    let (Value::Record(values), Schema::Record(record)) = (value, schema) else {
        return Err(AvroFormatError::invalid_path(format!(
            "cannot access field '{}' on a non-record value",
            name
        )));
    };

    let Some(field) = record.fields.iter().find(|f| f.name == name) else {
        if ctx.ignore_missing {
            return Ok(None);
        }
        return Err(AvroFormatError::FieldNotFound(name.to_string()));
    };

    Ok(values
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| (v, &field.schema)))
}

fn subscript<'v>(
    value: &'v Value,
    schema: &'v Schema,
    key: &str,
) -> Result<Option<(&'v Value, &'v Schema)>> {
    match (value, schema) {
        (Value::Array(items), Schema::Array(array)) => {
            let index: i64 = key.parse().map_err(|_| {
                AvroFormatError::invalid_path(format!("unable to parse array index '{}'", key))
            })?;
            if index < 0 {
                return Ok(None);
            }
            Ok(items.get(index as usize).map(|item| (item, array.items.as_ref())))
        }
        (Value::Map(entries), Schema::Map(map)) => {
            Ok(entries.get(key).map(|v| (v, map.types.as_ref())))
        }
        _ => Err(AvroFormatError::invalid_path(format!(
            "subscript [{}] applied to a value that is not an array or map",
            key
        ))),
    }
}

/// Elements of the container targeted by an expansion. Map entries come back in key order.
fn expand<'v>(
    value: &'v Value,
    schema: &'v Schema,
) -> Result<Vec<(&'v Value, &'v Schema)>> {
    match (value, schema) {
        (Value::Array(items), Schema::Array(array)) => Ok(items
            .iter()
            .map(|item| (item, array.items.as_ref()))
            .collect()),
        (Value::Map(entries), Schema::Map(map)) => {
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            Ok(keys
                .into_iter()
                .filter_map(|k| entries.get(k))
                .map(|v| (v, map.types.as_ref()))
                .collect())
        }
        _ => Err(AvroFormatError::invalid_path(
            "[*] applied to a value that is not an array or map",
        )),
    }
}

#[derive(Debug)]
struct CompiledField {
    column: usize,
    segments: Vec<Segment>,
}

#[derive(Debug)]
struct ExpansionPlan {
    prefix: Vec<Segment>,
    fields: Vec<CompiledField>,
}

/// Compiled set of input fields that turns one datum into one or more rows
#[derive(Debug)]
pub struct FieldExtractor {
    fields: Vec<InputField>,
    normal: Vec<CompiledField>,
    expansion: Option<ExpansionPlan>,
    ignore_missing: bool,
}

impl FieldExtractor {
    /// Resolve variables in every path and check the expansion rules:
    /// at most one `[*]` per path, and one shared expansion prefix across paths.
    pub fn new(fields: &[InputField], variables: &Variables, ignore_missing: bool) -> Result<Self> {
        let mut normal = Vec::new();
        let mut expansion: Option<ExpansionPlan> = None;

        for (column, field) in fields.iter().enumerate() {
            let path = FieldPath::parse(&variables.substitute(&cleanse_path(&field.path)))?;

            match path.expansion_count() {
                0 => normal.push(CompiledField {
                    column,
                    segments: path.segments().to_vec(),
                }),
                1 => {
                    let (prefix, rest) = path.split_expansion().ok_or_else(|| {
                        AvroFormatError::internal("expansion segment vanished")
                    })?;
                    let compiled = CompiledField {
                        column,
                        segments: rest.to_vec(),
                    };
                    match expansion.as_mut() {
                        None => {
                            expansion = Some(ExpansionPlan {
                                prefix: prefix.to_vec(),
                                fields: vec![compiled],
                            })
                        }
                        Some(plan) if plan.prefix == prefix => plan.fields.push(compiled),
                        Some(_) => {
                            return Err(AvroFormatError::invalid_path(format!(
                                "path {} expands a different array or map than the other fields",
                                path.as_str()
                            )))
                        }
                    }
                }
                _ => {
                    return Err(AvroFormatError::invalid_path(format!(
                        "path {} contains more than one [*] expansion",
                        path.as_str()
                    )))
                }
            }
        }

        Ok(Self {
            fields: fields.to_vec(),
            normal,
            expansion,
            ignore_missing,
        })
    }

    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[InputField] {
        &self.fields
    }

    pub fn has_expansion(&self) -> bool {
        self.expansion.is_some()
    }

    /// Extract the configured fields from a datum. Rows are in field order.
    pub fn extract(
        &self,
        datum: &Value,
        schema: &Schema,
        names: &NamedSchemas,
    ) -> Result<Vec<Vec<KettleValue>>> {
        let ctx = NavContext {
            names,
            ignore_missing: self.ignore_missing,
        };

        let mut base = vec![KettleValue::Null; self.width()];
        for compiled in &self.normal {
            base[compiled.column] = self.leaf(datum, schema, compiled, ctx)?;
        }

        let Some(plan) = &self.expansion else {
            return Ok(vec![base]);
        };

        let elements = match navigate(datum, schema, &plan.prefix, ctx)? {
            Some((container, container_schema)) => expand(container, container_schema)?,
            None => Vec::new(),
        };
        if elements.is_empty() {
            return Ok(vec![base]);
        }

        let mut rows = Vec::with_capacity(elements.len());
        for (element, element_schema) in elements {
            let mut row = base.clone();
            for compiled in &plan.fields {
                row[compiled.column] = self.leaf(element, element_schema, compiled, ctx)?;
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn leaf(
        &self,
        value: &Value,
        schema: &Schema,
        compiled: &CompiledField,
        ctx: NavContext<'_>,
    ) -> Result<KettleValue> {
        match navigate(value, schema, &compiled.segments, ctx)? {
            Some((leaf, leaf_schema)) => avro_to_kettle(leaf, leaf_schema, &self.fields[compiled.column]),
            None => Ok(KettleValue::Null),
        }
    }
}
