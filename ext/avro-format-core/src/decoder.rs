//! Decoding Avro datums carried in a field of an incoming row

use crate::path::FieldExtractor;
use crate::reader::{load_schema_file, row_meta_for, InputField, Projection};
use crate::walker::NamedSchemas;
use crate::{AvroFormatError, KettleValue, Result, RowMeta, Variables};
use apache_avro::Schema;
use std::collections::HashMap;
use std::path::Path;

/// Where the writer schema of each datum comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// Every datum uses the default schema
    Fixed,
    /// Each row names its schema in another incoming field
    Field {
        index: usize,
        /// The field holds a path to an `.avsc` file rather than schema text
        is_path: bool,
        /// Keep parsed schemas keyed by the field's content
        cache: bool,
    },
}

#[derive(Debug)]
struct ResolvedSchema {
    schema: Schema,
    names: NamedSchemas,
}

impl ResolvedSchema {
    fn new(schema: Schema) -> Self {
        let names = NamedSchemas::collect(&schema);
        Self { schema, names }
    }
}

/// Builder for creating a configured FieldDecoder
#[derive(Debug, Default)]
pub struct FieldDecoderBuilder {
    field_index: Option<usize>,
    schema_source: Option<SchemaSource>,
    default_schema: Option<Schema>,
    fields: Vec<InputField>,
    variables: Variables,
    ignore_missing_fields: bool,
    json_encoded: bool,
}

impl FieldDecoderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the incoming field holding the binary datum
    pub fn with_field_index(mut self, index: usize) -> Self {
        self.field_index = Some(index);
        self
    }

    pub fn with_schema_source(mut self, source: SchemaSource) -> Self {
        self.schema_source = Some(source);
        self
    }

    pub fn with_default_schema(mut self, schema: Schema) -> Self {
        self.default_schema = Some(schema);
        self
    }

    pub fn with_fields(mut self, fields: Vec<InputField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_ignore_missing_fields(mut self, ignore: bool) -> Self {
        self.ignore_missing_fields = ignore;
        self
    }

    /// Datums are Avro JSON encoding rather than binary. Only binary is supported.
    pub fn with_json_encoded(mut self, json: bool) -> Self {
        self.json_encoded = json;
        self
    }

    pub fn build(self) -> Result<FieldDecoder> {
        if self.json_encoded {
            return Err(AvroFormatError::unsupported(
                "decoding JSON-encoded Avro datums",
            ));
        }
        let field_index = self.field_index.ok_or_else(|| {
            AvroFormatError::invalid_argument("no incoming field selected for decoding")
        })?;
        if self.fields.is_empty() {
            return Err(AvroFormatError::NoFieldsDefined);
        }

        let schema_source = self.schema_source.unwrap_or(SchemaSource::Fixed);
        if schema_source == SchemaSource::Fixed && self.default_schema.is_none() {
            return Err(AvroFormatError::schema(
                "a default schema is required when the schema is not read from a field",
            ));
        }

        let extractor =
            FieldExtractor::new(&self.fields, &self.variables, self.ignore_missing_fields)?;
        let decoded_meta = row_meta_for(&self.fields)?;
        let projection = Projection::new(&self.fields, &decoded_meta);

        Ok(FieldDecoder {
            field_index,
            schema_source,
            default_schema: self.default_schema.map(ResolvedSchema::new),
            extractor,
            projection,
            decoded_meta,
            variables: self.variables,
            cache: HashMap::new(),
        })
    }
}

/// Decodes one Avro binary datum per incoming row and appends the extracted fields
#[derive(Debug)]
pub struct FieldDecoder {
    field_index: usize,
    schema_source: SchemaSource,
    default_schema: Option<ResolvedSchema>,
    extractor: FieldExtractor,
    projection: Projection,
    decoded_meta: RowMeta,
    variables: Variables,
    cache: HashMap<String, ResolvedSchema>,
}

impl FieldDecoder {
    pub fn builder() -> FieldDecoderBuilder {
        FieldDecoderBuilder::new()
    }

    /// Incoming row shape followed by the decoded fields. Fails when a decoded
    /// field reuses an incoming field's name.
    pub fn output_row_meta(&self, incoming: &RowMeta) -> Result<RowMeta> {
        incoming.merged(&self.decoded_meta)
    }

    pub fn cached_schema_count(&self) -> usize {
        self.cache.len()
    }

    /// Decode the datum in `incoming` and return the output rows: the incoming
    /// values followed by the decoded ones, one row per expanded element.
    pub fn decode(&mut self, incoming: &[KettleValue]) -> Result<Vec<Vec<KettleValue>>> {
        let datum = incoming
            .get(self.field_index)
            .ok_or_else(|| {
                AvroFormatError::invalid_argument(format!(
                    "incoming row has no field at index {}",
                    self.field_index
                ))
            })?
            .as_binary()?;

        let Some(datum) = datum else {
            let mut row = incoming.to_vec();
            row.extend(std::iter::repeat(KettleValue::Null).take(self.decoded_meta.len()));
            return Ok(vec![row]);
        };

        let schema_key = self.schema_key(incoming)?;
        if let Some(key) = &schema_key {
            self.ensure_cached(key)?;
        }

        let writer = match &schema_key {
            Some(key) => self.cache.get(key),
            None => self.default_schema.as_ref(),
        }
        .ok_or_else(|| AvroFormatError::internal("schema vanished from cache"))?;

        // With both a per-row schema and a default, datums are resolved to the default
        let target = match (&schema_key, &self.default_schema) {
            (Some(_), Some(default)) => default,
            _ => writer,
        };
        let reader_schema = (!std::ptr::eq(target, writer)).then_some(&target.schema);

        let mut slice: &[u8] = &datum;
        let value = apache_avro::from_avro_datum(&writer.schema, &mut slice, reader_schema)?;

        let extracted = self.extractor.extract(&value, &target.schema, &target.names)?;
        let mut rows = Vec::with_capacity(extracted.len());
        for decoded in extracted {
            let mut row = incoming.to_vec();
            row.extend(self.projection.apply(&decoded)?);
            rows.push(row);
        }

        if let (SchemaSource::Field { cache: false, .. }, Some(key)) =
            (&self.schema_source, &schema_key)
        {
            self.cache.remove(key);
        }
        Ok(rows)
    }

    /// Per-row schema key, or `None` when the default schema applies
    fn schema_key(&self, incoming: &[KettleValue]) -> Result<Option<String>> {
        let SchemaSource::Field { index, .. } = &self.schema_source else {
            return Ok(None);
        };
        let text = incoming
            .get(*index)
            .map(|v| v.as_string(None))
            .transpose()?
            .flatten()
            .filter(|s| !s.trim().is_empty());

        match text {
            Some(text) => Ok(Some(text)),
            None if self.default_schema.is_some() => {
                tracing::warn!("schema field is empty, falling back to the default schema");
                Ok(None)
            }
            None => Err(AvroFormatError::schema(
                "schema field is empty and no default schema is configured",
            )),
        }
    }

    fn ensure_cached(&mut self, key: &str) -> Result<()> {
        if self.cache.contains_key(key) {
            return Ok(());
        }
        let is_path = matches!(self.schema_source, SchemaSource::Field { is_path: true, .. });
        let schema = if is_path {
            load_schema_file(Path::new(&self.variables.substitute(key)))?
        } else {
            Schema::parse_str(key)?
        };
        self.cache.insert(key.to_string(), ResolvedSchema::new(schema));
        Ok(())
    }
}
