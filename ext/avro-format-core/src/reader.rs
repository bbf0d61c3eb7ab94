//! Core Avro reading functionality

use crate::conversion::coerce;
use crate::path::FieldExtractor;
use crate::walker::{leaf_fields, NamedSchemas};
use crate::{
    AvroFormatError, AvroType, FieldDescriptor, KettleValue, Result, RowMeta, ValueMeta, ValueType,
    Variables,
};
use apache_avro::Schema;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// A host field read from an Avro datum by path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    /// Path into the datum, e.g. `$.address.city` or `$.emails[*]`
    pub path: String,
    /// Host field name
    pub name: String,
    /// Avro type the path was declared with, when known
    #[serde(default)]
    pub avro_type: Option<AvroType>,
    pub value_type: ValueType,
    /// Date mask used when a string has to be read as a date
    #[serde(default)]
    pub string_format: Option<String>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
}

impl InputField {
    pub fn new<P: Into<String>, N: Into<String>>(path: P, name: N, value_type: ValueType) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            avro_type: None,
            value_type,
            string_format: None,
            precision: None,
            scale: None,
        }
    }

    pub fn with_string_format<S: Into<String>>(mut self, format: S) -> Self {
        self.string_format = Some(format.into());
        self
    }

    pub fn with_avro_type(mut self, avro_type: AvroType) -> Self {
        self.avro_type = Some(avro_type);
        self
    }

    /// Shape of the host column this field produces
    pub fn value_meta(&self) -> ValueMeta {
        ValueMeta {
            name: self.name.clone(),
            value_type: self.value_type,
            precision: self.precision,
            scale: self.scale,
            conversion_mask: self.string_format.clone(),
        }
    }
}

impl From<&FieldDescriptor> for InputField {
    fn from(descriptor: &FieldDescriptor) -> Self {
        Self {
            path: format!("$.{}", descriptor.path),
            name: descriptor.path.clone(),
            avro_type: Some(descriptor.avro_type),
            value_type: descriptor.value_type,
            string_format: None,
            precision: descriptor.precision,
            scale: descriptor.scale,
        }
    }
}

/// Builder for creating a configured InputFormat
#[derive(Debug, Default)]
pub struct InputFormatBuilder {
    input_file: Option<String>,
    schema_file: Option<String>,
    input_fields: Option<Vec<InputField>>,
    output_row_meta: Option<RowMeta>,
    variables: Variables,
    ignore_missing_fields: bool,
}

impl InputFormatBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Avro container file to read. Variables are expanded at build time.
    pub fn with_input_file<S: Into<String>>(mut self, path: S) -> Self {
        self.input_file = Some(path.into());
        self
    }

    /// `.avsc` schema used to read the data and to discover default fields
    pub fn with_schema_file<S: Into<String>>(mut self, path: S) -> Self {
        self.schema_file = Some(path.into());
        self
    }

    pub fn with_input_fields(mut self, fields: Vec<InputField>) -> Self {
        self.input_fields = Some(fields);
        self
    }

    pub fn with_output_row_meta(mut self, row_meta: RowMeta) -> Self {
        self.output_row_meta = Some(row_meta);
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Read paths naming fields the schema lacks as null instead of failing
    pub fn with_ignore_missing_fields(mut self, ignore: bool) -> Self {
        self.ignore_missing_fields = ignore;
        self
    }

    /// Build the InputFormat. A configured schema file is loaded here.
    pub fn build(self) -> Result<InputFormat> {
        let input_file = self
            .input_file
            .filter(|p| !p.trim().is_empty())
            .map(|p| PathBuf::from(self.variables.substitute(&p)));
        let schema_file = self
            .schema_file
            .filter(|p| !p.trim().is_empty())
            .map(|p| PathBuf::from(self.variables.substitute(&p)));

        let reader_schema = match &schema_file {
            Some(path) => Some(load_schema_file(path)?),
            None => None,
        };

        Ok(InputFormat {
            input_file,
            reader_schema,
            input_fields: self.input_fields.filter(|fields| !fields.is_empty()),
            output_row_meta: self.output_row_meta,
            variables: self.variables,
            ignore_missing_fields: self.ignore_missing_fields,
        })
    }
}

/// Read an Avro schema from a JSON `.avsc` file
pub fn load_schema_file(path: &Path) -> Result<Schema> {
    let text =
        std::fs::read_to_string(path).map_err(|e| AvroFormatError::open_failed(path, e))?;
    let schema = Schema::parse_str(&text)?;
    tracing::debug!(path = %path.display(), "loaded Avro schema file");
    Ok(schema)
}

/// Read the writer schema from the header of an Avro container file
pub fn load_schema_from_container(path: &Path) -> Result<Schema> {
    let file = File::open(path)?;
    let reader = apache_avro::Reader::new(BufReader::new(file))?;
    tracing::debug!(path = %path.display(), "read Avro schema from container header");
    Ok(reader.writer_schema().clone())
}

/// Configured Avro input: where to read from and which fields to produce
#[derive(Debug)]
pub struct InputFormat {
    input_file: Option<PathBuf>,
    reader_schema: Option<Schema>,
    input_fields: Option<Vec<InputField>>,
    output_row_meta: Option<RowMeta>,
    variables: Variables,
    ignore_missing_fields: bool,
}

impl InputFormat {
    pub fn builder() -> InputFormatBuilder {
        InputFormatBuilder::new()
    }

    pub fn input_file(&self) -> Option<&Path> {
        self.input_file.as_deref()
    }

    /// Schema file if one is configured, otherwise the container header
    pub fn read_schema(&self) -> Result<Schema> {
        if let Some(schema) = &self.reader_schema {
            return Ok(schema.clone());
        }
        match &self.input_file {
            Some(path) => load_schema_from_container(path),
            None => Err(AvroFormatError::invalid_argument(
                "neither an input file nor a schema file is configured",
            )),
        }
    }

    /// One field per schema leaf, typed by the type mapping
    pub fn default_input_fields(&self) -> Result<Vec<InputField>> {
        default_fields_for(&self.read_schema()?)
    }

    /// Explicitly configured fields, or the schema defaults
    pub fn effective_fields(&self) -> Result<Vec<InputField>> {
        match &self.input_fields {
            Some(fields) => Ok(fields.clone()),
            None => self.default_input_fields(),
        }
    }

    /// Configured row shape, or one column per effective field
    pub fn output_row_meta(&self) -> Result<RowMeta> {
        if let Some(row_meta) = &self.output_row_meta {
            return Ok(row_meta.clone());
        }
        row_meta_for(&self.effective_fields()?)
    }

    /// Open the configured input file
    pub fn create_record_reader(&self) -> Result<RecordReader<'_, BufReader<File>>> {
        let path = self.input_file.as_ref().ok_or_else(|| {
            AvroFormatError::invalid_argument("no input file configured for reading")
        })?;
        let file = File::open(path).map_err(|e| AvroFormatError::open_failed(path, e))?;
        tracing::debug!(path = %path.display(), "opened Avro input");
        self.create_record_reader_from(BufReader::new(file))
    }

    /// Read rows from any source holding an Avro container, such as a binary blob
    pub fn create_record_reader_from<R: Read>(&self, source: R) -> Result<RecordReader<'_, R>> {
        let reader = match &self.reader_schema {
            Some(schema) => apache_avro::Reader::with_schema(schema, source)?,
            None => apache_avro::Reader::new(source)?,
        };
        let schema = reader
            .reader_schema()
            .unwrap_or_else(|| reader.writer_schema())
            .clone();

        let fields = match &self.input_fields {
            Some(fields) => fields.clone(),
            None => default_fields_for(&schema)?,
        };
        let output_meta = match &self.output_row_meta {
            Some(row_meta) => row_meta.clone(),
            None => row_meta_for(&fields)?,
        };

        RecordReader::new(
            reader,
            schema,
            &fields,
            output_meta,
            &self.variables,
            self.ignore_missing_fields,
        )
    }
}

fn default_fields_for(schema: &Schema) -> Result<Vec<InputField>> {
    let fields: Vec<InputField> = leaf_fields(schema)?.iter().map(InputField::from).collect();
    if fields.is_empty() {
        return Err(AvroFormatError::NoFieldsDefined);
    }
    Ok(fields)
}

pub(crate) fn row_meta_for(fields: &[InputField]) -> Result<RowMeta> {
    fields
        .iter()
        .fold(RowMeta::builder(), |builder, field| {
            builder.value_meta(field.value_meta())
        })
        .build()
}

/// Maps output columns onto extracted columns by name, converting types when they differ
#[derive(Debug, Clone)]
pub(crate) struct Projection {
    columns: Vec<(Option<usize>, ValueMeta)>,
}

impl Projection {
    pub(crate) fn new(fields: &[InputField], output_meta: &RowMeta) -> Self {
        let columns = output_meta
            .iter()
            .map(|meta| {
                let source = fields.iter().position(|f| f.name == meta.name);
                (source, meta.clone())
            })
            .collect();
        Self { columns }
    }

    pub(crate) fn apply(&self, extracted: &[KettleValue]) -> Result<Vec<KettleValue>> {
        self.columns
            .iter()
            .map(|(source, meta)| match source {
                Some(idx) => coerce(
                    extracted[*idx].clone(),
                    meta.value_type,
                    meta.conversion_mask.as_deref(),
                    meta.scale,
                ),
                None => Ok(KettleValue::Null),
            })
            .collect()
    }
}

/// Lazy, single-pass iterator over the rows of an Avro container
pub struct RecordReader<'a, R: Read> {
    reader: apache_avro::Reader<'a, R>,
    schema: Schema,
    names: NamedSchemas,
    extractor: FieldExtractor,
    projection: Projection,
    output_meta: RowMeta,
    pending: VecDeque<Vec<KettleValue>>,
    records_read: usize,
    finished: bool,
}

impl<'a, R: Read> RecordReader<'a, R> {
    fn new(
        reader: apache_avro::Reader<'a, R>,
        schema: Schema,
        fields: &[InputField],
        output_meta: RowMeta,
        variables: &Variables,
        ignore_missing: bool,
    ) -> Result<Self> {
        let extractor = FieldExtractor::new(fields, variables, ignore_missing)?;
        let projection = Projection::new(fields, &output_meta);
        let names = NamedSchemas::collect(&schema);

        Ok(Self {
            reader,
            schema,
            names,
            extractor,
            projection,
            output_meta,
            pending: VecDeque::new(),
            records_read: 0,
            finished: false,
        })
    }

    /// Shape of the rows this reader yields
    pub fn row_meta(&self) -> &RowMeta {
        &self.output_meta
    }

    /// Schema the datums are read with
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records_read(&self) -> usize {
        self.records_read
    }

    fn rows_for(&self, datum: &apache_avro::types::Value) -> Result<Vec<Vec<KettleValue>>> {
        self.extractor
            .extract(datum, &self.schema, &self.names)?
            .iter()
            .map(|row| self.projection.apply(row))
            .collect()
    }
}

impl<R: Read> Iterator for RecordReader<'_, R> {
    type Item = Result<Vec<KettleValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            if self.finished {
                return None;
            }

            match self.reader.next() {
                Some(Ok(datum)) => {
                    self.records_read += 1;
                    match self.rows_for(&datum) {
                        Ok(rows) => self.pending.extend(rows),
                        Err(e) => return Some(Err(e)),
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.finished = true;
                    tracing::debug!(records = self.records_read, "finished reading Avro input");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test::{people_container, people_schema};

    #[test]
    fn test_input_field_from_descriptor() {
        let descriptor = FieldDescriptor {
            path: "address.city".to_string(),
            avro_type: AvroType::String,
            value_type: ValueType::String,
            precision: None,
            scale: None,
            nullable: true,
            default: None,
        };
        let field = InputField::from(&descriptor);
        assert_eq!(field.path, "$.address.city");
        assert_eq!(field.name, "address.city");
        assert_eq!(field.avro_type, Some(AvroType::String));
    }

    #[test]
    fn test_builder_requires_a_source_to_read_schema() {
        let format = InputFormat::builder().build().unwrap();
        assert!(matches!(
            format.read_schema(),
            Err(AvroFormatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_missing_input_file_fails_at_open() {
        let format = InputFormat::builder()
            .with_input_file("/definitely/not/here.avro")
            .with_input_fields(vec![InputField::new("$.a", "a", ValueType::String)])
            .build()
            .unwrap();
        assert!(matches!(
            format.create_record_reader(),
            Err(AvroFormatError::FileNotFound(ref p)) if p == Path::new("/definitely/not/here.avro")
        ));
    }

    #[test]
    fn test_missing_schema_file_fails_at_build() {
        let result = InputFormat::builder()
            .with_schema_file("/definitely/not/here.avsc")
            .build();
        assert!(matches!(result, Err(AvroFormatError::FileNotFound(_))));
    }

    #[test]
    fn test_projection_fills_unknown_columns_with_null() {
        let fields = vec![InputField::new("$.a", "a", ValueType::Integer)];
        let meta = RowMeta::builder()
            .field("b", ValueType::String)
            .field("a", ValueType::String)
            .build()
            .unwrap();
        let projection = Projection::new(&fields, &meta);
        let row = projection.apply(&[KettleValue::Integer(5)]).unwrap();
        assert_eq!(row, vec![KettleValue::Null, KettleValue::string("5")]);
    }

    #[test]
    fn test_default_fields_read_every_leaf() {
        let bytes = people_container(3);
        let format = InputFormat::builder().build().unwrap();
        let reader = format.create_record_reader_from(&bytes[..]).unwrap();
        assert_eq!(
            reader.row_meta().field_names(),
            vec!["id", "name", "address.street", "address.city", "emails", "phones", "born"]
        );

        let rows: Vec<_> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], KettleValue::Integer(0));
        assert_eq!(rows[1][1], KettleValue::string("person-1"));
        assert!(rows[1][2].is_null());
        assert_eq!(rows[2][3], KettleValue::string("Springfield"));
        assert_eq!(rows[1][4], KettleValue::string(r#"["p1-0@example.org"]"#));
    }

    #[test]
    fn test_expansion_yields_one_row_per_element() {
        let bytes = people_container(3);
        let format = InputFormat::builder()
            .with_input_fields(vec![
                InputField::new("$.id", "id", ValueType::Integer),
                InputField::new("$.emails[*]", "email", ValueType::String),
                InputField::new("$.phones[work]", "work", ValueType::String),
            ])
            .build()
            .unwrap();
        let mut reader = format.create_record_reader_from(&bytes[..]).unwrap();
        let rows: Vec<_> = reader.by_ref().map(|r| r.unwrap()).collect();

        // id 0 has no emails and still yields one row
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![KettleValue::Integer(0), KettleValue::Null, KettleValue::string("555-0000")]);
        assert_eq!(rows[3][1], KettleValue::string("p2-1@example.org"));
        assert_eq!(reader.records_read(), 3);
    }

    #[test]
    fn test_missing_field_is_an_error_unless_ignored() {
        let bytes = people_container(1);
        let fields = vec![InputField::new("$.nickname", "nick", ValueType::String)];

        let format = InputFormat::builder()
            .with_input_fields(fields.clone())
            .build()
            .unwrap();
        let mut reader = format.create_record_reader_from(&bytes[..]).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(AvroFormatError::FieldNotFound(_)))
        ));

        let format = InputFormat::builder()
            .with_input_fields(fields)
            .with_ignore_missing_fields(true)
            .build()
            .unwrap();
        let rows: Vec<_> = format
            .create_record_reader_from(&bytes[..])
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows, vec![vec![KettleValue::Null]]);
    }

    #[test]
    fn test_default_fields_from_schema() {
        let fields = default_fields_for(&people_schema()).unwrap();
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[6].value_type, ValueType::Date);
    }
}
