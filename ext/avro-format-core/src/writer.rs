//! Writing host rows to Avro container files

use crate::conversion::kettle_to_avro;
use crate::{AvroFormatError, AvroType, KettleValue, Result, RowMeta, Variables};
use apache_avro::types::Value;
use apache_avro::{Codec, Schema};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

// Rows buffered before a block is written
const DEFAULT_BATCH_SIZE: usize = 1000;

const DEFAULT_RECORD_NAME: &str = "Record";
const DEFAULT_DECIMAL_PRECISION: u32 = 10;

/// Block compression of the container file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    Uncompressed,
    Snappy,
    Deflate,
}

impl Compression {
    fn codec(self) -> Codec {
        match self {
            Compression::Uncompressed => Codec::Null,
            Compression::Snappy => Codec::Snappy,
            Compression::Deflate => Codec::Deflate,
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = AvroFormatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "null" | "uncompressed" => Ok(Compression::Uncompressed),
            "snappy" => Ok(Compression::Snappy),
            "deflate" => Ok(Compression::Deflate),
            other => Err(AvroFormatError::invalid_argument(format!(
                "unknown compression '{}'",
                other
            ))),
        }
    }
}

/// One column of the output record: which host field feeds it and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputField {
    /// Field name in the Avro schema
    pub avro_name: String,
    /// Host field the value is taken from
    pub name: String,
    pub avro_type: AvroType,
    #[serde(default = "default_allow_null")]
    pub allow_null: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
}

fn default_allow_null() -> bool {
    true
}

impl OutputField {
    pub fn new<A: Into<String>, N: Into<String>>(avro_name: A, name: N, avro_type: AvroType) -> Self {
        Self {
            avro_name: avro_name.into(),
            name: name.into(),
            avro_type,
            allow_null: true,
            default_value: None,
            precision: None,
            scale: None,
        }
    }

    pub fn with_allow_null(mut self, allow: bool) -> Self {
        self.allow_null = allow;
        self
    }

    pub fn with_default_value<S: Into<String>>(mut self, value: S) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    fn effective_scale(&self) -> u32 {
        self.scale.unwrap_or(0)
    }

    fn effective_precision(&self) -> u32 {
        match self.precision {
            Some(p) if p > 0 => p,
            _ => DEFAULT_DECIMAL_PRECISION,
        }
    }

    /// JSON type of the field, without nullability
    fn type_json(&self) -> Result<serde_json::Value> {
        if !self.avro_type.is_writable() {
            return Err(AvroFormatError::unsupported_type(format!(
                "field '{}' cannot be written as Avro {:?}",
                self.avro_name, self.avro_type
            )));
        }
        let base = self.avro_type.base_type();
        Ok(match (self.avro_type, self.avro_type.logical_name()) {
            (AvroType::Decimal, Some(logical)) => json!({
                "type": base,
                "logicalType": logical,
                "precision": self.effective_precision(),
                "scale": self.effective_scale(),
            }),
            (_, Some(logical)) => json!({ "type": base, "logicalType": logical }),
            (_, None) => json!(base),
        })
    }

    /// JSON default for a non-nullable primitive field
    fn default_json(&self) -> Result<Option<serde_json::Value>> {
        let Some(text) = self.default_value.as_deref() else {
            return Ok(None);
        };
        let invalid = || {
            AvroFormatError::conversion(format!(
                "default value '{}' of field '{}' is not a valid {:?}",
                text, self.avro_name, self.avro_type
            ))
        };
        Ok(match self.avro_type {
            AvroType::Boolean => Some(json!(crate::value::string_to_boolean(text))),
            AvroType::Integer | AvroType::Long => {
                Some(json!(text.trim().parse::<i64>().map_err(|_| invalid())?))
            }
            AvroType::Float | AvroType::Double => {
                let v: f64 = text.trim().parse().map_err(|_| invalid())?;
                Some(serde_json::Number::from_f64(v).ok_or_else(invalid)?.into())
            }
            AvroType::String => Some(json!(text)),
            _ => None,
        })
    }

    fn field_json(&self) -> Result<serde_json::Value> {
        let type_json = self.type_json()?;
        if self.allow_null {
            return Ok(json!({
                "name": self.avro_name,
                "type": ["null", type_json],
                "default": null,
            }));
        }

        let mut field = json!({ "name": self.avro_name, "type": type_json });
        if let (Some(default), Some(obj)) = (self.default_json()?, field.as_object_mut()) {
            obj.insert("default".to_string(), default);
        }
        Ok(field)
    }
}

/// Builder for creating a configured OutputFormat
#[derive(Debug)]
pub struct OutputFormatBuilder {
    namespace: Option<String>,
    record_name: String,
    fields: Vec<OutputField>,
    compression: Compression,
    output_file: Option<(String, bool)>,
    variables: Variables,
    batch_size: usize,
}

impl Default for OutputFormatBuilder {
    fn default() -> Self {
        Self {
            namespace: None,
            record_name: DEFAULT_RECORD_NAME.to_string(),
            fields: Vec::new(),
            compression: Compression::Uncompressed,
            output_file: None,
            variables: Variables::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl OutputFormatBuilder {
    /// Create a new OutputFormatBuilder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_record_name<S: Into<String>>(mut self, name: S) -> Self {
        self.record_name = name.into();
        self
    }

    pub fn with_fields(mut self, fields: Vec<OutputField>) -> Self {
        self.fields = fields;
        self
    }

    /// Set the block compression codec
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Target file; when `overwrite` is false an existing file is an error
    pub fn with_output_file<S: Into<String>>(mut self, path: S, overwrite: bool) -> Self {
        self.output_file = Some((path.into(), overwrite));
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Number of rows written per container block
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Generate the record schema and build the OutputFormat
    pub fn build(self) -> Result<OutputFormat> {
        if self.fields.is_empty() {
            return Err(AvroFormatError::NoFieldsDefined);
        }

        let field_json = self
            .fields
            .iter()
            .map(OutputField::field_json)
            .collect::<Result<Vec<_>>>()?;

        let mut record = json!({
            "type": "record",
            "name": self.record_name,
            "fields": field_json,
        });
        if let (Some(ns), Some(obj)) = (
            self.namespace.as_deref().filter(|ns| !ns.trim().is_empty()),
            record.as_object_mut(),
        ) {
            obj.insert("namespace".to_string(), json!(ns));
        }
        let schema = Schema::parse(&record)?;
        tracing::debug!(
            record = %self.record_name,
            fields = self.fields.len(),
            "generated Avro output schema"
        );

        let output_file = self
            .output_file
            .filter(|(p, _)| !p.trim().is_empty())
            .map(|(p, overwrite)| (PathBuf::from(self.variables.substitute(&p)), overwrite));

        Ok(OutputFormat {
            schema,
            fields: self.fields,
            compression: self.compression,
            output_file,
            batch_size: self.batch_size.max(1),
        })
    }
}

/// Configured Avro output: generated schema, target and write options
#[derive(Debug)]
pub struct OutputFormat {
    schema: Schema,
    fields: Vec<OutputField>,
    compression: Compression,
    output_file: Option<(PathBuf, bool)>,
    batch_size: usize,
}

impl OutputFormat {
    pub fn builder() -> OutputFormatBuilder {
        OutputFormatBuilder::new()
    }

    /// The generated record schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn fields(&self) -> &[OutputField] {
        &self.fields
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_ref().map(|(p, _)| p.as_path())
    }

    /// Open the configured output file and start a container on it.
    /// The target is not touched unless every output field maps to a host field.
    pub fn create_record_writer(
        &self,
        row_meta: &RowMeta,
    ) -> Result<RecordWriter<'_, BufWriter<File>>> {
        let (path, overwrite) = self.output_file.as_ref().ok_or_else(|| {
            AvroFormatError::invalid_argument("no output file configured")
        })?;
        let columns = self.columns(row_meta)?;

        let file = if *overwrite {
            File::create(path)?
        } else {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .map_err(|e| match e.kind() {
                    ErrorKind::AlreadyExists => AvroFormatError::FileExists(path.clone()),
                    _ => AvroFormatError::Io(e),
                })?
        };
        tracing::debug!(path = %path.display(), "opened Avro output file");
        Ok(self.start(BufWriter::new(file), columns))
    }

    /// Start a container on any writer
    pub fn create_record_writer_to<W: Write>(
        &self,
        sink: W,
        row_meta: &RowMeta,
    ) -> Result<RecordWriter<'_, W>> {
        let columns = self.columns(row_meta)?;
        Ok(self.start(sink, columns))
    }

    /// Resolve each output field to its position in the incoming row
    fn columns(&self, row_meta: &RowMeta) -> Result<Vec<Column<'_>>> {
        self.fields
            .iter()
            .map(|field| {
                let index = row_meta.index_of(&field.name).ok_or_else(|| {
                    AvroFormatError::schema(format!(
                        "host field '{}' for Avro field '{}' is not in the incoming row",
                        field.name, field.avro_name
                    ))
                })?;
                let mask = row_meta
                    .get(index)
                    .and_then(|meta| meta.conversion_mask.clone());
                Ok(Column { field, index, mask })
            })
            .collect()
    }

    fn start<'a, W: Write>(&'a self, sink: W, columns: Vec<Column<'a>>) -> RecordWriter<'a, W> {
        RecordWriter {
            writer: apache_avro::Writer::with_codec(&self.schema, sink, self.compression.codec()),
            columns,
            buffered_rows: 0,
            batch_size: self.batch_size,
            total_rows_written: 0,
        }
    }
}

struct Column<'a> {
    field: &'a OutputField,
    index: usize,
    mask: Option<String>,
}

impl Column<'_> {
    fn avro_value(&self, row: &[KettleValue]) -> Result<Value> {
        let field = self.field;
        let value = row.get(self.index).ok_or_else(|| {
            AvroFormatError::append_write(
                &field.avro_name,
                format!("row has no value at index {}", self.index),
            )
        })?;
        let convert = |v: &KettleValue| {
            kettle_to_avro(v, field.avro_type, field.effective_scale(), self.mask.as_deref())
                .map_err(|e| AvroFormatError::append_write(&field.avro_name, e.to_string()))
        };

        if !value.is_null() {
            let converted = convert(value)?;
            return Ok(if field.allow_null {
                Value::Union(1, Box::new(converted))
            } else {
                converted
            });
        }

        if field.allow_null {
            return Ok(Value::Union(0, Box::new(Value::Null)));
        }
        match field.default_value.as_deref() {
            Some(default) => convert(&KettleValue::string(default)),
            None => Err(AvroFormatError::append_write(
                &field.avro_name,
                "null value for a field that does not allow nulls and has no default",
            )),
        }
    }
}

/// Appends host rows to an Avro container
pub struct RecordWriter<'a, W: Write> {
    writer: apache_avro::Writer<'a, W>,
    columns: Vec<Column<'a>>,
    buffered_rows: usize,
    batch_size: usize,
    total_rows_written: usize,
}

impl<W: Write> RecordWriter<'_, W> {
    /// Write a batch of rows
    pub fn write_rows(&mut self, rows: &[Vec<KettleValue>]) -> Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Convert and append one row. Either every field converts or nothing is written.
    pub fn write_row(&mut self, row: &[KettleValue]) -> Result<()> {
        let fields = self
            .columns
            .iter()
            .map(|column| Ok((column.field.avro_name.clone(), column.avro_value(row)?)))
            .collect::<Result<Vec<_>>>()?;

        self.writer.append(Value::Record(fields))?;
        self.buffered_rows += 1;
        self.total_rows_written += 1;

        if self.buffered_rows >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.total_rows_written
    }

    /// Rows appended since the last block was written
    pub fn pending_rows(&self) -> usize {
        self.buffered_rows
    }

    /// Write buffered rows out as a block
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.buffered_rows = 0;
        Ok(())
    }

    /// Flush the last block and release the target
    pub fn close(self) -> Result<W> {
        let rows = self.total_rows_written;
        let mut sink = self.writer.into_inner()?;
        sink.flush()?;
        tracing::info!(rows, "closed Avro writer");
        Ok(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueType;

    fn row_meta() -> RowMeta {
        RowMeta::builder()
            .field("id", ValueType::Integer)
            .field("name", ValueType::String)
            .field("score", ValueType::Number)
            .build()
            .unwrap()
    }

    fn fields() -> Vec<OutputField> {
        vec![
            OutputField::new("id", "id", AvroType::Long).with_allow_null(false),
            OutputField::new("name", "name", AvroType::String),
            OutputField::new("score", "score", AvroType::Double).with_scale(2),
        ]
    }

    fn read_back(bytes: &[u8]) -> Vec<Value> {
        apache_avro::Reader::new(bytes)
            .unwrap()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn test_generated_schema() {
        let format = OutputFormat::builder()
            .with_namespace("org.example")
            .with_record_name("Person")
            .with_fields(vec![
                OutputField::new("id", "id", AvroType::Long).with_allow_null(false),
                OutputField::new("amount", "amount", AvroType::Decimal).with_allow_null(false),
                OutputField::new("born", "born", AvroType::Date),
            ])
            .build()
            .unwrap();

        let json = serde_json::to_value(format.schema()).unwrap();
        assert_eq!(json["name"], "Person");
        assert_eq!(json["namespace"], "org.example");
        assert_eq!(json["fields"][0]["type"], "long");
        assert_eq!(json["fields"][1]["type"]["precision"], 10);
        assert_eq!(json["fields"][1]["type"]["scale"], 0);
        assert_eq!(json["fields"][2]["type"][0], "null");
    }

    #[test]
    fn test_non_null_default_in_schema() {
        let format = OutputFormat::builder()
            .with_fields(vec![OutputField::new("n", "n", AvroType::Integer)
                .with_allow_null(false)
                .with_default_value("7")])
            .build()
            .unwrap();
        let Schema::Record(record) = format.schema() else {
            panic!("expected a record schema");
        };
        assert_eq!(record.fields[0].default, Some(json!(7)));
    }

    #[test]
    fn test_invalid_fields_rejected() {
        assert!(matches!(
            OutputFormat::builder().build(),
            Err(AvroFormatError::NoFieldsDefined)
        ));
        assert!(matches!(
            OutputFormat::builder()
                .with_fields(vec![OutputField::new("m", "m", AvroType::Map)])
                .build(),
            Err(AvroFormatError::UnsupportedType(_))
        ));
        assert!(OutputFormat::builder()
            .with_fields(vec![OutputField::new("n", "n", AvroType::Long)
                .with_allow_null(false)
                .with_default_value("abc")])
            .build()
            .is_err());
    }

    #[test]
    fn test_write_and_read_back() {
        let format = OutputFormat::builder().with_fields(fields()).build().unwrap();
        let meta = row_meta();
        let mut writer = format.create_record_writer_to(Vec::new(), &meta).unwrap();
        writer
            .write_row(&[
                KettleValue::Integer(1),
                KettleValue::string("Ada"),
                KettleValue::number(1.987),
            ])
            .unwrap();
        writer
            .write_row(&[KettleValue::Integer(2), KettleValue::Null, KettleValue::Null])
            .unwrap();
        assert_eq!(writer.rows_written(), 2);
        let bytes = writer.close().unwrap();

        let records = read_back(&bytes);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            Value::Record(vec![
                ("id".into(), Value::Long(1)),
                ("name".into(), Value::Union(1, Box::new(Value::String("Ada".into())))),
                ("score".into(), Value::Union(1, Box::new(Value::Double(1.99)))),
            ])
        );
        assert_eq!(
            records[1],
            Value::Record(vec![
                ("id".into(), Value::Long(2)),
                ("name".into(), Value::Union(0, Box::new(Value::Null))),
                ("score".into(), Value::Union(0, Box::new(Value::Null))),
            ])
        );
    }

    #[test]
    fn test_null_without_default_fails_without_partial_row() {
        let format = OutputFormat::builder().with_fields(fields()).build().unwrap();
        let meta = row_meta();
        let mut writer = format.create_record_writer_to(Vec::new(), &meta).unwrap();
        writer
            .write_row(&[KettleValue::Integer(1), KettleValue::Null, KettleValue::Null])
            .unwrap();
        let err = writer
            .write_row(&[KettleValue::Null, KettleValue::string("x"), KettleValue::Null])
            .unwrap_err();
        assert!(matches!(err, AvroFormatError::AppendWrite { ref field, .. } if field == "id"));

        let bytes = writer.close().unwrap();
        assert_eq!(read_back(&bytes).len(), 1);
    }

    #[test]
    fn test_missing_host_field() {
        let format = OutputFormat::builder()
            .with_fields(vec![OutputField::new("x", "nope", AvroType::String)])
            .build()
            .unwrap();
        assert!(format.create_record_writer_to(Vec::new(), &row_meta()).is_err());
    }

    #[test]
    fn test_block_written_every_batch_size_rows() {
        let format = OutputFormat::builder()
            .with_fields(fields())
            .with_batch_size(3)
            .build()
            .unwrap();
        let meta = row_meta();
        let mut writer = format.create_record_writer_to(Vec::new(), &meta).unwrap();
        for i in 0..7 {
            writer
                .write_row(&[
                    KettleValue::Integer(i),
                    KettleValue::string("x"),
                    KettleValue::number(0.5),
                ])
                .unwrap();
            assert_eq!(writer.pending_rows(), (i as usize + 1) % 3);
        }
        let bytes = writer.close().unwrap();
        assert_eq!(read_back(&bytes).len(), 7);
    }

    #[test]
    fn test_sample_rows_read_back_through_input_format() {
        use crate::test_utils::test::{sample_output_fields, sample_row_meta, sample_rows};

        let format = OutputFormat::builder()
            .with_fields(sample_output_fields())
            .with_compression(Compression::Deflate)
            .build()
            .unwrap();
        let meta = sample_row_meta();
        let rows = sample_rows(5);
        let mut writer = format.create_record_writer_to(Vec::new(), &meta).unwrap();
        writer.write_rows(&rows).unwrap();
        let bytes = writer.close().unwrap();

        let input = crate::InputFormat::builder().build().unwrap();
        let read: Vec<_> = input
            .create_record_reader_from(&bytes[..])
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(read.len(), rows.len());
        for (written, read) in rows.iter().zip(&read) {
            for column in [0, 1, 2, 3, 5, 6, 7, 9] {
                assert_eq!(written[column], read[column], "column {}", column);
            }
            assert_eq!(
                written[8].as_string(None).unwrap(),
                read[8].as_string(None).unwrap()
            );
        }
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!("SNAPPY".parse::<Compression>().unwrap(), Compression::Snappy);
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::Uncompressed);
        assert!("zstd".parse::<Compression>().is_err());
    }
}
