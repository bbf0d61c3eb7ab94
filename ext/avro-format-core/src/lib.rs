//! Avro input and output formats for a row-oriented data pipeline
//!
//! `avro-format-core` reads Avro container files and binary datums into host
//! rows, and writes host rows back out as Avro container files. It wraps the
//! `apache-avro` crate with an API built around the host's row model.
//!
//! # Key Components
//!
//! - **Walker / type mapping**: discover the leaf fields of a schema
//!   - Flattened dotted paths through nested records and `[null, T]` unions
//!   - Avro logical types mapped to host value types
//!   - Schema introspection through the [`traits::SchemaInspector`] trait
//!
//! - **Input format**: container files to host rows
//!   - Row-wise iteration through [`reader::RecordReader`]
//!   - Field paths with indexes, map keys and `[*]` expansion
//!   - Optional reader schema applied through Avro schema resolution
//!
//! - **Field decoder**: binary datums carried in an incoming row field
//!   - Fixed or per-row schemas with an optional parse cache
//!
//! - **Output format**: host rows to container files
//!   - Record schema generated from configured fields
//!   - Snappy or Deflate block compression
//!   - Dynamic block sizing based on estimated row size
//!
//! - **Values**: the host's row value model with lenient coercions

pub mod config;
pub mod conversion;
pub mod decoder;
pub mod error;
pub mod logger;
pub mod path;
pub mod reader;
pub mod schema;
pub mod traits;
pub mod type_mapping;
pub mod value;
pub mod variables;
pub mod walker;
pub mod writer;

#[cfg(test)]
pub mod test_utils;

pub use config::{AvroInputMeta, AvroOutputMeta};
pub use decoder::{FieldDecoder, FieldDecoderBuilder, SchemaSource};
pub use error::{AvroFormatError, Result};
pub use path::{FieldExtractor, FieldPath};
pub use reader::{InputField, InputFormat, InputFormatBuilder, RecordReader};
pub use schema::{AvroType, FieldDescriptor, RowMeta, RowMetaBuilder, ValueMeta, ValueType};
pub use traits::SchemaInspector;
pub use type_mapping::{map_schema, TypeMapping};
pub use value::{BigDecimal, KettleValue};
pub use variables::Variables;
pub use walker::leaf_fields;
pub use writer::{Compression, OutputField, OutputFormat, OutputFormatBuilder, RecordWriter};
