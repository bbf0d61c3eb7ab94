//! Serializable step configurations for Avro input and output

use crate::reader::{InputField, InputFormatBuilder};
use crate::writer::{Compression, OutputField, OutputFormatBuilder};
use crate::{Result, Variables};
use serde::{Deserialize, Serialize};

/// Configuration of an Avro input step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvroInputMeta {
    pub input_file: Option<String>,
    /// `.avsc` file used instead of the container's embedded schema
    pub schema_file: Option<String>,
    /// Empty means every leaf field of the schema
    pub fields: Vec<InputField>,
    pub ignore_missing_fields: bool,
}

impl AvroInputMeta {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn builder(&self, variables: Variables) -> InputFormatBuilder {
        let mut builder = InputFormatBuilder::new()
            .with_input_fields(self.fields.clone())
            .with_ignore_missing_fields(self.ignore_missing_fields)
            .with_variables(variables);
        if let Some(file) = &self.input_file {
            builder = builder.with_input_file(file.clone());
        }
        if let Some(schema) = &self.schema_file {
            builder = builder.with_schema_file(schema.clone());
        }
        builder
    }
}

/// Configuration of an Avro output step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvroOutputMeta {
    pub output_file: String,
    pub overwrite: bool,
    pub namespace: Option<String>,
    pub record_name: String,
    pub compression: Compression,
    pub fields: Vec<OutputField>,
}

impl Default for AvroOutputMeta {
    fn default() -> Self {
        Self {
            output_file: String::new(),
            overwrite: true,
            namespace: None,
            record_name: "Record".to_string(),
            compression: Compression::Uncompressed,
            fields: Vec::new(),
        }
    }
}

impl AvroOutputMeta {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn builder(&self, variables: Variables) -> OutputFormatBuilder {
        let mut builder = OutputFormatBuilder::new()
            .with_record_name(self.record_name.clone())
            .with_fields(self.fields.clone())
            .with_compression(self.compression)
            .with_output_file(self.output_file.clone(), self.overwrite)
            .with_variables(variables);
        if let Some(ns) = &self.namespace {
            builder = builder.with_namespace(ns.clone());
        }
        builder
    }
}
