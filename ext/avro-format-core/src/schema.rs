use crate::{AvroFormatError, KettleValue, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Host row value types, with the engine's stable numeric ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Number,
    String,
    Date,
    Boolean,
    Integer,
    BigNumber,
    Binary,
    Timestamp,
    Inet,
}

impl ValueType {
    pub fn id(&self) -> i32 {
        match self {
            ValueType::Number => 1,
            ValueType::String => 2,
            ValueType::Date => 3,
            ValueType::Boolean => 4,
            ValueType::Integer => 5,
            ValueType::BigNumber => 6,
            ValueType::Binary => 8,
            ValueType::Timestamp => 9,
            ValueType::Inet => 10,
        }
    }

    pub fn from_id(id: i32) -> Result<Self> {
        Ok(match id {
            1 => ValueType::Number,
            2 => ValueType::String,
            3 => ValueType::Date,
            4 => ValueType::Boolean,
            5 => ValueType::Integer,
            6 => ValueType::BigNumber,
            8 => ValueType::Binary,
            9 => ValueType::Timestamp,
            10 => ValueType::Inet,
            other => {
                return Err(AvroFormatError::unsupported_type(format!(
                    "Unknown host value type id {}",
                    other
                )))
            }
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ValueType::Number => "Number",
            ValueType::String => "String",
            ValueType::Date => "Date",
            ValueType::Boolean => "Boolean",
            ValueType::Integer => "Integer",
            ValueType::BigNumber => "BigNumber",
            ValueType::Binary => "Binary",
            ValueType::Timestamp => "Timestamp",
            ValueType::Inet => "Inet",
        }
    }

    /// Check whether a value can be stored in a column of this type as-is
    pub fn accepts(&self, value: &KettleValue) -> bool {
        matches!(
            (self, value),
            (_, KettleValue::Null)
                | (ValueType::Number, KettleValue::Number(_))
                | (ValueType::String, KettleValue::String(_))
                | (ValueType::Date, KettleValue::Date(_))
                | (ValueType::Boolean, KettleValue::Boolean(_))
                | (ValueType::Integer, KettleValue::Integer(_))
                | (ValueType::BigNumber, KettleValue::BigNumber(_))
                | (ValueType::Binary, KettleValue::Binary(_))
                | (ValueType::Timestamp, KettleValue::Timestamp(_))
                | (ValueType::Inet, KettleValue::Inet(_))
        )
    }
}

/// Shape of a single column in a host row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMeta {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default)]
    pub conversion_mask: Option<String>,
}

impl ValueMeta {
    pub fn new<S: Into<String>>(name: S, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            precision: None,
            scale: None,
            conversion_mask: None,
        }
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_conversion_mask<S: Into<String>>(mut self, mask: S) -> Self {
        self.conversion_mask = Some(mask.into());
        self
    }
}

/// Ordered, name-indexed description of a host row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowMeta {
    fields: IndexMap<String, ValueMeta>,
}

impl RowMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RowMetaBuilder {
        RowMetaBuilder::new()
    }

    /// Append a column. A column with the same name replaces the earlier one in place.
    pub fn push(&mut self, meta: ValueMeta) {
        self.fields.insert(meta.name.clone(), meta);
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    pub fn get(&self, index: usize) -> Option<&ValueMeta> {
        self.fields.get_index(index).map(|(_, meta)| meta)
    }

    pub fn find(&self, name: &str) -> Option<&ValueMeta> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValueMeta> {
        self.fields.values()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Concatenate two row shapes, as done when decoded fields follow incoming ones.
    /// Every name must stay unique so column positions line up with row values.
    pub fn merged(&self, other: &RowMeta) -> Result<RowMeta> {
        let mut merged = self.clone();
        for meta in other.iter() {
            if merged.index_of(&meta.name).is_some() {
                return Err(AvroFormatError::schema(format!(
                    "Field '{}' is already in the incoming row",
                    meta.name
                )));
            }
            merged.push(meta.clone());
        }
        Ok(merged)
    }
}

/// Builder for [`RowMeta`]
#[derive(Debug, Default)]
pub struct RowMetaBuilder {
    fields: Vec<ValueMeta>,
}

impl RowMetaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<S: Into<String>>(mut self, name: S, value_type: ValueType) -> Self {
        self.fields.push(ValueMeta::new(name, value_type));
        self
    }

    pub fn value_meta(mut self, meta: ValueMeta) -> Self {
        self.fields.push(meta);
        self
    }

    pub fn build(self) -> Result<RowMeta> {
        let mut row_meta = RowMeta::new();
        for meta in self.fields {
            if row_meta.index_of(&meta.name).is_some() {
                return Err(AvroFormatError::schema(format!(
                    "Duplicate field name '{}' in row",
                    meta.name
                )));
            }
            row_meta.push(meta);
        }
        Ok(row_meta)
    }
}

/// Avro types a field can be read as or written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvroType {
    Boolean,
    Date,
    Decimal,
    Double,
    Float,
    Integer,
    Long,
    String,
    TimestampMillis,
    TimestampMicros,
    TimestampNanos,
    TimeMillis,
    TimeMicros,
    Bytes,
    Fixed,
    Enum,
    Uuid,
    Array,
    Map,
    Record,
    Null,
}

impl AvroType {
    /// Physical Avro type name
    pub fn base_type(&self) -> &'static str {
        match self {
            AvroType::Boolean => "boolean",
            AvroType::Date | AvroType::Integer | AvroType::TimeMillis => "int",
            AvroType::Decimal | AvroType::Bytes => "bytes",
            AvroType::Double => "double",
            AvroType::Float => "float",
            AvroType::Long
            | AvroType::TimestampMillis
            | AvroType::TimestampMicros
            | AvroType::TimestampNanos
            | AvroType::TimeMicros => "long",
            AvroType::String | AvroType::Uuid => "string",
            AvroType::Fixed => "fixed",
            AvroType::Enum => "enum",
            AvroType::Array => "array",
            AvroType::Map => "map",
            AvroType::Record => "record",
            AvroType::Null => "null",
        }
    }

    /// Avro logical type annotation, if any
    pub fn logical_name(&self) -> Option<&'static str> {
        match self {
            AvroType::Date => Some("date"),
            AvroType::Decimal => Some("decimal"),
            AvroType::TimestampMillis => Some("timestamp-millis"),
            AvroType::TimestampMicros => Some("timestamp-micros"),
            AvroType::TimestampNanos => Some("timestamp-nanos"),
            AvroType::TimeMillis => Some("time-millis"),
            AvroType::TimeMicros => Some("time-micros"),
            AvroType::Uuid => Some("uuid"),
            _ => None,
        }
    }

    /// Whether values of this type can be written from a host row
    pub fn is_writable(&self) -> bool {
        !matches!(
            self,
            AvroType::Fixed
                | AvroType::Enum
                | AvroType::Uuid
                | AvroType::Array
                | AvroType::Map
                | AvroType::Record
        )
    }
}

/// Leaf field produced by walking an Avro schema
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub path: String,
    pub avro_type: AvroType,
    pub value_type: ValueType,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub default: Option<serde_json::Value>,
}

impl FieldDescriptor {
    /// Last segment of the dotted path
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}
