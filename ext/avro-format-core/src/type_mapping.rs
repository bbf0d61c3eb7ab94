//! Mapping from Avro schema types to host row value types

use crate::{AvroFormatError, AvroType, Result, ValueType};
use apache_avro::Schema;

/// Host-side view of a single Avro schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMapping {
    pub avro_type: AvroType,
    pub value_type: ValueType,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
}

impl TypeMapping {
    fn plain(avro_type: AvroType, value_type: ValueType) -> Self {
        Self {
            avro_type,
            value_type,
            precision: None,
            scale: None,
            nullable: false,
        }
    }
}

/// Split a `[null, T]` union into `T` and a nullability flag.
///
/// Non-union schemas come back unchanged. A union with a single non-null branch
/// (in either position) yields that branch; a union with only `null` yields `null`.
/// Anything with more than one non-null branch is rejected.
pub fn split_nullable(schema: &Schema) -> Result<(&Schema, bool)> {
    let Schema::Union(union) = schema else {
        return Ok((schema, false));
    };

    let mut null_branch: Option<&Schema> = None;
    let mut other: Option<&Schema> = None;
    for variant in union.variants() {
        if matches!(variant, Schema::Null) {
            null_branch = Some(variant);
        } else if other.replace(variant).is_some() {
            return Err(AvroFormatError::UnsupportedUnion(format!(
                "only unions of null and a single type are supported, got {} branches",
                union.variants().len()
            )));
        }
    }

    match (other, null_branch) {
        (Some(inner), null_branch) => Ok((inner, null_branch.is_some())),
        (None, Some(null)) => Ok((null, true)),
        (None, None) => Err(AvroFormatError::UnsupportedUnion(
            "empty union".to_string(),
        )),
    }
}

/// Map an Avro schema node to its host value type.
///
/// Named references must be resolved by the caller first.
pub fn map_schema(schema: &Schema) -> Result<TypeMapping> {
    let (schema, nullable) = split_nullable(schema)?;

    let mut mapping = match schema {
        Schema::Null => TypeMapping::plain(AvroType::Null, ValueType::String),
        Schema::Boolean => TypeMapping::plain(AvroType::Boolean, ValueType::Boolean),
        Schema::Int => TypeMapping::plain(AvroType::Integer, ValueType::Integer),
        Schema::Long => TypeMapping::plain(AvroType::Long, ValueType::Integer),
        Schema::Float => TypeMapping::plain(AvroType::Float, ValueType::Number),
        Schema::Double => TypeMapping::plain(AvroType::Double, ValueType::Number),
        Schema::Bytes => TypeMapping::plain(AvroType::Bytes, ValueType::Binary),
        Schema::String => TypeMapping::plain(AvroType::String, ValueType::String),
        Schema::Enum(_) => TypeMapping::plain(AvroType::Enum, ValueType::String),
        Schema::Uuid => TypeMapping::plain(AvroType::Uuid, ValueType::String),
        Schema::Fixed(_) | Schema::Duration => {
            TypeMapping::plain(AvroType::Fixed, ValueType::Binary)
        }
        Schema::Decimal(decimal) => TypeMapping {
            precision: Some(decimal.precision as u32),
            scale: Some(decimal.scale as u32),
            ..TypeMapping::plain(AvroType::Decimal, ValueType::BigNumber)
        },
        Schema::BigDecimal => TypeMapping::plain(AvroType::Decimal, ValueType::BigNumber),
        Schema::Date => TypeMapping::plain(AvroType::Date, ValueType::Date),
        Schema::TimeMillis => TypeMapping::plain(AvroType::TimeMillis, ValueType::Integer),
        Schema::TimeMicros => TypeMapping::plain(AvroType::TimeMicros, ValueType::Integer),
        Schema::TimestampMillis | Schema::LocalTimestampMillis => {
            TypeMapping::plain(AvroType::TimestampMillis, ValueType::Timestamp)
        }
        Schema::TimestampMicros | Schema::LocalTimestampMicros => {
            TypeMapping::plain(AvroType::TimestampMicros, ValueType::Timestamp)
        }
        Schema::TimestampNanos | Schema::LocalTimestampNanos => {
            TypeMapping::plain(AvroType::TimestampNanos, ValueType::Timestamp)
        }
        Schema::Array(_) => TypeMapping::plain(AvroType::Array, ValueType::String),
        Schema::Map(_) => TypeMapping::plain(AvroType::Map, ValueType::String),
        Schema::Record(_) => TypeMapping::plain(AvroType::Record, ValueType::String),
        Schema::Ref { name } => {
            return Err(AvroFormatError::unsupported_type(format!(
                "unresolved reference to named type {}",
                name.fullname(None)
            )))
        }
        // split_nullable never hands back a union
        other => {
            return Err(AvroFormatError::unsupported_type(format!(
                "unsupported Avro schema {:?}",
                other
            )))
        }
    };

    mapping.nullable = nullable;
    Ok(mapping)
}
