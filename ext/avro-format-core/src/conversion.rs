//! Conversions between Avro values and host row values

use crate::reader::InputField;
use crate::value::{parse_timestamp, BigDecimal};
use crate::{AvroFormatError, AvroType, KettleValue, Result, ValueType};
use apache_avro::types::Value;
use apache_avro::Schema;
use bytes::Bytes;
use jiff::Timestamp;
use std::net::IpAddr;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Convert an Avro leaf value to the host type configured on `field`.
///
/// Dates and IP addresses that cannot be parsed from strings become null.
pub fn avro_to_kettle(value: &Value, schema: &Schema, field: &InputField) -> Result<KettleValue> {
    let natural = natural_value(value, schema)?;
    coerce(natural, field.value_type, field.string_format.as_deref(), field.scale)
        .map_err(|e| match e {
            AvroFormatError::Conversion(msg) => {
                AvroFormatError::conversion(format!("field {}: {}", field.path, msg))
            }
            other => other,
        })
}

/// The host value closest to an Avro value, before any target-type coercion
pub fn natural_value(value: &Value, schema: &Schema) -> Result<KettleValue> {
    Ok(match value {
        Value::Null => KettleValue::Null,
        Value::Boolean(b) => KettleValue::Boolean(*b),
        Value::Int(i) => KettleValue::Integer(i64::from(*i)),
        Value::Long(l) => KettleValue::Integer(*l),
        Value::Float(f) => KettleValue::number(f64::from(*f)),
        Value::Double(d) => KettleValue::number(*d),
        Value::Bytes(b) => KettleValue::Binary(Bytes::copy_from_slice(b)),
        Value::Fixed(_, b) => KettleValue::Binary(Bytes::copy_from_slice(b)),
        Value::String(s) => KettleValue::string(s),
        Value::Enum(_, symbol) => KettleValue::string(symbol),
        Value::Uuid(uuid) => KettleValue::string(uuid.to_string()),
        Value::Date(days) => {
            KettleValue::Date(Timestamp::from_millisecond(i64::from(*days) * MILLIS_PER_DAY)?)
        }
        Value::TimeMillis(t) => KettleValue::Integer(i64::from(*t)),
        Value::TimeMicros(t) => KettleValue::Integer(*t),
        Value::TimestampMillis(ms) | Value::LocalTimestampMillis(ms) => {
            KettleValue::Timestamp(Timestamp::from_millisecond(*ms)?)
        }
        Value::TimestampMicros(us) | Value::LocalTimestampMicros(us) => {
            KettleValue::Timestamp(Timestamp::from_microsecond(*us)?)
        }
        Value::TimestampNanos(ns) | Value::LocalTimestampNanos(ns) => {
            KettleValue::Timestamp(Timestamp::from_nanosecond(i128::from(*ns))?)
        }
        Value::Decimal(decimal) => {
            let bytes = Vec::<u8>::try_from(decimal)?;
            let scale = match schema {
                Schema::Decimal(d) => d.scale as u32,
                _ => 0,
            };
            KettleValue::BigNumber(BigDecimal::from_be_bytes(&bytes, scale))
        }
        Value::BigDecimal(decimal) => KettleValue::BigNumber(BigDecimal::parse(&decimal.to_string())?),
        Value::Union(_, inner) => natural_value(inner, schema)?,
        complex => KettleValue::String(std::sync::Arc::from(render_json(complex)?.as_str())),
    })
}

/// Render arrays, maps, records and other composite values as JSON text
pub fn render_json(value: &Value) -> Result<String> {
    let json = serde_json::Value::try_from(value.clone())?;
    Ok(serde_json::to_string(&json)?)
}

/// Coerce a host value to `target`, the way a host field of that type would read it
pub fn coerce(
    value: KettleValue,
    target: ValueType,
    mask: Option<&str>,
    scale: Option<u32>,
) -> Result<KettleValue> {
    if value.is_null() || target.accepts(&value) {
        return Ok(value);
    }

    Ok(match target {
        ValueType::String => opt(value.as_string(mask)?, |s| KettleValue::string(s)),
        ValueType::Integer => opt(value.as_integer()?, KettleValue::Integer),
        ValueType::Number => opt(value.as_number()?, KettleValue::number),
        ValueType::BigNumber => match value {
            KettleValue::Binary(bytes) => {
                KettleValue::BigNumber(BigDecimal::from_be_bytes(&bytes, scale.unwrap_or(0)))
            }
            other => opt(other.as_big_number()?, KettleValue::BigNumber),
        },
        ValueType::Boolean => opt(value.as_boolean()?, KettleValue::Boolean),
        ValueType::Binary => opt(value.as_binary()?, KettleValue::Binary),
        ValueType::Date | ValueType::Timestamp => {
            let ts = match &value {
                KettleValue::String(s) => match parse_timestamp(s, mask) {
                    Ok(ts) => Some(ts),
                    Err(e) => {
                        tracing::warn!(value = %s, error = %e, "unparseable date, using null");
                        None
                    }
                },
                other => other.as_timestamp(mask)?,
            };
            match (ts, target) {
                (None, _) => KettleValue::Null,
                (Some(ts), ValueType::Date) => KettleValue::Date(ts),
                (Some(ts), _) => KettleValue::Timestamp(ts),
            }
        }
        ValueType::Inet => match &value {
            KettleValue::String(s) => match s.trim().parse::<IpAddr>() {
                Ok(ip) => KettleValue::Inet(ip),
                Err(_) => {
                    tracing::warn!(value = %s, "not an IP address literal, using null");
                    KettleValue::Null
                }
            },
            KettleValue::Binary(b) => match b.len() {
                4 => {
                    let octets: [u8; 4] = [b[0], b[1], b[2], b[3]];
                    KettleValue::Inet(IpAddr::from(octets))
                }
                16 => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(b);
                    KettleValue::Inet(IpAddr::from(octets))
                }
                _ => KettleValue::Null,
            },
            other => opt(other.as_inet()?, KettleValue::Inet),
        },
    })
}

fn opt<T>(value: Option<T>, f: impl FnOnce(T) -> KettleValue) -> KettleValue {
    value.map(f).unwrap_or(KettleValue::Null)
}

/// Convert a non-null host value to an Avro value of type `avro_type`.
///
/// `scale` applies to decimals and rounds doubles; `mask` is used when a
/// string has to be read as a date.
pub fn kettle_to_avro(
    value: &KettleValue,
    avro_type: AvroType,
    scale: u32,
    mask: Option<&str>,
) -> Result<Value> {
    let missing = || AvroFormatError::conversion(format!("null value for {:?}", avro_type));

    Ok(match avro_type {
        AvroType::Null => Value::Null,
        AvroType::Boolean => Value::Boolean(value.as_boolean()?.ok_or_else(missing)?),
        AvroType::Integer => {
            let v = value.as_integer()?.ok_or_else(missing)?;
            Value::Int(i32::try_from(v).map_err(|_| {
                AvroFormatError::conversion(format!("{} does not fit in an Avro int", v))
            })?)
        }
        AvroType::Long => Value::Long(value.as_integer()?.ok_or_else(missing)?),
        AvroType::Float => Value::Float(value.as_number()?.ok_or_else(missing)? as f32),
        AvroType::Double => {
            let v = value.as_number()?.ok_or_else(missing)?;
            if scale > 0 && v.is_finite() {
                Value::Double(BigDecimal::from_f64(v)?.rescale(scale).to_f64()?)
            } else {
                Value::Double(v)
            }
        }
        AvroType::String => Value::String(value.as_string(mask)?.ok_or_else(missing)?),
        AvroType::Bytes => Value::Bytes(value.as_binary()?.ok_or_else(missing)?.to_vec()),
        AvroType::Decimal => {
            let decimal = value.as_big_number()?.ok_or_else(missing)?.rescale(scale);
            Value::Decimal(apache_avro::Decimal::from(decimal.to_be_bytes()))
        }
        AvroType::Date => {
            let ms = value.as_timestamp(mask)?.ok_or_else(missing)?.as_millisecond();
            let days = ms.div_euclid(MILLIS_PER_DAY);
            Value::Date(i32::try_from(days).map_err(|_| {
                AvroFormatError::conversion(format!("date {} days from epoch out of range", days))
            })?)
        }
        AvroType::TimestampMillis => {
            Value::TimestampMillis(value.as_timestamp(mask)?.ok_or_else(missing)?.as_millisecond())
        }
        AvroType::TimestampMicros => {
            Value::TimestampMicros(value.as_timestamp(mask)?.ok_or_else(missing)?.as_microsecond())
        }
        AvroType::TimestampNanos => {
            let ns = value.as_timestamp(mask)?.ok_or_else(missing)?.as_nanosecond();
            Value::TimestampNanos(i64::try_from(ns).map_err(|_| {
                AvroFormatError::conversion("timestamp out of range for nanosecond precision")
            })?)
        }
        AvroType::TimeMillis => {
            let v = value.as_integer()?.ok_or_else(missing)?;
            Value::TimeMillis(i32::try_from(v).map_err(|_| {
                AvroFormatError::conversion(format!("{} does not fit in time-millis", v))
            })?)
        }
        AvroType::TimeMicros => Value::TimeMicros(value.as_integer()?.ok_or_else(missing)?),
        other => {
            return Err(AvroFormatError::unsupported_type(format!(
                "cannot write host values as Avro {:?}",
                other
            )))
        }
    })
}
