use crate::{AvroFormatError, Result};
use bytes::Bytes;
use jiff::{civil, tz::TimeZone, Timestamp};
use num::{BigInt, Integer, Signed, ToPrimitive, Zero};
use ordered_float::OrderedFloat;
use std::net::IpAddr;
use std::sync::Arc;

/// Mask used when a date has to be rendered or parsed and the field has no mask of its own
pub const DEFAULT_DATE_MASK: &str = "%Y/%m/%d %H:%M:%S%.3f";

/// A single value in a host row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KettleValue {
    Null,
    String(Arc<str>),
    Integer(i64),
    Number(OrderedFloat<f64>),
    BigNumber(BigDecimal),
    Timestamp(Timestamp),
    Date(Timestamp),
    Binary(Bytes),
    Boolean(bool),
    Inet(IpAddr),
}

impl KettleValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, KettleValue::Null)
    }

    /// Get the type name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            KettleValue::Null => "Null",
            KettleValue::String(_) => "String",
            KettleValue::Integer(_) => "Integer",
            KettleValue::Number(_) => "Number",
            KettleValue::BigNumber(_) => "BigNumber",
            KettleValue::Timestamp(_) => "Timestamp",
            KettleValue::Date(_) => "Date",
            KettleValue::Binary(_) => "Binary",
            KettleValue::Boolean(_) => "Boolean",
            KettleValue::Inet(_) => "Inet",
        }
    }

    pub fn string<S: AsRef<str>>(s: S) -> Self {
        KettleValue::String(Arc::from(s.as_ref()))
    }

    pub fn number(v: f64) -> Self {
        KettleValue::Number(OrderedFloat(v))
    }

    /// Render the value as a string. Dates use `mask` or [`DEFAULT_DATE_MASK`].
    pub fn as_string(&self, mask: Option<&str>) -> Result<Option<String>> {
        Ok(Some(match self {
            KettleValue::Null => return Ok(None),
            KettleValue::String(s) => s.to_string(),
            KettleValue::Integer(i) => i.to_string(),
            KettleValue::Number(n) => n.0.to_string(),
            KettleValue::BigNumber(d) => d.to_string(),
            KettleValue::Timestamp(ts) | KettleValue::Date(ts) => format_timestamp(*ts, mask)?,
            KettleValue::Binary(b) => String::from_utf8_lossy(b).into_owned(),
            KettleValue::Boolean(b) => if *b { "Y" } else { "N" }.to_string(),
            KettleValue::Inet(ip) => ip.to_string(),
        }))
    }

    pub fn as_integer(&self) -> Result<Option<i64>> {
        Ok(Some(match self {
            KettleValue::Null => return Ok(None),
            KettleValue::String(s) => parse_integer(s)?,
            KettleValue::Integer(i) => *i,
            KettleValue::Number(n) => f64_to_i64(n.0.round())?,
            KettleValue::BigNumber(d) => d.to_i64()?,
            KettleValue::Timestamp(ts) | KettleValue::Date(ts) => ts.as_millisecond(),
            KettleValue::Binary(b) => parse_integer(&String::from_utf8_lossy(b))?,
            KettleValue::Boolean(b) => i64::from(*b),
            KettleValue::Inet(ip) => {
                return Err(AvroFormatError::conversion(format!(
                    "Cannot convert Inet {} to Integer",
                    ip
                )))
            }
        }))
    }

    pub fn as_number(&self) -> Result<Option<f64>> {
        Ok(Some(match self {
            KettleValue::Null => return Ok(None),
            KettleValue::String(s) => s.trim().parse::<f64>()?,
            KettleValue::Integer(i) => *i as f64,
            KettleValue::Number(n) => n.0,
            KettleValue::BigNumber(d) => d.to_f64()?,
            KettleValue::Timestamp(ts) | KettleValue::Date(ts) => ts.as_millisecond() as f64,
            KettleValue::Binary(b) => String::from_utf8_lossy(b).trim().parse::<f64>()?,
            KettleValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            KettleValue::Inet(ip) => {
                return Err(AvroFormatError::conversion(format!(
                    "Cannot convert Inet {} to Number",
                    ip
                )))
            }
        }))
    }

    pub fn as_big_number(&self) -> Result<Option<BigDecimal>> {
        Ok(Some(match self {
            KettleValue::Null => return Ok(None),
            KettleValue::String(s) => BigDecimal::parse(s)?,
            KettleValue::Integer(i) => BigDecimal::from_i64(*i),
            KettleValue::Number(n) => BigDecimal::from_f64(n.0)?,
            KettleValue::BigNumber(d) => d.clone(),
            KettleValue::Timestamp(ts) | KettleValue::Date(ts) => {
                BigDecimal::from_i64(ts.as_millisecond())
            }
            KettleValue::Binary(b) => BigDecimal::parse(&String::from_utf8_lossy(b))?,
            KettleValue::Boolean(b) => BigDecimal::from_i64(i64::from(*b)),
            KettleValue::Inet(ip) => {
                return Err(AvroFormatError::conversion(format!(
                    "Cannot convert Inet {} to BigNumber",
                    ip
                )))
            }
        }))
    }

    pub fn as_boolean(&self) -> Result<Option<bool>> {
        Ok(Some(match self {
            KettleValue::Null => return Ok(None),
            KettleValue::String(s) => string_to_boolean(s),
            KettleValue::Integer(i) => *i != 0,
            KettleValue::Number(n) => n.0 != 0.0,
            KettleValue::BigNumber(d) => !d.unscaled().is_zero(),
            KettleValue::Boolean(b) => *b,
            KettleValue::Binary(b) => string_to_boolean(&String::from_utf8_lossy(b)),
            other => {
                return Err(AvroFormatError::conversion(format!(
                    "Cannot convert {} to Boolean",
                    other.type_name()
                )))
            }
        }))
    }

    pub fn as_binary(&self) -> Result<Option<Bytes>> {
        match self {
            KettleValue::Null => Ok(None),
            KettleValue::Binary(b) => Ok(Some(b.clone())),
            other => Ok(other.as_string(None)?.map(Bytes::from)),
        }
    }

    /// Interpret the value as a point in time. Strings are parsed with `mask`.
    pub fn as_timestamp(&self, mask: Option<&str>) -> Result<Option<Timestamp>> {
        Ok(Some(match self {
            KettleValue::Null => return Ok(None),
            KettleValue::Timestamp(ts) | KettleValue::Date(ts) => *ts,
            KettleValue::Integer(i) => Timestamp::from_millisecond(*i)?,
            KettleValue::Number(n) => Timestamp::from_millisecond(f64_to_i64(n.0.trunc())?)?,
            KettleValue::BigNumber(d) => Timestamp::from_millisecond(d.to_i64()?)?,
            KettleValue::String(s) => parse_timestamp(s, mask)?,
            other => {
                return Err(AvroFormatError::conversion(format!(
                    "Cannot convert {} to Timestamp",
                    other.type_name()
                )))
            }
        }))
    }

    pub fn as_inet(&self) -> Result<Option<IpAddr>> {
        match self {
            KettleValue::Null => Ok(None),
            KettleValue::Inet(ip) => Ok(Some(*ip)),
            KettleValue::String(s) => s.trim().parse::<IpAddr>().map(Some).map_err(|e| {
                AvroFormatError::conversion(format!("Invalid IP address '{}': {}", s, e))
            }),
            other => Err(AvroFormatError::conversion(format!(
                "Cannot convert {} to Inet",
                other.type_name()
            ))),
        }
    }
}

fn parse_integer(s: &str) -> Result<i64> {
    Ok(s.trim().parse::<i64>()?)
}

fn f64_to_i64(v: f64) -> Result<i64> {
    v.to_i64()
        .ok_or_else(|| AvroFormatError::conversion(format!("{} does not fit in an Integer", v)))
}

/// Y, YES, TRUE, T and 1 are true (case-insensitive); anything else is false
pub fn string_to_boolean(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_uppercase().as_str(),
        "Y" | "YES" | "TRUE" | "T" | "1"
    )
}

/// Format a timestamp in UTC using a strftime-style mask
pub fn format_timestamp(ts: Timestamp, mask: Option<&str>) -> Result<String> {
    let zoned = ts.to_zoned(TimeZone::UTC);
    match mask {
        None | Some(DEFAULT_DATE_MASK) => Ok(format!(
            "{:04}/{:02}/{:02} {:02}:{:02}:{:02}.{:03}",
            zoned.year(),
            zoned.month(),
            zoned.day(),
            zoned.hour(),
            zoned.minute(),
            zoned.second(),
            zoned.millisecond()
        )),
        Some(mask) => Ok(jiff::fmt::strtime::format(mask, &zoned)?),
    }
}

/// Parse a string into a UTC timestamp using a strftime-style mask.
///
/// Masks without time components yield midnight.
pub fn parse_timestamp(s: &str, mask: Option<&str>) -> Result<Timestamp> {
    let s = s.trim();
    let datetime = match mask {
        None | Some(DEFAULT_DATE_MASK) => {
            let iso = s.replacen('/', "-", 2).replacen(' ', "T", 1);
            iso.parse::<civil::DateTime>()?
        }
        Some(mask) => {
            let parsed = jiff::fmt::strtime::parse(mask, s)?;
            let date = parsed.to_date()?;
            let time = parsed.to_time().unwrap_or(civil::Time::midnight());
            date.to_datetime(time)
        }
    };
    Ok(datetime.to_zoned(TimeZone::UTC)?.timestamp())
}

/// Arbitrary precision decimal: `unscaled * 10^-scale`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigDecimal {
    unscaled: BigInt,
    scale: u32,
}

impl BigDecimal {
    pub fn new(unscaled: BigInt, scale: u32) -> Self {
        Self { unscaled, scale }
    }

    pub fn from_i64(v: i64) -> Self {
        Self::new(BigInt::from(v), 0)
    }

    /// Exact decimal rendering of the shortest representation of `v`
    pub fn from_f64(v: f64) -> Result<Self> {
        if !v.is_finite() {
            return Err(AvroFormatError::conversion(format!(
                "Cannot convert {} to BigNumber",
                v
            )));
        }
        Self::parse(&v.to_string())
    }

    /// Parse plain decimal notation such as `-12.340`
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

        let valid = !(int_part.is_empty() && frac_part.is_empty())
            && int_part.bytes().all(|b| b.is_ascii_digit())
            && frac_part.bytes().all(|b| b.is_ascii_digit());
        if !valid {
            return Err(AvroFormatError::conversion(format!(
                "Invalid decimal value '{}'",
                s
            )));
        }

        let combined = format!("{}{}", int_part, frac_part);
        let mut unscaled = if combined.is_empty() {
            BigInt::zero()
        } else {
            combined
                .parse::<BigInt>()
                .map_err(|e| AvroFormatError::conversion(format!("Invalid decimal '{}': {}", s, e)))?
        };
        if negative {
            unscaled = -unscaled;
        }
        Ok(Self::new(unscaled, frac_part.len() as u32))
    }

    pub fn unscaled(&self) -> &BigInt {
        &self.unscaled
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Change the scale, rounding half away from zero when digits are dropped
    pub fn rescale(&self, new_scale: u32) -> Self {
        if new_scale >= self.scale {
            let factor = pow10(new_scale - self.scale);
            return Self::new(&self.unscaled * factor, new_scale);
        }

        let divisor = pow10(self.scale - new_scale);
        let (mut quotient, remainder) = self.unscaled.div_rem(&divisor);
        if remainder.abs() * 2 >= divisor {
            quotient += self.unscaled.signum();
        }
        Self::new(quotient, new_scale)
    }

    /// Integral part, truncated toward zero
    pub fn to_i64(&self) -> Result<i64> {
        let truncated = &self.unscaled / pow10(self.scale);
        truncated
            .to_i64()
            .ok_or_else(|| AvroFormatError::conversion(format!("{} does not fit in an Integer", self)))
    }

    pub fn to_f64(&self) -> Result<f64> {
        Ok(self.to_string().parse::<f64>()?)
    }

    /// Two's-complement big-endian bytes of the unscaled value, as Avro stores decimals
    pub fn to_be_bytes(&self) -> Vec<u8> {
        self.unscaled.to_signed_bytes_be()
    }

    pub fn from_be_bytes(bytes: &[u8], scale: u32) -> Self {
        Self::new(BigInt::from_signed_bytes_be(bytes), scale)
    }
}

fn pow10(exp: u32) -> BigInt {
    num::pow(BigInt::from(10), exp as usize)
}

impl std::fmt::Display for BigDecimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self.unscaled.abs().to_string();
        let sign = if self.unscaled.is_negative() { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}
