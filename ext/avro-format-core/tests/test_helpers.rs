#![allow(dead_code)]

use avro_format_core::value::parse_timestamp;
use avro_format_core::*;
use bytes::Bytes;
use std::path::Path;

/// (avro name, host name, avro type, host type, precision, scale)
pub type FieldSpec = (&'static str, &'static str, AvroType, ValueType, u32, u32);

/// Ten fields covering every host type the output format writes
pub const DEFAULT_SCHEME: [FieldSpec; 10] = [
    ("avroField1", "pentahoField1", AvroType::String, ValueType::String, 0, 0),
    ("avroField2", "pentahoField2", AvroType::String, ValueType::String, 0, 0),
    ("avroDouble3", "pentahoNumber3", AvroType::Double, ValueType::Number, 0, 0),
    ("avroDecimal4", "pentahoBigNumber4", AvroType::Decimal, ValueType::BigNumber, 2, 1),
    ("avroString5", "pentahoInet5", AvroType::String, ValueType::Inet, 0, 0),
    ("avroBoolean6", "pentahoBoolean6", AvroType::Boolean, ValueType::Boolean, 0, 0),
    ("avroInt7", "pentahoInt7", AvroType::Long, ValueType::Integer, 0, 0),
    ("avroDate8", "pentahoDate8", AvroType::Date, ValueType::Date, 0, 0),
    ("avroTimestamp9", "pentahoTimestamp9", AvroType::TimestampMillis, ValueType::Timestamp, 0, 0),
    ("avroBytes10", "pentahoBinary10", AvroType::Bytes, ValueType::Binary, 0, 0),
];

pub fn row_meta(scheme: &[FieldSpec]) -> RowMeta {
    scheme
        .iter()
        .fold(RowMeta::builder(), |builder, (_, name, _, value_type, precision, scale)| {
            builder.value_meta(
                ValueMeta::new(*name, *value_type)
                    .with_precision(*precision)
                    .with_scale(*scale),
            )
        })
        .build()
        .unwrap()
}

pub fn output_fields(scheme: &[FieldSpec], allow_null: bool) -> Vec<OutputField> {
    scheme
        .iter()
        .map(|(avro_name, name, avro_type, _, precision, scale)| {
            OutputField::new(*avro_name, *name, *avro_type)
                .with_allow_null(allow_null)
                .with_precision(*precision)
                .with_scale(*scale)
        })
        .collect()
}

pub fn input_fields(scheme: &[FieldSpec]) -> Vec<InputField> {
    scheme
        .iter()
        .map(|(avro_name, name, avro_type, value_type, _, scale)| {
            let mut field = InputField::new(format!("$.{}", avro_name), *name, *value_type)
                .with_avro_type(*avro_type);
            field.scale = Some(*scale).filter(|s| *s > 0);
            field
        })
        .collect()
}

pub fn date(s: &str) -> KettleValue {
    KettleValue::Date(parse_timestamp(s, None).unwrap())
}

pub fn timestamp(s: &str) -> KettleValue {
    KettleValue::Timestamp(parse_timestamp(s, None).unwrap())
}

/// Two rows of values matching [`DEFAULT_SCHEME`]
pub fn default_rows() -> Vec<Vec<KettleValue>> {
    vec![
        vec![
            KettleValue::string("Alex"),
            KettleValue::string("Pentaho"),
            KettleValue::number(123.0),
            KettleValue::BigNumber(BigDecimal::parse("1.5").unwrap()),
            KettleValue::Inet("192.168.1.1".parse().unwrap()),
            KettleValue::Boolean(true),
            KettleValue::Integer(1),
            date("2000/01/01 00:00:00.000"),
            timestamp("2001/11/01 20:30:15.123"),
            KettleValue::Binary(Bytes::from_static(b"foobar")),
        ],
        vec![
            KettleValue::string("Tom"),
            KettleValue::string("Hitachi"),
            KettleValue::number(-234.0),
            KettleValue::BigNumber(BigDecimal::parse("-3.3").unwrap()),
            KettleValue::Inet("10.0.0.1".parse().unwrap()),
            KettleValue::Boolean(false),
            KettleValue::Integer(-1),
            date("1999/12/31 00:00:00.000"),
            timestamp("1969/12/31 23:59:59.999"),
            KettleValue::Binary(Bytes::from_static(b"")),
        ],
    ]
}

/// Write `rows` to `path` through an OutputFormat
pub fn write_file(
    path: &Path,
    fields: Vec<OutputField>,
    meta: &RowMeta,
    rows: &[Vec<KettleValue>],
    compression: Compression,
    overwrite: bool,
) -> Result<()> {
    let format = OutputFormat::builder()
        .with_namespace("org.pentaho.test")
        .with_fields(fields)
        .with_compression(compression)
        .with_output_file(path.to_string_lossy(), overwrite)
        .build()?;
    let mut writer = format.create_record_writer(meta)?;
    writer.write_rows(rows)?;
    writer.close()?;
    Ok(())
}

/// Read every row of `path` with explicit input fields
pub fn read_file(path: &Path, fields: Vec<InputField>) -> Result<Vec<Vec<KettleValue>>> {
    let format = InputFormat::builder()
        .with_input_file(path.to_string_lossy())
        .with_input_fields(fields)
        .build()?;
    let reader = format.create_record_reader()?;
    reader.collect()
}

/// Write then read `rows` with [`DEFAULT_SCHEME`] and check nothing changed
pub fn test_roundtrip_with_options(
    rows: Vec<Vec<KettleValue>>,
    compression: Compression,
    allow_null: bool,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    use tempfile::NamedTempFile;

    let temp_file = NamedTempFile::new()?;
    let meta = row_meta(&DEFAULT_SCHEME);

    write_file(
        temp_file.path(),
        output_fields(&DEFAULT_SCHEME, allow_null),
        &meta,
        &rows,
        compression,
        true,
    )?;
    let read_rows = read_file(temp_file.path(), input_fields(&DEFAULT_SCHEME))?;

    assert_eq!(rows.len(), read_rows.len(), "Row count mismatch");
    for (i, (original, read)) in rows.iter().zip(read_rows.iter()).enumerate() {
        assert_eq!(original, read, "Row {} mismatch", i);
    }
    Ok(())
}

pub fn test_roundtrip(
    rows: Vec<Vec<KettleValue>>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    test_roundtrip_with_options(rows, Compression::Uncompressed, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_work() {
        let rows = default_rows();
        assert_eq!(rows[0].len(), DEFAULT_SCHEME.len());
        test_roundtrip(rows).unwrap();
    }
}
