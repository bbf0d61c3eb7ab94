//! Test utilities for avro-format-core

#[cfg(test)]
pub mod test {
    use crate::value::BigDecimal;
    use crate::{AvroType, KettleValue, OutputField, RowMeta, ValueMeta, ValueType};
    use apache_avro::types::Value;
    use apache_avro::Schema;
    use bytes::Bytes;
    use std::collections::HashMap;

    pub const PEOPLE_SCHEMA: &str = r#"{
        "type": "record",
        "name": "Person",
        "namespace": "org.example",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "name", "type": ["null", "string"], "default": null},
            {"name": "address", "type": ["null", {
                "type": "record",
                "name": "Address",
                "fields": [
                    {"name": "street", "type": "string"},
                    {"name": "city", "type": "string"}
                ]
            }], "default": null},
            {"name": "emails", "type": {"type": "array", "items": "string"}},
            {"name": "phones", "type": {"type": "map", "values": "string"}},
            {"name": "born", "type": {"type": "int", "logicalType": "date"}}
        ]
    }"#;

    pub fn people_schema() -> Schema {
        Schema::parse_str(PEOPLE_SCHEMA).unwrap()
    }

    /// Person `id` with `id` emails and two phone entries; odd ids have no address
    pub fn person(id: i64) -> Value {
        let address = if id % 2 == 0 {
            Value::Union(
                1,
                Box::new(Value::Record(vec![
                    ("street".into(), Value::String(format!("{} Main St", id))),
                    ("city".into(), Value::String("Springfield".into())),
                ])),
            )
        } else {
            Value::Union(0, Box::new(Value::Null))
        };
        let emails = (0..id)
            .map(|i| Value::String(format!("p{}-{}@example.org", id, i)))
            .collect();
        let phones: HashMap<String, Value> = [
            ("work".to_string(), Value::String(format!("555-{:04}", id))),
            ("home".to_string(), Value::String(format!("556-{:04}", id))),
        ]
        .into_iter()
        .collect();

        Value::Record(vec![
            ("id".into(), Value::Long(id)),
            (
                "name".into(),
                Value::Union(1, Box::new(Value::String(format!("person-{}", id)))),
            ),
            ("address".into(), address),
            ("emails".into(), Value::Array(emails)),
            ("phones".into(), Value::Map(phones)),
            ("born".into(), Value::Date(id as i32)),
        ])
    }

    /// Container bytes holding `count` people with ids `0..count`
    pub fn people_container(count: usize) -> Vec<u8> {
        let schema = people_schema();
        let mut writer = apache_avro::Writer::new(&schema, Vec::new());
        for id in 0..count {
            writer.append(person(id as i64)).unwrap();
        }
        writer.into_inner().unwrap()
    }

    /// Host row shape covering every writable value type
    pub fn sample_row_meta() -> RowMeta {
        RowMeta::builder()
            .field("str", ValueType::String)
            .field("int", ValueType::Integer)
            .field("num", ValueType::Number)
            .value_meta(ValueMeta::new("big", ValueType::BigNumber).with_scale(2))
            .field("date", ValueType::Date)
            .field("ts", ValueType::Timestamp)
            .field("bool", ValueType::Boolean)
            .field("bin", ValueType::Binary)
            .field("ip", ValueType::Inet)
            .field("day", ValueType::Date)
            .build()
            .unwrap()
    }

    /// Output fields matching [`sample_row_meta`]
    pub fn sample_output_fields() -> Vec<OutputField> {
        vec![
            OutputField::new("str", "str", AvroType::String),
            OutputField::new("int", "int", AvroType::Long),
            OutputField::new("num", "num", AvroType::Double),
            OutputField::new("big", "big", AvroType::Decimal)
                .with_precision(12)
                .with_scale(2),
            OutputField::new("date", "date", AvroType::TimestampMillis),
            OutputField::new("ts", "ts", AvroType::TimestampMicros),
            OutputField::new("bool", "bool", AvroType::Boolean),
            OutputField::new("bin", "bin", AvroType::Bytes),
            OutputField::new("ip", "ip", AvroType::String),
            OutputField::new("day", "day", AvroType::Date),
        ]
    }

    pub fn sample_values(i: i64) -> Vec<KettleValue> {
        let day = jiff::Timestamp::from_second(i * 86_400).unwrap();
        vec![
            KettleValue::string(format!("row {}", i)),
            KettleValue::Integer(i),
            KettleValue::number(i as f64 + 0.5),
            KettleValue::BigNumber(BigDecimal::new((i * 100 + 25).into(), 2)),
            KettleValue::Date(jiff::Timestamp::from_millisecond(i * 1000 + 123).unwrap()),
            KettleValue::Timestamp(jiff::Timestamp::from_microsecond(i * 1_000_001).unwrap()),
            KettleValue::Boolean(i % 2 == 0),
            KettleValue::Binary(Bytes::from(vec![i as u8; 4])),
            KettleValue::Inet(format!("10.0.0.{}", i % 255).parse().unwrap()),
            KettleValue::Date(day),
        ]
    }

    pub fn sample_rows(count: usize) -> Vec<Vec<KettleValue>> {
        (0..count as i64).map(sample_values).collect()
    }

    pub fn temp_file_path() -> String {
        std::env::temp_dir()
            .join(format!("avro_test_{}.avro", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    /// Compare rows, reporting the first differing cell
    pub fn assert_rows_equal(expected: &[Vec<KettleValue>], actual: &[Vec<KettleValue>]) {
        assert_eq!(expected.len(), actual.len(), "row counts differ");
        for (r, (e, a)) in expected.iter().zip(actual).enumerate() {
            assert_eq!(e.len(), a.len(), "row {} has a different width", r);
            for (c, (ev, av)) in e.iter().zip(a).enumerate() {
                assert_eq!(ev, av, "row {} column {} differs", r, c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test::*;

    #[test]
    fn test_people_container_reads_back() {
        let bytes = people_container(3);
        let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
        let records: Vec<_> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_sample_values_fit_row_meta() {
        let meta = sample_row_meta();
        let values = sample_values(3);
        assert_eq!(meta.len(), values.len());
        for (m, v) in meta.iter().zip(&values) {
            assert!(m.value_type.accepts(v), "{} rejects {:?}", m.name, v);
        }
        assert_eq!(sample_output_fields().len(), meta.len());
    }
}
