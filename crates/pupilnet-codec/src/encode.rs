use crate::error::EncodeError;
use crate::value::{Map, Value};

/// Encode a value as MessagePack.
///
/// Maps are written as MessagePack maps with string keys in insertion order;
/// binary values keep the binary family.
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    Ok(rmp_serde::to_vec(value)?)
}

/// Encode the two-element notification payload `[topic, record]`.
///
/// The remote expects a msgpack array whose first element is the topic
/// string (`notify.<subject>`) and whose second is the record map.
pub fn encode_notification(topic: &str, record: &Map) -> Result<Vec<u8>, EncodeError> {
    Ok(rmp_serde::to_vec(&(topic, record))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;

    #[test]
    fn roundtrips_through_decoder() {
        let record: Map = [
            ("subject", Value::from("recording.should_start")),
            ("session_name", Value::from("trial-1")),
            ("count", Value::from(3)),
            ("ratio", Value::from(0.25)),
            ("raw", Value::from(vec![0u8, 1, 2])),
            ("flag", Value::from(true)),
            ("none", Value::Nil),
            ("big", Value::from(u64::MAX)),
            ("neg", Value::from(i64::MIN)),
        ]
        .into_iter()
        .collect();
        let value = Value::Map(record);

        let bytes = encode(&value).unwrap();
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn small_map_uses_fixmap_and_fixstr() {
        let record: Map = [("a", 1)].into_iter().collect();
        let bytes = encode(&Value::Map(record)).unwrap();
        assert_eq!(bytes, vec![0x81, 0xa1, b'a', 0x01]);
    }

    #[test]
    fn binary_stays_binary() {
        let bytes = encode(&Value::from(b"ab".as_slice())).unwrap();
        assert_eq!(bytes, vec![0xc4, 0x02, b'a', b'b']);
    }

    #[test]
    fn notification_is_topic_then_record() {
        let record: Map = [("subject", "calibration.should_start")]
            .into_iter()
            .collect();
        let bytes = encode_notification("notify.calibration.should_start", &record).unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(
            decoded.at(0).and_then(Value::as_str),
            Some("notify.calibration.should_start")
        );
        assert_eq!(
            decoded
                .at(1)
                .and_then(|r| r.get("subject"))
                .and_then(Value::as_str),
            Some("calibration.should_start")
        );
        assert_eq!(decoded.as_array().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn out_of_range_integer_is_an_error() {
        let value = Value::Integer(i128::from(u64::MAX) + 1);
        assert!(matches!(encode(&value), Err(EncodeError::Encode(_))));
    }
}
