use bytes::Buf;
use rmp::Marker;

use crate::error::{DecodeError, Result};
use crate::value::{Map, Value};

/// Maximum container nesting accepted by [`decode`].
pub const MAX_DEPTH: usize = 512;

/// Decode exactly one MessagePack value from `input`.
///
/// The whole input must be consumed: bytes after the first complete value
/// are rejected with [`DecodeError::TrailingBytes`]. Lengths are checked
/// against the remaining input before anything is allocated, so a corrupt
/// length prefix fails as [`DecodeError::Truncated`] instead of allocating.
pub fn decode(input: &[u8]) -> Result<Value> {
    let mut cursor = Cursor { input, pos: 0 };
    let value = cursor.read_value(0)?;
    if cursor.pos < input.len() {
        return Err(DecodeError::TrailingBytes {
            offset: cursor.pos,
            remaining: input.len() - cursor.pos,
        });
    }
    Ok(value)
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: len - remaining,
            });
        }
        let bytes = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?.get_u8())
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(self.take(2)?.get_u16())
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(self.take(4)?.get_u32())
    }

    fn read_value(&mut self, depth: usize) -> Result<Value> {
        let start = self.pos;
        let marker = Marker::from_u8(self.read_u8()?);

        let value = match marker {
            Marker::Null => Value::Nil,
            Marker::True => Value::Boolean(true),
            Marker::False => Value::Boolean(false),

            Marker::FixPos(n) => Value::Integer(n.into()),
            Marker::FixNeg(n) => Value::Integer(n.into()),
            Marker::U8 => Value::Integer(self.take(1)?.get_u8().into()),
            Marker::U16 => Value::Integer(self.take(2)?.get_u16().into()),
            Marker::U32 => Value::Integer(self.take(4)?.get_u32().into()),
            Marker::U64 => Value::Integer(self.take(8)?.get_u64().into()),
            Marker::I8 => Value::Integer(self.take(1)?.get_i8().into()),
            Marker::I16 => Value::Integer(self.take(2)?.get_i16().into()),
            Marker::I32 => Value::Integer(self.take(4)?.get_i32().into()),
            Marker::I64 => Value::Integer(self.take(8)?.get_i64().into()),

            Marker::F32 => Value::Float(self.take(4)?.get_f32().into()),
            Marker::F64 => Value::Float(self.take(8)?.get_f64()),

            Marker::FixStr(len) => self.read_str(usize::from(len), start)?,
            Marker::Str8 => {
                let len = self.read_u8()?;
                self.read_str(usize::from(len), start)?
            }
            Marker::Str16 => {
                let len = self.read_u16()?;
                self.read_str(usize::from(len), start)?
            }
            Marker::Str32 => {
                let len = self.read_u32()?;
                self.read_str(len as usize, start)?
            }

            Marker::Bin8 => {
                let len = self.read_u8()?;
                Value::Binary(self.take(usize::from(len))?.to_vec())
            }
            Marker::Bin16 => {
                let len = self.read_u16()?;
                Value::Binary(self.take(usize::from(len))?.to_vec())
            }
            Marker::Bin32 => {
                let len = self.read_u32()?;
                Value::Binary(self.take(len as usize)?.to_vec())
            }

            Marker::FixArray(len) => self.read_array(usize::from(len), start, depth)?,
            Marker::Array16 => {
                let len = self.read_u16()?;
                self.read_array(usize::from(len), start, depth)?
            }
            Marker::Array32 => {
                let len = self.read_u32()?;
                self.read_array(len as usize, start, depth)?
            }

            Marker::FixMap(len) => self.read_map(usize::from(len), start, depth)?,
            Marker::Map16 => {
                let len = self.read_u16()?;
                self.read_map(usize::from(len), start, depth)?
            }
            Marker::Map32 => {
                let len = self.read_u32()?;
                self.read_map(len as usize, start, depth)?
            }

            Marker::FixExt1
            | Marker::FixExt2
            | Marker::FixExt4
            | Marker::FixExt8
            | Marker::FixExt16 => return Err(self.unsupported_ext(start)),
            Marker::Ext8 => {
                self.take(1)?;
                return Err(self.unsupported_ext(start));
            }
            Marker::Ext16 => {
                self.take(2)?;
                return Err(self.unsupported_ext(start));
            }
            Marker::Ext32 => {
                self.take(4)?;
                return Err(self.unsupported_ext(start));
            }

            Marker::Reserved => return Err(DecodeError::ReservedMarker { offset: start }),
        };

        Ok(value)
    }

    fn read_str(&mut self, len: usize, start: usize) -> Result<Value> {
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(|s| Value::String(s.to_string()))
            .map_err(|_| DecodeError::InvalidUtf8 { offset: start })
    }

    fn read_array(&mut self, len: usize, start: usize, depth: usize) -> Result<Value> {
        self.check_container(len, 1, start, depth)?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.read_value(depth + 1)?);
        }
        Ok(Value::Array(items))
    }

    fn read_map(&mut self, len: usize, start: usize, depth: usize) -> Result<Value> {
        self.check_container(len, 2, start, depth)?;
        let mut map = Map::with_capacity(len);
        for _ in 0..len {
            let key_offset = self.pos;
            let key = match self.read_value(depth + 1)? {
                Value::String(key) => key,
                _ => return Err(DecodeError::NonStringKey { offset: key_offset }),
            };
            let value = self.read_value(depth + 1)?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    /// Every element takes at least one byte, so a declared element count
    /// larger than the remaining input is already known to be truncated.
    fn check_container(
        &self,
        len: usize,
        bytes_per_entry: usize,
        start: usize,
        depth: usize,
    ) -> Result<()> {
        if depth >= MAX_DEPTH {
            return Err(DecodeError::DepthLimit {
                offset: start,
                max: MAX_DEPTH,
            });
        }
        let min_bytes = len.saturating_mul(bytes_per_entry);
        let remaining = self.remaining();
        if min_bytes > remaining {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: min_bytes - remaining,
            });
        }
        Ok(())
    }

    fn unsupported_ext(&mut self, start: usize) -> DecodeError {
        match self.take(1) {
            Ok(mut type_byte) => DecodeError::UnsupportedExtension {
                offset: start,
                type_id: type_byte.get_i8(),
            },
            Err(err) => err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_scalars() {
        assert_eq!(decode(&[0xc0]).unwrap(), Value::Nil);
        assert_eq!(decode(&[0xc3]).unwrap(), Value::Boolean(true));
        assert_eq!(decode(&[0xc2]).unwrap(), Value::Boolean(false));
        assert_eq!(decode(&[0x7f]).unwrap(), Value::Integer(127));
        assert_eq!(decode(&[0xe0]).unwrap(), Value::Integer(-32));
        assert_eq!(decode(&[0xcc, 0xff]).unwrap(), Value::Integer(255));
        assert_eq!(decode(&[0xd0, 0x80]).unwrap(), Value::Integer(-128));
        assert_eq!(
            decode(&[0xcd, 0xc3, 0x65]).unwrap(),
            Value::Integer(50021)
        );
    }

    #[test]
    fn decodes_full_width_integers() {
        let mut u64_max = vec![0xcf];
        u64_max.extend_from_slice(&u64::MAX.to_be_bytes());
        assert_eq!(decode(&u64_max).unwrap(), Value::Integer(u64::MAX.into()));

        let mut i64_min = vec![0xd3];
        i64_min.extend_from_slice(&i64::MIN.to_be_bytes());
        assert_eq!(decode(&i64_min).unwrap(), Value::Integer(i64::MIN.into()));
    }

    #[test]
    fn decodes_floats_as_f64() {
        let mut f32_bytes = vec![0xca];
        f32_bytes.extend_from_slice(&0.5f32.to_be_bytes());
        assert_eq!(decode(&f32_bytes).unwrap(), Value::Float(0.5));

        let mut f64_bytes = vec![0xcb];
        f64_bytes.extend_from_slice(&12.34f64.to_be_bytes());
        assert_eq!(decode(&f64_bytes).unwrap(), Value::Float(12.34));
    }

    #[test]
    fn keeps_text_and_binary_apart() {
        assert_eq!(
            decode(&[0xa3, b'a', b'b', b'c']).unwrap(),
            Value::String("abc".into())
        );
        assert_eq!(
            decode(&[0xc4, 0x03, b'a', b'b', b'c']).unwrap(),
            Value::Binary(b"abc".to_vec())
        );
    }

    #[test]
    fn decodes_nested_map_in_order() {
        // {"topic": "gaze", "norm_pos": [0, 1]}
        let mut bytes = vec![0x82, 0xa5];
        bytes.extend_from_slice(b"topic");
        bytes.push(0xa4);
        bytes.extend_from_slice(b"gaze");
        bytes.push(0xa8);
        bytes.extend_from_slice(b"norm_pos");
        bytes.extend_from_slice(&[0x92, 0x00, 0x01]);

        let value = decode(&bytes).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["topic", "norm_pos"]);
        assert_eq!(value.get("topic").and_then(Value::as_str), Some("gaze"));
        assert_eq!(
            value.get("norm_pos").and_then(|p| p.at(1)).and_then(Value::as_i64),
            Some(1)
        );
    }

    #[test]
    fn duplicate_key_last_value_wins() {
        // {"a": 1, "a": 2}
        let bytes = [0x82, 0xa1, b'a', 0x01, 0xa1, b'a', 0x02];
        let value = decode(&bytes).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn large_map_decodes_in_linear_time() {
        const ENTRIES: u32 = 60_000;
        let mut bytes = vec![0xdf];
        bytes.extend_from_slice(&ENTRIES.to_be_bytes());
        for i in 0..ENTRIES {
            let key = format!("k{i:07}");
            bytes.push(0xa0 | key.len() as u8);
            bytes.extend_from_slice(key.as_bytes());
            bytes.push(0xc0);
        }

        let started = std::time::Instant::now();
        let value = decode(&bytes).unwrap();
        let elapsed = started.elapsed();

        let map = value.as_map().unwrap();
        assert_eq!(map.len(), ENTRIES as usize);
        assert_eq!(map.keys().next(), Some("k0000000"));
        assert_eq!(map.get("k0059999"), Some(&Value::Nil));
        assert!(
            elapsed < std::time::Duration::from_secs(2),
            "decoding {ENTRIES} keys took {elapsed:?}"
        );
    }

    #[test]
    fn empty_input_is_truncated() {
        assert_eq!(
            decode(&[]),
            Err(DecodeError::Truncated {
                offset: 0,
                needed: 1
            })
        );
    }

    #[test]
    fn truncated_string_reports_offset() {
        let err = decode(&[0xa5, b'a', b'b']).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { offset: 1, needed: 3 });
        assert_eq!(err.offset(), 1);
    }

    #[test]
    fn truncated_nested_value_reports_inner_offset() {
        // [1, <f64 missing 4 bytes>]
        let bytes = [0x92, 0x01, 0xcb, 0x00, 0x00, 0x00, 0x00];
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { offset: 3, needed: 4 });
    }

    #[test]
    fn huge_declared_array_fails_without_allocating() {
        let bytes = [0xdd, 0xff, 0xff, 0xff, 0xff, 0x01];
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { offset: 5, .. }));
    }

    #[test]
    fn rejects_reserved_marker() {
        assert_eq!(
            decode(&[0x91, 0xc1]),
            Err(DecodeError::ReservedMarker { offset: 1 })
        );
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert_eq!(
            decode(&[0xa2, 0xff, 0xfe]),
            Err(DecodeError::InvalidUtf8 { offset: 0 })
        );
    }

    #[test]
    fn rejects_non_string_keys() {
        assert_eq!(
            decode(&[0x81, 0x01, 0x02]),
            Err(DecodeError::NonStringKey { offset: 1 })
        );
    }

    #[test]
    fn rejects_extension_types() {
        assert_eq!(
            decode(&[0xd4, 0x05, 0x00]),
            Err(DecodeError::UnsupportedExtension {
                offset: 0,
                type_id: 5
            })
        );
        assert_eq!(
            decode(&[0xc7, 0x01, 0xff, 0x00]),
            Err(DecodeError::UnsupportedExtension {
                offset: 0,
                type_id: -1
            })
        );
    }

    #[test]
    fn rejects_trailing_bytes() {
        assert_eq!(
            decode(&[0xc0, 0xc0, 0xc0]),
            Err(DecodeError::TrailingBytes {
                offset: 1,
                remaining: 2
            })
        );
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut bytes = vec![0x91; MAX_DEPTH + 1];
        bytes.push(0xc0);
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::DepthLimit { max: MAX_DEPTH, .. })
        ));
    }
}
