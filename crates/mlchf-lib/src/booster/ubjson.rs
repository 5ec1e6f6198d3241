//! Universal Binary JSON reader.
//!
//! XGBoost 2.1 and later write models as UBJSON by default, using the same
//! schema as the JSON format. Values are decoded into [`serde_json::Value`] so
//! both encodings share one set of model structs.
//!
//! All multi-byte numbers are big-endian. Strongly typed containers
//! (`[$d#L<count>`) are what XGBoost emits for its numeric arrays.

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Nesting limit for containers.
const MAX_DEPTH: usize = 128;

/// True when `bytes` start like a UBJSON object rather than JSON text.
///
/// A UBJSON object key begins with an integer length marker (`i`, `U`, `I`,
/// `l`, `L`) and optimized objects with `$` or `#`; JSON continues with a
/// quote, whitespace or `}`.
pub(super) fn looks_like_ubjson(bytes: &[u8]) -> bool {
    match bytes {
        [b'{', next, ..] => next.is_ascii_alphabetic() || matches!(next, b'$' | b'#'),
        _ => false,
    }
}

/// Decode a complete UBJSON document.
pub(super) fn parse(bytes: &[u8]) -> Result<Value> {
    Reader { bytes, pos: 0 }.value(0)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn malformed_at(pos: usize, detail: impl std::fmt::Display) -> Error {
    Error::MalformedModel {
        message: format!("ubjson byte {pos}: {detail}"),
    }
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| malformed_at(self.pos, format!("need {n} more bytes")))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Next marker, skipping `N` no-ops.
    fn marker(&mut self) -> Result<u8> {
        loop {
            let marker = self.byte()?;
            if marker != b'N' {
                return Ok(marker);
            }
        }
    }

    fn integer(&mut self, marker: u8) -> Result<i64> {
        Ok(match marker {
            b'i' => i64::from(i8::from_be_bytes(self.array()?)),
            b'U' => i64::from(self.byte()?),
            b'I' => i64::from(i16::from_be_bytes(self.array()?)),
            b'l' => i64::from(i32::from_be_bytes(self.array()?)),
            b'L' => i64::from_be_bytes(self.array()?),
            other => {
                return Err(malformed_at(
                    self.pos.saturating_sub(1),
                    format!("expected an integer marker, found {:?}", other as char),
                ))
            }
        })
    }

    fn length(&mut self) -> Result<usize> {
        let start = self.pos;
        let marker = self.marker()?;
        let value = self.integer(marker)?;
        usize::try_from(value).map_err(|_| malformed_at(start, format!("negative length {value}")))
    }

    fn string(&mut self) -> Result<String> {
        let start = self.pos;
        let len = self.length()?;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| malformed_at(start, "string is not UTF-8"))
    }

    fn float(&self, value: f64) -> Result<Value> {
        Number::from_f64(value)
            .map(Value::Number)
            .ok_or_else(|| malformed_at(self.pos, format!("non-finite number {value}")))
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        let marker = self.marker()?;
        self.typed_value(marker, depth)
    }

    fn typed_value(&mut self, marker: u8, depth: usize) -> Result<Value> {
        match marker {
            b'Z' => Ok(Value::Null),
            b'T' => Ok(Value::Bool(true)),
            b'F' => Ok(Value::Bool(false)),
            b'i' | b'U' | b'I' | b'l' | b'L' => Ok(Value::from(self.integer(marker)?)),
            b'd' => {
                let value = f32::from_be_bytes(self.array()?);
                self.float(f64::from(value))
            }
            b'D' => {
                let value = f64::from_be_bytes(self.array()?);
                self.float(value)
            }
            b'C' => Ok(Value::String(char::from(self.byte()?).to_string())),
            b'S' => Ok(Value::String(self.string()?)),
            b'H' => {
                let start = self.pos;
                let digits = self.string()?;
                let number: f64 = digits
                    .parse()
                    .map_err(|_| malformed_at(start, format!("bad number {digits:?}")))?;
                self.float(number)
            }
            b'[' => self.array_value(depth + 1),
            b'{' => self.object_value(depth + 1),
            other => Err(malformed_at(
                self.pos.saturating_sub(1),
                format!("unknown marker {:?}", other as char),
            )),
        }
    }

    /// Optional `$type` and `#count` headers of an optimized container.
    fn container_header(&mut self) -> Result<(Option<u8>, Option<usize>)> {
        let mut element = None;
        if self.peek() == Some(b'$') {
            self.pos += 1;
            element = Some(self.byte()?);
        }
        let mut count = None;
        if self.peek() == Some(b'#') {
            self.pos += 1;
            count = Some(self.length()?);
        } else if element.is_some() {
            return Err(malformed_at(self.pos, "typed container without a count"));
        }
        Ok((element, count))
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(malformed_at(self.pos, "containers nested too deeply"));
        }
        Ok(())
    }

    fn array_value(&mut self, depth: usize) -> Result<Value> {
        self.check_depth(depth)?;
        let (element, count) = self.container_header()?;
        let mut items = Vec::new();
        match count {
            Some(count) => {
                // Every element takes at least one byte.
                if count > self.bytes.len() - self.pos {
                    return Err(malformed_at(
                        self.pos,
                        format!("array count {count} overruns input"),
                    ));
                }
                items.reserve(count);
                for _ in 0..count {
                    let item = match element {
                        Some(marker) => self.typed_value(marker, depth)?,
                        None => self.value(depth)?,
                    };
                    items.push(item);
                }
            }
            None => loop {
                let marker = self.marker()?;
                if marker == b']' {
                    break;
                }
                items.push(self.typed_value(marker, depth)?);
            },
        }
        Ok(Value::Array(items))
    }

    fn object_value(&mut self, depth: usize) -> Result<Value> {
        self.check_depth(depth)?;
        let (element, count) = self.container_header()?;
        let mut map = Map::new();
        match count {
            Some(count) => {
                for _ in 0..count {
                    let key = self.string()?;
                    let item = match element {
                        Some(marker) => self.typed_value(marker, depth)?,
                        None => self.value(depth)?,
                    };
                    map.insert(key, item);
                }
            }
            None => loop {
                if self.peek() == Some(b'}') {
                    self.pos += 1;
                    break;
                }
                let key = self.string()?;
                let item = self.value(depth)?;
                map.insert(key, item);
            },
        }
        Ok(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_objects_and_strings() {
        // {"name": "gbtree", "ok": true}
        let bytes = b"{i\x04nameSi\x06gbtreei\x02okT}";
        let value = parse(bytes).unwrap();
        assert_eq!(value["name"], "gbtree");
        assert_eq!(value["ok"], true);
        assert!(looks_like_ubjson(bytes));
        assert!(!looks_like_ubjson(b"{\"name\": 1}"));
        assert!(!looks_like_ubjson(b"{\n}"));
    }

    #[test]
    fn decodes_typed_float_array() {
        let mut bytes = b"[$d#L".to_vec();
        bytes.extend_from_slice(&2i64.to_be_bytes());
        bytes.extend_from_slice(&0.5f32.to_be_bytes());
        bytes.extend_from_slice(&(-1.25f32).to_be_bytes());
        let value = parse(&bytes).unwrap();
        assert_eq!(value, serde_json::json!([0.5, -1.25]));
    }

    #[test]
    fn decodes_mixed_integers() {
        let mut bytes = b"[U\xffi\xffI".to_vec();
        bytes.extend_from_slice(&(-300i16).to_be_bytes());
        bytes.push(b'l');
        bytes.extend_from_slice(&70_000i32.to_be_bytes());
        bytes.push(b']');
        assert_eq!(
            parse(&bytes).unwrap(),
            serde_json::json!([255, -1, -300, 70_000])
        );
    }

    #[test]
    fn truncated_input_is_malformed() {
        let err = parse(b"{i\x04nameSi\x06gbt").unwrap_err();
        assert!(matches!(err, Error::MalformedModel { .. }));
    }

    #[test]
    fn oversized_count_is_rejected() {
        let mut bytes = b"[$U#L".to_vec();
        bytes.extend_from_slice(&i64::MAX.to_be_bytes());
        assert!(parse(&bytes).is_err());
    }
}
