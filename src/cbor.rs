//! Purpose: Binary CBOR encode/decode of the value model (RFC 7049 subset).
//! Exports: `encode`, `decode`.
//! Role: Compact wire/storage form next to the JSON boundary.
//! Invariants: Integer heads use the minimal width; multi-byte fields are network order.
//! Invariants: Definite lengths only; indefinite items are rejected as corrupt.
//! Notes: Buffers map to byte strings, so binary payloads survive a round trip.

use crate::core::buffer::Buffer;
use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;

const SIMPLE_FALSE: u8 = 0xF4;
const SIMPLE_TRUE: u8 = 0xF5;
const SIMPLE_NULL: u8 = 0xF6;
const SIMPLE_UNDEFINED: u8 = 0xF7;
const SIMPLE_F32: u8 = 0xFA;
const SIMPLE_F64: u8 = 0xFB;

pub fn encode(value: &Value) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    encode_into(&mut out, value)?;
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<Value, Error> {
    let mut cursor = Cursor { bytes, pos: 0 };
    let value = cursor.decode_value()?;
    if cursor.pos != bytes.len() {
        return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
            "{} trailing bytes after cbor item",
            bytes.len() - cursor.pos
        )));
    }
    Ok(value)
}

fn encode_into(out: &mut Vec<u8>, value: &Value) -> Result<(), Error> {
    match value {
        Value::Undefined | Value::Null => out.push(SIMPLE_NULL),
        Value::Bool(b) => out.push(if *b { SIMPLE_TRUE } else { SIMPLE_FALSE }),
        Value::Int(i) => {
            if *i >= 0 {
                encode_head(out, MAJOR_UNSIGNED, *i as u64);
            } else {
                encode_head(out, MAJOR_NEGATIVE, (-1 - i) as u64);
            }
        }
        Value::Float(f) => {
            out.push(SIMPLE_F64);
            out.extend_from_slice(&f.to_be_bytes());
        }
        Value::Str(s) => {
            encode_head(out, MAJOR_TEXT, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Buffer(b) => {
            encode_head(out, MAJOR_BYTES, b.len() as u64);
            out.extend_from_slice(b.as_slice());
        }
        Value::Array(_) => {
            let items = value.items();
            encode_head(out, MAJOR_ARRAY, items.len() as u64);
            for item in &items {
                encode_into(out, item)?;
            }
        }
        Value::Object(_) => {
            let entries = value.entries();
            encode_head(out, MAJOR_MAP, entries.len() as u64);
            for (key, item) in &entries {
                encode_head(out, MAJOR_TEXT, key.len() as u64);
                out.extend_from_slice(key.as_bytes());
                encode_into(out, item)?;
            }
        }
        Value::Function(_) | Value::Class(_) => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("cannot encode {} as cbor", value.kind_name())));
        }
    }
    Ok(())
}

fn encode_head(out: &mut Vec<u8>, major: u8, arg: u64) {
    let tag = major << 5;
    if arg <= 0x17 {
        out.push(tag | arg as u8);
    } else if arg <= u64::from(u8::MAX) {
        out.push(tag | 24);
        out.push(arg as u8);
    } else if arg <= u64::from(u16::MAX) {
        out.push(tag | 25);
        out.extend_from_slice(&(arg as u16).to_be_bytes());
    } else if arg <= u64::from(u32::MAX) {
        out.push(tag | 26);
        out.extend_from_slice(&(arg as u32).to_be_bytes());
    } else {
        out.push(tag | 27);
        out.extend_from_slice(&arg.to_be_bytes());
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn decode_value(&mut self) -> Result<Value, Error> {
        let head = self.read_u8()?;
        match head {
            SIMPLE_FALSE => return Ok(Value::Bool(false)),
            SIMPLE_TRUE => return Ok(Value::Bool(true)),
            SIMPLE_NULL => return Ok(Value::Null),
            SIMPLE_UNDEFINED => return Ok(Value::Undefined),
            SIMPLE_F32 => {
                let raw = self.read_exact(4)?;
                let mut word = [0u8; 4];
                word.copy_from_slice(raw);
                return Ok(Value::Float(f64::from(f32::from_be_bytes(word))));
            }
            SIMPLE_F64 => {
                let raw = self.read_exact(8)?;
                let mut word = [0u8; 8];
                word.copy_from_slice(raw);
                return Ok(Value::Float(f64::from_be_bytes(word)));
            }
            _ => {}
        }

        let major = head >> 5;
        let info = head & 0x1F;
        match major {
            MAJOR_UNSIGNED => {
                let arg = self.read_argument(info)?;
                i64::try_from(arg).map(Value::Int).map_err(|_| {
                    Error::new(ErrorKind::Corrupt).with_message("unsigned value exceeds i64")
                })
            }
            MAJOR_NEGATIVE => {
                let arg = self.read_argument(info)?;
                let magnitude = i64::try_from(arg).map_err(|_| {
                    Error::new(ErrorKind::Corrupt).with_message("negative value exceeds i64")
                })?;
                Ok(Value::Int(-1 - magnitude))
            }
            MAJOR_BYTES => {
                let len = self.read_length(info)?;
                let raw = self.read_exact(len)?;
                Ok(Value::Buffer(Buffer::from_slice(raw)))
            }
            MAJOR_TEXT => {
                let len = self.read_length(info)?;
                let raw = self.read_exact(len)?;
                let text = std::str::from_utf8(raw).map_err(|err| {
                    Error::new(ErrorKind::Corrupt)
                        .with_message("text string is not utf-8")
                        .with_source(err)
                })?;
                Ok(Value::Str(text.to_string()))
            }
            MAJOR_ARRAY => {
                let len = self.read_length(info)?;
                let array = Value::array();
                for _ in 0..len {
                    array.push(self.decode_value()?)?;
                }
                Ok(array)
            }
            MAJOR_MAP => {
                let len = self.read_length(info)?;
                let object = Value::object();
                for _ in 0..len {
                    let key = match self.decode_value()? {
                        Value::Str(s) => s,
                        Value::Int(i) => i.to_string(),
                        other => {
                            return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
                                "map key must be text, got {}",
                                other.kind_name()
                            )));
                        }
                    };
                    object.set_item(&key, self.decode_value()?)?;
                }
                Ok(object)
            }
            _ => Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("unsupported cbor head 0x{head:02X}"))),
        }
    }

    fn read_argument(&mut self, info: u8) -> Result<u64, Error> {
        match info {
            0..=23 => Ok(u64::from(info)),
            24 => Ok(u64::from(self.read_u8()?)),
            25 => {
                let raw = self.read_exact(2)?;
                Ok(u64::from(u16::from_be_bytes([raw[0], raw[1]])))
            }
            26 => {
                let raw = self.read_exact(4)?;
                let mut word = [0u8; 4];
                word.copy_from_slice(raw);
                Ok(u64::from(u32::from_be_bytes(word)))
            }
            27 => {
                let raw = self.read_exact(8)?;
                let mut word = [0u8; 8];
                word.copy_from_slice(raw);
                Ok(u64::from_be_bytes(word))
            }
            31 => Err(Error::new(ErrorKind::Corrupt)
                .with_message("indefinite lengths are not supported")),
            other => Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("reserved additional info {other}"))),
        }
    }

    fn read_length(&mut self, info: u8) -> Result<usize, Error> {
        let arg = self.read_argument(info)?;
        usize::try_from(arg)
            .map_err(|_| Error::new(ErrorKind::Corrupt).with_message("length exceeds usize"))
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| Error::new(ErrorKind::Corrupt).with_message("truncated cbor input"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self.pos.checked_add(len).ok_or_else(|| {
            Error::new(ErrorKind::Corrupt).with_message("cbor length overflow")
        })?;
        if end > self.bytes.len() {
            return Err(Error::new(ErrorKind::Corrupt).with_message("truncated cbor input"));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};
    use crate::core::buffer::Buffer;
    use crate::core::error::ErrorKind;
    use crate::core::value::Value;

    #[test]
    fn encodes_small_ints_in_one_byte() {
        assert_eq!(encode(&Value::from(0)).unwrap(), vec![0x00]);
        assert_eq!(encode(&Value::from(23)).unwrap(), vec![0x17]);
        assert_eq!(encode(&Value::from(24)).unwrap(), vec![0x18, 24]);
        assert_eq!(encode(&Value::from(-1)).unwrap(), vec![0x20]);
        assert_eq!(encode(&Value::from(-500)).unwrap(), vec![0x39, 0x01, 0xF3]);
    }

    #[test]
    fn scalar_forms_use_simple_values() {
        assert_eq!(encode(&Value::Bool(false)).unwrap(), vec![0xF4]);
        assert_eq!(encode(&Value::Bool(true)).unwrap(), vec![0xF5]);
        assert_eq!(encode(&Value::Null).unwrap(), vec![0xF6]);
        assert_eq!(encode(&Value::Undefined).unwrap(), vec![0xF6]);
        let float = encode(&Value::from(1.5)).unwrap();
        assert_eq!(float[0], 0xFB);
        assert_eq!(float.len(), 9);
    }

    #[test]
    fn mixed_document_round_trips() {
        let var = Value::from_entries([
            ("i", Value::from(1)),
            ("bool", Value::from(false)),
            ("double", Value::from(434.0)),
            ("str", Value::from("sfd")),
            ("vec", Value::from(vec![1, 2, 3])),
            ("map", Value::from_entries([("name", "value")])),
            ("bin", Value::from(Buffer::from_slice(&[0u8, 1, 254]))),
        ]);
        let bytes = encode(&var).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(back.get_item("i"), Some(Value::Int(1)));
        assert_eq!(back.get_item("double"), Some(Value::Float(434.0)));
        assert_eq!(back.get_item("str"), Some(Value::from("sfd")));
        assert_eq!(back.get_path("map.name"), Some(Value::from("value")));
        assert!(back.get_item("bin").unwrap().is_buffer());
        assert_eq!(
            back.get_item("bin").unwrap().as_buffer().unwrap().as_slice(),
            &[0u8, 1, 254]
        );
    }

    #[test]
    fn truncated_input_is_corrupt() {
        let bytes = encode(&Value::from("hello world")).unwrap();
        let err = decode(&bytes[..bytes.len() - 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        let mut bytes = encode(&Value::from(1)).unwrap();
        bytes.push(0x00);
        assert_eq!(decode(&bytes).unwrap_err().kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn functions_are_rejected() {
        let var = Value::from_fn("f", |_| Ok(Value::Undefined));
        assert_eq!(encode(&var).unwrap_err().kind(), ErrorKind::Usage);
    }

    #[test]
    fn indefinite_lengths_are_rejected() {
        // 0x5F starts an indefinite byte string.
        assert_eq!(decode(&[0x5F]).unwrap_err().kind(), ErrorKind::Corrupt);
    }
}
