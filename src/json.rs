//! Purpose: The JSON boundary for the value model.
//! Exports: `parse_str`, `dump`, `dump_pretty`, `to_serde`, `from_serde`.
//! Role: Single seam for serde_json usage so callsites avoid ad hoc decode logic.
//! Invariants: Buffers cross into JSON as base64 strings; functions and classes do not cross.
//! Invariants: Parse failures carry `ErrorKind::Parse` with position context preserved.

use serde_json::{Map, Number, Value as JsonValue};

use crate::core::buffer::Buffer;
use crate::core::class::Class;
use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;

pub fn parse_str(input: &str) -> Result<Value, Error> {
    let parsed: JsonValue = serde_json::from_str(input).map_err(|err| {
        Error::new(ErrorKind::Parse)
            .with_message(format!("invalid json: {err}"))
            .with_source(err)
    })?;
    Ok(from_serde(&parsed))
}

pub fn dump(value: &Value) -> Result<String, Error> {
    let json = to_serde(value)?;
    serde_json::to_string(&json).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to serialize value")
            .with_source(err)
    })
}

pub fn dump_pretty(value: &Value) -> Result<String, Error> {
    let json = to_serde(value)?;
    serde_json::to_string_pretty(&json).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to serialize value")
            .with_source(err)
    })
}

/// Native form of a value. Undefined maps to null, buffers to base64
/// strings; functions and classes have no JSON form.
pub fn to_serde(value: &Value) -> Result<JsonValue, Error> {
    match value {
        Value::Undefined | Value::Null => Ok(JsonValue::Null),
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::Int(i) => Ok(JsonValue::Number(Number::from(*i))),
        Value::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage).with_message("non-finite float has no json form")
            }),
        Value::Str(s) => Ok(JsonValue::String(s.clone())),
        Value::Buffer(b) => Ok(JsonValue::String(b.base64())),
        Value::Array(_) => {
            let mut items = Vec::with_capacity(value.len());
            for item in value.items() {
                items.push(to_serde(&item)?);
            }
            Ok(JsonValue::Array(items))
        }
        Value::Object(_) => {
            let mut map = Map::new();
            for (key, item) in value.entries() {
                if key == Class::CLASS_KEY {
                    continue;
                }
                map.insert(key, to_serde(&item)?);
            }
            Ok(JsonValue::Object(map))
        }
        Value::Function(f) => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("function {} has no json form", f.name()))),
        Value::Class(c) => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("class {} has no json form", c.name()))),
    }
}

pub fn from_serde(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => Value::Str(s.clone()),
        JsonValue::Array(items) => Value::from_items(items.iter().map(from_serde)),
        JsonValue::Object(map) => {
            Value::from_entries(map.iter().map(|(k, v)| (k.clone(), from_serde(v))))
        }
    }
}

/// File loader shared by settings and the CLI: format picked by extension.
pub fn load_file(path: &std::path::Path) -> Result<Value, Error> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    match ext {
        "json" | "cfg" => {
            let text = std::fs::read_to_string(path).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read file")
                    .with_path(path)
                    .with_source(err)
            })?;
            parse_str(&text).map_err(|err| err.with_path(path))
        }
        "cbor" => {
            let buf = Buffer::load(path)?;
            crate::cbor::decode(buf.as_slice()).map_err(|err| err.with_path(path))
        }
        other => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("unsupported file format {other:?}"))
            .with_path(path)
            .with_hint("Supported extensions: .json, .cfg, .cbor.")),
    }
}

#[cfg(test)]
mod tests {
    use super::{dump, from_serde, load_file, parse_str, to_serde};
    use crate::core::buffer::Buffer;
    use crate::core::value::Value;

    #[test]
    fn parse_and_dump_round_trip() {
        let var = parse_str(r#"{"a":[true,1,12.3,"hello"]}"#).unwrap();
        assert!(var.get_item("a").unwrap().is_array());
        assert_eq!(var.get_path("a").unwrap().index(3), Some(Value::from("hello")));

        let text = dump(&var).unwrap();
        let reparsed = parse_str(&text).unwrap();
        assert_eq!(dump(&reparsed).unwrap(), text);
    }

    #[test]
    fn parse_errors_carry_position() {
        let err = parse_str(r#"{"a":}"#).unwrap_err();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Parse);
        assert!(err.message().unwrap_or_default().contains("column"));
    }

    #[test]
    fn buffers_cross_as_base64() {
        let var = Value::from(Buffer::from_slice(b"M"));
        assert_eq!(to_serde(&var).unwrap(), serde_json::json!("TQ=="));
    }

    #[test]
    fn functions_do_not_cross() {
        let var = Value::from_fn("f", |_| Ok(Value::Undefined));
        assert!(to_serde(&var).is_err());
    }

    #[test]
    fn numbers_keep_integer_identity() {
        let var = from_serde(&serde_json::json!({"i": 1, "d": 1.2}));
        assert!(var.get_item("i").unwrap().is_int());
        assert!(var.get_item("d").unwrap().is_float());
    }

    #[test]
    fn load_file_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.json");
        std::fs::write(&path, r#"{"x": 7}"#).unwrap();
        let var = load_file(&path).unwrap();
        assert_eq!(var.get_item("x"), Some(Value::Int(7)));

        let bad = dir.path().join("conf.toml");
        std::fs::write(&bad, "x = 7").unwrap();
        assert!(load_file(&bad).is_err());
    }
}
