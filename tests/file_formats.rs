//! File-level persistence checks: values written as JSON or CBOR load back
//! with the same structure through the extension-dispatched loader.

use svar::cbor;
use svar::core::buffer::Buffer;
use svar::core::value::Value;
use svar::json;

fn sample_doc() -> Value {
    Value::from_entries([
        ("name", Value::from("svar")),
        ("count", Value::from(42)),
        ("ratio", Value::from(0.25)),
        ("tags", Value::from(vec!["a", "b"])),
        (
            "nested",
            Value::from_entries([("enabled", Value::from(true))]),
        ),
    ])
}

#[test]
fn json_file_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");
    let doc = sample_doc();
    std::fs::write(&path, json::dump_pretty(&doc).unwrap()).unwrap();

    let loaded = json::load_file(&path).unwrap();
    assert_eq!(loaded, doc);
}

#[test]
fn cbor_file_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.cbor");
    let doc = sample_doc();
    Buffer::new(cbor::encode(&doc).unwrap()).save(&path).unwrap();

    let loaded = json::load_file(&path).unwrap();
    assert_eq!(loaded, doc);
}

#[test]
fn cfg_extension_parses_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.cfg");
    std::fs::write(&path, r#"{"mode": "fast"}"#).unwrap();

    let loaded = json::load_file(&path).unwrap();
    assert_eq!(loaded.get_path("mode"), Some(Value::from("fast")));
}

#[test]
fn unknown_extension_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.yaml");
    std::fs::write(&path, "mode: fast").unwrap();

    let err = json::load_file(&path).unwrap_err();
    assert_eq!(err.kind(), svar::core::error::ErrorKind::Usage);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = json::load_file(std::path::Path::new("/no/such/file.json")).unwrap_err();
    assert_eq!(err.kind(), svar::core::error::ErrorKind::Io);
}
