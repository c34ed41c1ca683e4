//! End-to-end checks against the builtin sample module, exercising the same
//! load/call path a shared-library plugin would go through.

use svar::core::value::Value;
use svar::json;
use svar::plugin::Module;

fn sample() -> Module {
    Module::load("sample").expect("builtin sample module loads")
}

#[test]
fn add_chains_through_results() {
    let module = sample();
    let sum = module
        .call("add", &[Value::from(34), Value::from(3)])
        .expect("first add");
    assert_eq!(sum, Value::Int(37));
    let sum = module.call("add", &[sum, Value::from(3)]).expect("second add");
    assert_eq!(sum, Value::Int(40));
}

#[test]
fn dtos_prints_six_fraction_digits() {
    let module = sample();
    let text = module
        .call("dtos", &[Value::from(100.423)])
        .expect("dtos call");
    assert_eq!(text.cast_str(), "100.423000");
}

#[test]
fn obtain_info_echoes_record() {
    let module = sample();
    let record = Value::from_entries([
        ("i", Value::from(1)),
        ("d", Value::from(1.2)),
        ("s", Value::from("hello world")),
        ("v", Value::from(vec![1, 2, 3])),
    ]);
    let echoed = module
        .call("obtain_info", &[record])
        .expect("obtain_info call");

    assert_eq!(echoed.get_path("i"), Some(Value::Int(1)));
    assert_eq!(echoed.get_path("d"), Some(Value::Float(1.2)));
    assert_eq!(echoed.get_path("s"), Some(Value::from("hello world")));
    assert_eq!(echoed.get_path("v"), Some(Value::from(vec![1, 2, 3])));

    let native = json::to_serde(&echoed).expect("native conversion");
    assert_eq!(native["i"], serde_json::json!(1));
    assert_eq!(native["s"], serde_json::json!("hello world"));
    assert_eq!(native["v"], serde_json::json!([1, 2, 3]));
}

#[test]
fn application_class_constructs_instances() {
    let module = sample();
    let class = module.get("Application").expect("class member");
    let app = class
        .invoke(&[Value::from("demo")])
        .expect("construct instance");
    let name = app.call_method("name", &[]).expect("name method");
    assert_eq!(name.cast_str(), "demo");
    let intro = app
        .call_method("introduction", &[])
        .expect("introduction method");
    assert!(intro.cast_str().contains("demo"));
}

#[test]
fn unknown_member_reports_not_found() {
    let module = sample();
    let err = module.call("no_such_fn", &[]).unwrap_err();
    assert_eq!(err.kind(), svar::core::error::ErrorKind::NotFound);
}

#[test]
fn doc_lists_public_members() {
    let module = sample();
    let doc = module.doc(None).expect("module doc");
    assert!(doc.contains("obtain_info"));
    assert!(doc.contains("add"));
    assert!(!doc.contains("__name__"));
}
