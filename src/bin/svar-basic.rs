//! Purpose: Minimal walkthrough of loading a module and calling its functions.
//! Role: Companion binary; mirrors the first steps a plugin consumer takes.

use svar::core::error::{Error, to_exit_code};
use svar::core::value::Value;
use svar::json;
use svar::plugin::Module;

fn main() {
    if let Err(err) = run() {
        eprintln!("svar-basic: {err}");
        std::process::exit(to_exit_code(err.kind()));
    }
}

fn run() -> Result<(), Error> {
    let spec = std::env::args().nth(1).unwrap_or_else(|| "sample".into());
    let module = Module::load(&spec)?;

    let record = Value::from_entries([
        ("i", Value::from(1)),
        ("d", Value::from(1.2)),
        ("s", Value::from("hello world")),
        ("v", Value::from(vec![1, 2, 3])),
    ]);
    println!("record: {record}");

    let echoed = module.call("obtain_info", &[record.clone()])?;
    println!("obtain_info: {echoed}");
    println!("as native json: {}", json::to_serde(&echoed)?);

    let text = module.call("dtos", &[Value::from(100.423)])?;
    println!("dtos(100.423) = {}", text.cast_str());

    let sum = module.call("add", &[Value::from(34), Value::from(3)])?;
    println!("add(34, 3) = {sum}");

    let sum = module.call("add", &[sum, Value::from(3)])?;
    println!("add(.., 3) = {sum}");

    Ok(())
}
