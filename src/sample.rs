//! Purpose: The bundled sample module exercised by `svar-basic` and the docs.
//! Exports: `init` (module root builder); entry symbols only under `sample-export`.
//! Role: Reference plugin showing how functions and classes are published.

use crate::core::class::Class;
use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;

// The entry symbols must come from exactly one library in a process;
// exporting them here would collide with every downstream plugin's own
// `svar_module!` expansion. Hosts get `sample` through the builtin
// registry; `--features sample-export` builds the loadable cdylib form.
#[cfg(feature = "sample-export")]
crate::svar_module!(init());

/// Builds the module root: three functions, metadata, and a demo class.
pub fn init() -> Value {
    let root = Value::object();

    let _ = root.set_item(
        "obtain_info",
        Value::from(
            crate::core::function::Function::new("obtain_info", |args: &[Value]| {
                let record = args
                    .first()
                    .ok_or_else(|| missing_arg("obtain_info", "record"))?;
                tracing::debug!(record = %record, "obtain_info called");
                Ok(record.clone())
            })
            .with_arity(1)
            .with_signature("(record)")
            .with_doc("Echoes the record handed in; the caller inspects the handle."),
        ),
    );

    let _ = root.set_item(
        "dtos",
        Value::from(
            crate::core::function::Function::new("dtos", |args: &[Value]| {
                let value = args.first().ok_or_else(|| missing_arg("dtos", "value"))?;
                let d = value.cast_float()?;
                Ok(Value::Str(format!("{d:.6}")))
            })
            .with_arity(1)
            .with_signature("(float) -> str")
            .with_doc("Formats a float with six fractional digits."),
        ),
    );

    let _ = root.set_item(
        "add",
        Value::from(
            crate::core::function::Function::new("add", |args: &[Value]| {
                let a = args.first().ok_or_else(|| missing_arg("add", "a"))?;
                let b = args.get(1).ok_or_else(|| missing_arg("add", "b"))?;
                Ok(Value::Int(a.cast_int()? + b.cast_int()?))
            })
            .with_arity(2)
            .with_signature("(int, int) -> int")
            .with_doc("Integer addition."),
        ),
    );

    let _ = root.set_item(
        "Application",
        Class::new("Application")
            .with_doc("Demo class constructed from a name.")
            .def("__init__", |args: &[Value]| {
                let name = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| missing_arg("Application.__init__", "name"))?;
                let obj = Value::object();
                obj.set_item("name", name)?;
                Ok(obj)
            })
            .def("name", |args: &[Value]| {
                Ok(args[0].get_item("name").unwrap_or_default())
            })
            .def("version", |_args: &[Value]| {
                Ok(Value::from(env!("CARGO_PKG_VERSION")))
            })
            .def("introduction", |args: &[Value]| {
                let name = args[0]
                    .get_item("name")
                    .map(|v| v.cast_str())
                    .unwrap_or_default();
                Ok(Value::Str(format!("Application {name} built with svar")))
            })
            .into_value(),
    );

    let _ = root.set_item("__name__", "sample");
    let _ = root.set_item(
        "__doc__",
        "This is a demo showing how to export a module using svar.",
    );
    root
}

fn missing_arg(function: &str, name: &str) -> Error {
    Error::new(ErrorKind::Usage).with_message(format!("{function}: missing argument {name}"))
}

#[cfg(test)]
mod tests {
    use super::init;
    use crate::core::value::Value;

    #[test]
    fn add_sums_and_chains() {
        let module = init();
        let add = module.get_item("add").unwrap();
        let c = add.invoke(&[Value::from(34), Value::from(3)]).unwrap();
        assert_eq!(c, Value::Int(37));
        let d = add.invoke(&[c, Value::from(3)]).unwrap();
        assert_eq!(d, Value::Int(40));
    }

    #[test]
    fn dtos_uses_six_fractional_digits() {
        let module = init();
        let dtos = module.get_item("dtos").unwrap();
        let out = dtos.invoke(&[Value::from(100.423)]).unwrap();
        assert_eq!(out, Value::from("100.423000"));
    }

    #[test]
    fn obtain_info_reproduces_the_record() {
        let module = init();
        let record = Value::from_entries([
            ("i", Value::from(1)),
            ("d", Value::from(1.2)),
            ("s", Value::from("hello world")),
            ("v", Value::from(vec![1, 2, 3])),
        ]);
        let ret = module
            .get_item("obtain_info")
            .unwrap()
            .invoke(&[record.clone()])
            .unwrap();
        assert_eq!(ret, record);
        let native = crate::json::to_serde(&ret).unwrap();
        assert_eq!(native["s"], "hello world");
        assert_eq!(native["v"][2], 3);
    }

    #[test]
    fn application_class_constructs() {
        let module = init();
        let class = module.get_item("Application").unwrap();
        let app = class.invoke(&[Value::from("demo")]).unwrap();
        assert_eq!(app.call_method("name", &[]).unwrap(), Value::from("demo"));
        assert!(
            app.call_method("introduction", &[])
                .unwrap()
                .cast_str()
                .contains("demo")
        );
    }
}
