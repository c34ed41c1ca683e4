//! Purpose: Runtime function objects callable over `Value` argument lists.
//! Exports: `Function`, `NativeFn`.
//! Role: The callable half of the value model; plugins and classes bind through it.
//! Invariants: Overload resolution walks the `next` chain and reports every candidate on failure.
//! Invariants: Bound closures are `Send + Sync` so functions can cross threads inside `Arc`.

use std::fmt;
use std::sync::Arc;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;

pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync;

pub struct Function {
    name: String,
    doc: Option<String>,
    signature: Option<String>,
    arity: Option<usize>,
    func: Box<NativeFn>,
    next: Option<Arc<Function>>,
}

impl Function {
    pub fn new(
        name: &str,
        f: impl Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            doc: None,
            signature: None,
            arity: None,
            func: Box::new(f),
            next: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Enables the arity precheck used during overload resolution.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    /// Appends an overload to the end of the chain.
    pub fn with_overload(mut self, overload: Function) -> Self {
        match self.next.take() {
            None => self.next = Some(Arc::new(overload)),
            Some(next) => {
                let tail = match Arc::try_unwrap(next) {
                    Ok(tail) => tail,
                    Err(shared) => {
                        let name = shared.name.clone();
                        let doc = shared.doc.clone();
                        let signature = shared.signature.clone();
                        let arity = shared.arity;
                        let chained = shared.next.clone();
                        Function {
                            name,
                            doc,
                            signature,
                            arity,
                            func: Box::new(move |args| (shared.func)(args)),
                            next: chained,
                        }
                    }
                };
                self.next = Some(Arc::new(tail.with_overload(overload)));
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn signature(&self) -> String {
        match &self.signature {
            Some(sig) => sig.clone(),
            None => match self.arity {
                Some(n) => {
                    let params = (0..n).map(|_| "_").collect::<Vec<_>>().join(", ");
                    format!("({params})")
                }
                None => "(...)".to_string(),
            },
        }
    }

    /// Try each overload in chain order. Arity mismatches are skipped;
    /// failures are collected and reported together when nothing matched.
    pub fn call(&self, args: &[Value]) -> Result<Value, Error> {
        let mut failures: Vec<Error> = Vec::new();
        let mut overload = Some(self);
        while let Some(current) = overload {
            let arity_ok = current.arity.is_none_or(|n| n == args.len());
            if arity_ok {
                match (current.func)(args) {
                    Ok(value) => return Ok(value),
                    Err(err) => failures.push(err),
                }
            }
            overload = current.next.as_deref();
        }

        let arg_kinds = args
            .iter()
            .map(Value::kind_name)
            .collect::<Vec<_>>()
            .join(",");
        let mut report = format!(
            "no matching overload of {} for arguments [{arg_kinds}]; candidates:",
            self.name
        );
        let mut candidate = Some(self);
        while let Some(current) = candidate {
            report.push_str(&format!("\n    {}{}", current.name, current.signature()));
            candidate = current.next.as_deref();
        }
        for failure in &failures {
            report.push_str(&format!("\n    tried: {failure}"));
        }
        Err(Error::new(ErrorKind::Type).with_message(report))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut overload = Some(self);
        while let Some(current) = overload {
            writeln!(f, "{}{}", current.name, current.signature())?;
            if let Some(doc) = &current.doc {
                writeln!(f, "    {doc}")?;
            }
            overload = current.next.as_deref();
        }
        Ok(())
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({}{})", self.name, self.signature())
    }
}

#[cfg(test)]
mod tests {
    use super::Function;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::value::Value;

    fn add_ints(args: &[Value]) -> Result<Value, Error> {
        let a = args[0]
            .as_int()
            .ok_or_else(|| Error::new(ErrorKind::Type).with_message("want int"))?;
        let b = args[1]
            .as_int()
            .ok_or_else(|| Error::new(ErrorKind::Type).with_message("want int"))?;
        Ok(Value::Int(a + b))
    }

    #[test]
    fn calls_with_value_args() {
        let f = Function::new("add", add_ints).with_arity(2);
        let out = f.call(&[Value::from(34), Value::from(3)]).unwrap();
        assert_eq!(out, Value::Int(37));
    }

    #[test]
    fn overload_falls_through_on_type_mismatch() {
        let f = Function::new("describe", |args: &[Value]| {
            args[0]
                .as_int()
                .map(|i| Value::Str(format!("int {i}")))
                .ok_or_else(|| Error::new(ErrorKind::Type).with_message("want int"))
        })
        .with_arity(1)
        .with_overload(
            Function::new("describe", |args: &[Value]| {
                args[0]
                    .as_str()
                    .map(|s| Value::Str(format!("str {s}")))
                    .ok_or_else(|| Error::new(ErrorKind::Type).with_message("want str"))
            })
            .with_arity(1),
        );

        assert_eq!(
            f.call(&[Value::from(1)]).unwrap(),
            Value::from("int 1")
        );
        assert_eq!(
            f.call(&[Value::from("c")]).unwrap(),
            Value::from("str c")
        );
    }

    #[test]
    fn failure_lists_candidates() {
        let f = Function::new("only_int", |args: &[Value]| {
            args[0]
                .as_int()
                .map(Value::Int)
                .ok_or_else(|| Error::new(ErrorKind::Type).with_message("want int"))
        })
        .with_arity(1)
        .with_signature("(int)");

        let err = f.call(&[Value::from(true)]).unwrap_err();
        let text = err.message().unwrap_or_default().to_string();
        assert!(text.contains("only_int(int)"));
        assert!(text.contains("[bool]"));
    }

    #[test]
    fn arity_mismatch_is_skipped() {
        let f = Function::new("pair", add_ints).with_arity(2);
        let err = f.call(&[Value::from(1)]).unwrap_err();
        assert!(err.message().unwrap_or_default().contains("no matching overload"));
    }
}
