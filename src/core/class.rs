//! Purpose: Dynamic classes: named attribute tables with inheritance.
//! Exports: `Class`.
//! Role: Lets plugins publish constructible types with methods next to plain functions.
//! Invariants: Instances are object values carrying their class under `Class::CLASS_KEY`.
//! Invariants: Attribute resolution searches the class, then parents depth-first.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::error::{Error, ErrorKind};
use crate::core::function::Function;
use crate::core::value::Value;

pub struct Class {
    name: String,
    doc: Option<String>,
    attrs: RwLock<BTreeMap<String, Value>>,
    parents: Vec<Arc<Class>>,
}

impl Class {
    pub const CLASS_KEY: &'static str = "__class__";

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            doc: None,
            attrs: RwLock::new(BTreeMap::new()),
            parents: Vec::new(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn inherit(mut self, parent: Arc<Class>) -> Self {
        self.parents.push(parent);
        self
    }

    /// Binds a method. A second definition under the same name extends the
    /// overload chain.
    pub fn def(
        self,
        name: &str,
        f: impl Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    ) -> Self {
        let qualified = format!("{}.{name}", self.name);
        self.def_fn(name, Function::new(&qualified, f))
    }

    pub fn def_fn(self, name: &str, function: Function) -> Self {
        {
            let mut attrs = self.attrs.write().unwrap_or_else(PoisonError::into_inner);
            let merged = match attrs.remove(name) {
                Some(Value::Function(existing)) => {
                    let head = match Arc::try_unwrap(existing) {
                        Ok(head) => head,
                        Err(shared) => {
                            Function::new(&format!("{}.{name}", self.name), move |args| {
                                shared.call(args)
                            })
                        }
                    };
                    head.with_overload(function)
                }
                _ => function,
            };
            attrs.insert(name.to_string(), Value::Function(Arc::new(merged)));
        }
        self
    }

    /// Plain (non-callable) attribute.
    pub fn def_value(self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value.into());
        self
    }

    pub fn into_value(self) -> Value {
        Value::Class(Arc::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn attr(&self, name: &str) -> Option<Value> {
        if let Some(found) = self
            .attrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Some(found.clone());
        }
        self.parents.iter().find_map(|parent| parent.attr(name))
    }

    pub fn attr_names(&self) -> Vec<String> {
        let mut names = self
            .attrs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        for parent in &self.parents {
            for name in parent.attr_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Builds an instance: `__init__` must return an object, which is then
    /// tagged with the class.
    pub fn construct(class: &Arc<Class>, args: &[Value]) -> Result<Value, Error> {
        let init = class.attr("__init__").ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("class {} has no __init__", class.name))
        })?;
        let instance = init.invoke(args)?;
        if !instance.is_object() {
            return Err(Error::new(ErrorKind::Type).with_message(format!(
                "{}.__init__ must return an object, got {}",
                class.name,
                instance.kind_name()
            )));
        }
        instance.set_item(Self::CLASS_KEY, Value::Class(class.clone()))?;
        Ok(instance)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "class {}", self.name)?;
        if let Some(doc) = &self.doc {
            writeln!(f, "  {doc}")?;
        }
        for name in self.attr_names() {
            if name == "__init__" {
                continue;
            }
            writeln!(f, "  .{name}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.name)
    }
}
