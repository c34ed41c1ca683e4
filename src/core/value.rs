//! Purpose: The dynamic `Value` type shared by codecs, plugins, and the CLI.
//! Exports: `Value`, `ObjectMap`, container constructors and accessors.
//! Role: Single in-memory representation for everything that crosses a module boundary.
//! Invariants: Arrays and objects have shared handle semantics (clone aliases the container).
//! Invariants: Containers are safe to share across threads; scalar values copy.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::buffer::Buffer;
use crate::core::class::Class;
use crate::core::error::{Error, ErrorKind};
use crate::core::function::Function;

pub type ObjectMap = BTreeMap<String, Value>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Buffer(Buffer),
    Array(Arc<RwLock<Vec<Value>>>),
    Object(Arc<RwLock<ObjectMap>>),
    Function(Arc<Function>),
    Class(Arc<Class>),
}

impl Value {
    pub fn object() -> Value {
        Value::Object(Arc::new(RwLock::new(ObjectMap::new())))
    }

    pub fn array() -> Value {
        Value::Array(Arc::new(RwLock::new(Vec::new())))
    }

    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<ObjectMap>();
        Value::Object(Arc::new(RwLock::new(map)))
    }

    pub fn from_items<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Value {
        let vec = items.into_iter().map(Into::into).collect::<Vec<_>>();
        Value::Array(Arc::new(RwLock::new(vec)))
    }

    pub fn from_fn(
        name: &str,
        f: impl Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    ) -> Value {
        Value::Function(Arc::new(Function::new(name, f)))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Buffer(_) => "buffer",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self, Value::Buffer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn is_class(&self) -> bool {
        matches!(self, Value::Class(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            Value::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<Function>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Arc<Class>> {
        match self {
            Value::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Numeric cast with int<->float coercion; bools widen to 0/1.
    pub fn cast_int(&self) -> Result<i64, Error> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Float(f) => Ok(*f as i64),
            Value::Bool(b) => Ok(i64::from(*b)),
            other => Err(cast_error(other, "int")),
        }
    }

    pub fn cast_float(&self) -> Result<f64, Error> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Bool(b) => Ok(f64::from(u8::from(*b))),
            other => Err(cast_error(other, "float")),
        }
    }

    /// Strings come back verbatim; anything else renders as its display form.
    pub fn cast_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Str(s) => s.len(),
            Value::Buffer(b) => b.len(),
            Value::Array(items) => read(items).len(),
            Value::Object(map) => read(map).len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Direct object lookup, no dot traversal.
    pub fn get_item(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(map) => read(map).get(key).cloned(),
            _ => None,
        }
    }

    pub fn set_item(&self, key: &str, value: impl Into<Value>) -> Result<(), Error> {
        match self {
            Value::Object(map) => {
                write(map).insert(key.to_string(), value.into());
                Ok(())
            }
            other => Err(Error::new(ErrorKind::Type)
                .with_message(format!("cannot set key on {}", other.kind_name()))),
        }
    }

    pub fn remove_item(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(map) => write(map).remove(key),
            _ => None,
        }
    }

    /// Dot-path lookup: `"child.key"` descends nested objects.
    pub fn get_path(&self, name: &str) -> Option<Value> {
        let mut current = self.clone();
        for part in name.split('.') {
            current = current.get_item(part)?;
        }
        Some(current)
    }

    /// Dot-path store; intermediate objects are created, and an undefined
    /// root becomes an object first.
    pub fn set_path(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        if self.is_undefined() {
            *self = Value::object();
        }
        let mut current = self.clone();
        let mut parts = name.split('.').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                return current.set_item(part, value);
            }
            let child = match current.get_item(part) {
                Some(child) if child.is_object() => child,
                _ => {
                    let child = Value::object();
                    current.set_item(part, child.clone())?;
                    child
                }
            };
            current = child;
        }
        Ok(())
    }

    /// Dot-path fetch that installs `default` when the key is absent and
    /// returns the stored value.
    pub fn get_or(&mut self, name: &str, default: impl Into<Value>) -> Value {
        if let Some(found) = self.get_path(name) {
            if !found.is_undefined() {
                return found;
            }
        }
        let default = default.into();
        if self.set_path(name, default.clone()).is_err() {
            return default;
        }
        default
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get_path(name).is_some_and(|v| !v.is_undefined())
    }

    pub fn index(&self, idx: usize) -> Option<Value> {
        match self {
            Value::Array(items) => read(items).get(idx).cloned(),
            _ => None,
        }
    }

    pub fn set_index(&self, idx: usize, value: impl Into<Value>) -> Result<(), Error> {
        match self {
            Value::Array(items) => {
                let mut items = write(items);
                match items.get_mut(idx) {
                    Some(slot) => {
                        *slot = value.into();
                        Ok(())
                    }
                    None => Err(Error::new(ErrorKind::Usage)
                        .with_message(format!("index {idx} out of range"))),
                }
            }
            other => Err(Error::new(ErrorKind::Type)
                .with_message(format!("cannot index {}", other.kind_name()))),
        }
    }

    pub fn insert_index(&self, idx: usize, value: impl Into<Value>) -> Result<(), Error> {
        match self {
            Value::Array(items) => {
                let mut items = write(items);
                if idx > items.len() {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message(format!("index {idx} out of range")));
                }
                items.insert(idx, value.into());
                Ok(())
            }
            other => Err(Error::new(ErrorKind::Type)
                .with_message(format!("cannot insert into {}", other.kind_name()))),
        }
    }

    pub fn remove_index(&self, idx: usize) -> Option<Value> {
        match self {
            Value::Array(items) => {
                let mut items = write(items);
                if idx < items.len() {
                    Some(items.remove(idx))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn push(&self, value: impl Into<Value>) -> Result<(), Error> {
        match self {
            Value::Array(items) => {
                write(items).push(value.into());
                Ok(())
            }
            other => Err(Error::new(ErrorKind::Type)
                .with_message(format!("cannot push onto {}", other.kind_name()))),
        }
    }

    /// Snapshot of array items; avoids holding the container lock while
    /// the caller iterates.
    pub fn items(&self) -> Vec<Value> {
        match self {
            Value::Array(items) => read(items).clone(),
            _ => Vec::new(),
        }
    }

    /// Snapshot of object entries in key order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        match self {
            Value::Object(map) => read(map)
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Independent copy: containers are duplicated recursively, functions
    /// and classes stay shared.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Array(items) => {
                let copied = read(items).iter().map(Value::deep_clone).collect::<Vec<_>>();
                Value::Array(Arc::new(RwLock::new(copied)))
            }
            Value::Object(map) => {
                let copied = read(map)
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_clone()))
                    .collect::<ObjectMap>();
                Value::Object(Arc::new(RwLock::new(copied)))
            }
            other => other.clone(),
        }
    }

    /// Call this value as a function, or construct an instance when it is
    /// a class.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, Error> {
        match self {
            Value::Function(f) => f.call(args),
            Value::Class(c) => Class::construct(c, args),
            other => Err(Error::new(ErrorKind::Type)
                .with_message(format!("{} is not callable", other.kind_name()))),
        }
    }

    /// Method dispatch: instances resolve through their class, classes
    /// resolve statics, and `__str__` works on every value.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, Error> {
        if let Value::Class(class) = self {
            let attr = class.attr(name).ok_or_else(|| method_not_found(self, name))?;
            return attr.invoke(args);
        }
        if let Some(class) = self.instance_class() {
            if let Some(method) = class.attr(name) {
                let mut argv = Vec::with_capacity(args.len() + 1);
                argv.push(self.clone());
                argv.extend_from_slice(args);
                return method.invoke(&argv);
            }
        }
        match name {
            "__str__" => Ok(Value::Str(self.to_string())),
            "__len__" => Ok(Value::Int(self.len() as i64)),
            _ => Err(method_not_found(self, name)),
        }
    }

    pub fn instance_class(&self) -> Option<Arc<Class>> {
        match self.get_item(Class::CLASS_KEY)? {
            Value::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn add(&self, rhs: &Value) -> Result<Value, Error> {
        match (self, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            _ => self.float_op(rhs, "add", |a, b| a + b),
        }
    }

    pub fn sub(&self, rhs: &Value) -> Result<Value, Error> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
            _ => self.float_op(rhs, "subtract", |a, b| a - b),
        }
    }

    pub fn mul(&self, rhs: &Value) -> Result<Value, Error> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
            _ => self.float_op(rhs, "multiply", |a, b| a * b),
        }
    }

    pub fn div(&self, rhs: &Value) -> Result<Value, Error> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    return Err(Error::new(ErrorKind::Usage).with_message("division by zero"));
                }
                Ok(Value::Int(a.wrapping_div(*b)))
            }
            _ => self.float_op(rhs, "divide", |a, b| a / b),
        }
    }

    pub fn rem(&self, rhs: &Value) -> Result<Value, Error> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) if *b != 0 => Ok(Value::Int(a.wrapping_rem(*b))),
            (Value::Int(_), Value::Int(_)) => {
                Err(Error::new(ErrorKind::Usage).with_message("division by zero"))
            }
            _ => Err(self.binary_type_error(rhs, "take remainder of")),
        }
    }

    pub fn neg(&self) -> Result<Value, Error> {
        match self {
            Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(Error::new(ErrorKind::Type)
                .with_message(format!("cannot negate {}", other.kind_name()))),
        }
    }

    pub fn bit_and(&self, rhs: &Value) -> Result<Value, Error> {
        self.int_op(rhs, "and", |a, b| a & b)
    }

    pub fn bit_or(&self, rhs: &Value) -> Result<Value, Error> {
        self.int_op(rhs, "or", |a, b| a | b)
    }

    pub fn bit_xor(&self, rhs: &Value) -> Result<Value, Error> {
        self.int_op(rhs, "xor", |a, b| a ^ b)
    }

    fn float_op(
        &self,
        rhs: &Value,
        verb: &str,
        op: impl Fn(f64, f64) -> f64,
    ) -> Result<Value, Error> {
        if self.is_number() && rhs.is_number() {
            let a = self.cast_float()?;
            let b = rhs.cast_float()?;
            return Ok(Value::Float(op(a, b)));
        }
        Err(self.binary_type_error(rhs, verb))
    }

    fn int_op(
        &self,
        rhs: &Value,
        verb: &str,
        op: impl Fn(i64, i64) -> i64,
    ) -> Result<Value, Error> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(op(*a, *b))),
            _ => Err(self.binary_type_error(rhs, verb)),
        }
    }

    fn binary_type_error(&self, rhs: &Value, verb: &str) -> Error {
        Error::new(ErrorKind::Type).with_message(format!(
            "cannot {verb} {} and {}",
            self.kind_name(),
            rhs.kind_name()
        ))
    }
}

fn cast_error(value: &Value, target: &str) -> Error {
    Error::new(ErrorKind::Type)
        .with_message(format!("cannot cast {} to {target}", value.kind_name()))
}

fn method_not_found(value: &Value, name: &str) -> Error {
    Error::new(ErrorKind::NotFound)
        .with_message(format!("{} has no method {name}", value.kind_name()))
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Buffer(a), Value::Buffer(b)) => a.as_slice() == b.as_slice(),
            (Value::Array(a), Value::Array(b)) => {
                Arc::ptr_eq(a, b) || *read(a) == *read(b)
            }
            (Value::Object(a), Value::Object(b)) => {
                Arc::ptr_eq(a, b) || *read(a) == *read(b)
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            _ if self.is_number() && other.is_number() => {
                let a = self.cast_float().ok()?;
                let b = other.cast_float().ok()?;
                a.partial_cmp(&b)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write_float(f, *v),
            Value::Str(s) => write_escaped(f, s),
            Value::Buffer(b) => write!(f, "\"<buffer {} bytes>\"", b.len()),
            Value::Array(items) => {
                f.write_str("[")?;
                for (idx, item) in read(items).iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(map) => {
                f.write_str("{")?;
                for (idx, (key, item)) in read(map).iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write_escaped(f, key)?;
                    f.write_str(":")?;
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            Value::Function(func) => write!(f, "\"<function {}>\"", func.name()),
            Value::Class(class) => write!(f, "\"<class {}>\"", class.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{self}>", self.kind_name())
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{v}")
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_fmt(format_args!("{c}"))?,
        }
    }
    f.write_str("\"")
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Buffer> for Value {
    fn from(v: Buffer) -> Self {
        Value::Buffer(v)
    }
}

impl From<Function> for Value {
    fn from(v: Function) -> Self {
        Value::Function(Arc::new(v))
    }
}

impl From<Arc<Class>> for Value {
    fn from(v: Arc<Class>) -> Self {
        Value::Class(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::from_items(v)
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Self {
        Value::from_entries(v)
    }
}
