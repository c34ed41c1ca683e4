//! Purpose: Shared-library module loading and the in-process builtin registry.
//! Exports: `SharedLibrary`, `Module`, `register_builtin`, `ABI_VERSION`, `svar_module!`.
//! Role: Resolves a module spec (builtin name or filesystem path) to a callable value tree.
//! Invariants: A loaded `Module` keeps its library handle alive for the module's lifetime.
//! Invariants: The entry symbols are versioned; a mismatch refuses the plugin.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;

/// Bumped when the `Value` layout crossing the entry symbol changes.
pub const ABI_VERSION: u32 = 0x000301;

pub const VERSION_SYMBOL: &str = "svar_abi_version";
pub const INSTANCE_SYMBOL: &str = "svar_instance";

type VersionFn = unsafe extern "C" fn() -> u32;
type InstanceFn = unsafe extern "C" fn() -> *mut Value;

/// Declares the plugin entry points of a cdylib module. The expression
/// builds the module's root value; the host takes ownership of it.
#[macro_export]
macro_rules! svar_module {
    ($init:expr) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn svar_abi_version() -> u32 {
            $crate::plugin::ABI_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn svar_instance() -> *mut $crate::core::value::Value {
            Box::into_raw(Box::new($init))
        }
    };
}

#[derive(Debug)]
pub struct SharedLibrary {
    lib: libloading::Library,
    path: PathBuf,
}

impl SharedLibrary {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let lib = unsafe { libloading::Library::new(&path) }.map_err(|err| {
            Error::new(ErrorKind::Load)
                .with_message("cannot open shared library")
                .with_path(&path)
                .with_source(err)
        })?;
        Ok(Self { lib, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_symbol(&self, name: &str) -> bool {
        let symbol = [name.as_bytes(), b"\0"].concat();
        unsafe { self.lib.get::<*const ()>(&symbol) }.is_ok()
    }

    fn version(&self) -> Result<u32, Error> {
        let symbol = unsafe { self.lib.get::<VersionFn>(b"svar_abi_version\0") }.map_err(
            |err| {
                Error::new(ErrorKind::Load)
                    .with_message("not a svar module")
                    .with_path(&self.path)
                    .with_symbol(VERSION_SYMBOL)
                    .with_source(err)
            },
        )?;
        Ok(unsafe { symbol() })
    }

    fn instance(&self) -> Result<Value, Error> {
        let symbol = unsafe { self.lib.get::<InstanceFn>(b"svar_instance\0") }.map_err(
            |err| {
                Error::new(ErrorKind::Load)
                    .with_message("module entry symbol missing")
                    .with_path(&self.path)
                    .with_symbol(INSTANCE_SYMBOL)
                    .with_source(err)
            },
        )?;
        let raw = unsafe { symbol() };
        unsafe { take_instance(raw, &self.path) }
    }
}

fn check_abi_version(version: u32, path: &Path) -> Result<(), Error> {
    if version != ABI_VERSION {
        return Err(Error::new(ErrorKind::Load)
            .with_message(format!(
                "module abi {version:#06x} does not match host {ABI_VERSION:#06x}"
            ))
            .with_path(path)
            .with_hint("Rebuild the plugin against this svar version."));
    }
    Ok(())
}

/// `raw` must be null or a `Box` allocation handed over by the plugin.
unsafe fn take_instance(raw: *mut Value, path: &Path) -> Result<Value, Error> {
    if raw.is_null() {
        return Err(Error::new(ErrorKind::Load)
            .with_message("module entry returned null")
            .with_path(path)
            .with_symbol(INSTANCE_SYMBOL));
    }
    Ok(*unsafe { Box::from_raw(raw) })
}

pub struct Module {
    name: String,
    root: Value,
    _lib: Option<SharedLibrary>,
}

impl Module {
    /// Resolves `spec`: a bare name hits the builtin registry, anything
    /// that looks like a path is opened as a shared library.
    pub fn load(spec: &str) -> Result<Self, Error> {
        if !spec.contains(std::path::MAIN_SEPARATOR) && !spec.contains('.') {
            if let Some(root) = builtin(spec) {
                tracing::debug!(module = spec, "resolved builtin module");
                return Ok(Self {
                    name: spec.to_string(),
                    root,
                    _lib: None,
                });
            }
        }

        let library = SharedLibrary::open(spec)?;
        check_abi_version(library.version()?, library.path())?;
        let root = library.instance()?;
        let name = root
            .get_item("__name__")
            .map(|v| v.cast_str())
            .unwrap_or_else(|| file_stem(library.path()));
        tracing::debug!(module = %name, path = %library.path().display(), "loaded plugin");
        Ok(Self {
            name,
            root,
            _lib: Some(library),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Value {
        self.root.clone()
    }

    pub fn get(&self, name: &str) -> Result<Value, Error> {
        self.root.get_item(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("module {} has no member {name}", self.name))
        })
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, Error> {
        self.get(name)?.invoke(args)
    }

    /// Human-readable description of one member or the whole module.
    pub fn doc(&self, key: Option<&str>) -> Result<String, Error> {
        match key {
            Some(key) => Ok(describe(&self.get(key)?)),
            None => {
                let mut out = String::new();
                if let Some(doc) = self.root.get_item("__doc__") {
                    out.push_str(&doc.cast_str());
                    out.push('\n');
                }
                for (name, member) in self.root.entries() {
                    if name.starts_with("__") {
                        continue;
                    }
                    out.push_str(&format!("{name}: {}", describe(&member)));
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                Ok(out)
            }
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Module({})", self.name)
    }
}

fn describe(member: &Value) -> String {
    match member {
        Value::Function(f) => f.to_string(),
        Value::Class(c) => c.to_string(),
        other => other.to_string(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

type BuiltinInit = fn() -> Value;

fn registry() -> &'static RwLock<BTreeMap<String, BuiltinInit>> {
    static REGISTRY: OnceLock<RwLock<BTreeMap<String, BuiltinInit>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = BTreeMap::new();
        map.insert("sample".to_string(), crate::sample::init as BuiltinInit);
        RwLock::new(map)
    })
}

pub fn register_builtin(name: &str, init: BuiltinInit) {
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name.to_string(), init);
}

pub fn builtin(name: &str) -> Option<Value> {
    let init = *registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)?;
    Some(init())
}

pub fn builtin_names() -> Vec<String> {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect()
}
