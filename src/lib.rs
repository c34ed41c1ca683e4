//! Purpose: Shared library crate used by the `svar` CLI, plugins, and tests.
//! Exports: `core` (values, functions, classes, buffers, errors), codecs, plugin loader.
//! Role: The runtime every svar module links against; also the cdylib plugins dlopen.
//! Invariants: Plugin entry symbols are declared through `svar_module!` only.
//! Invariants: JSON and CBOR conversions go through the codec modules, not ad hoc.

pub mod abi;
pub mod cbor;
pub mod core;
pub mod json;
pub mod plugin;
pub mod sample;
pub mod settings;
