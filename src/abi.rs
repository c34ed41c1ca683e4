//! Purpose: C ABI bridge for bindings (libsvar).
//! Exports: C-callable value/module functions and buffer/error helpers.
//! Role: Stable ABI surface for non-Rust hosts.
//! Invariants: JSON bytes in/out; opaque handles; explicit free functions.
//! Invariants: Error kinds map 1:1 with core error kinds.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::Value;
use crate::json;
use crate::plugin::Module;

#[repr(C)]
pub struct sv_value {
    value: Value,
}

#[repr(C)]
pub struct sv_module {
    module: Module,
}

#[repr(C)]
pub struct sv_buf {
    data: *mut u8,
    len: usize,
}

#[repr(C)]
pub struct sv_error {
    kind: i32,
    message: *mut c_char,
    path: *mut c_char,
    symbol: *mut c_char,
    hint: *mut c_char,
}

#[unsafe(no_mangle)]
pub extern "C" fn sv_value_parse_json(
    json_bytes: *const u8,
    json_len: usize,
    out_value: *mut *mut sv_value,
    out_err: *mut *mut sv_error,
) -> i32 {
    if out_value.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("out_value is null"),
        );
    }
    let value = match parse_json_bytes(json_bytes, json_len) {
        Ok(value) => value,
        Err(err) => return fail(out_err, err),
    };
    let handle = Box::new(sv_value { value });
    unsafe {
        *out_value = Box::into_raw(handle);
    }
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn sv_value_dump_json(
    value: *mut sv_value,
    pretty: u32,
    out_buf: *mut sv_buf,
    out_err: *mut *mut sv_error,
) -> i32 {
    let value = match borrow_value(value, out_err) {
        Ok(value) => value,
        Err(code) => return code,
    };
    let dumped = if pretty != 0 {
        json::dump_pretty(&value.value)
    } else {
        json::dump(&value.value)
    };
    match dumped {
        Ok(text) => {
            if let Err(err) = write_buf(out_buf, text.into_bytes()) {
                return fail(out_err, err);
            }
            0
        }
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn sv_value_free(value: *mut sv_value) {
    if value.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(value));
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn sv_module_load(
    spec: *const c_char,
    out_module: *mut *mut sv_module,
    out_err: *mut *mut sv_error,
) -> i32 {
    if out_module.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("out_module is null"),
        );
    }
    let spec = match parse_c_str(spec, "spec") {
        Ok(spec) => spec,
        Err(err) => return fail(out_err, err),
    };
    let module = match Module::load(&spec) {
        Ok(module) => module,
        Err(err) => return fail(out_err, err),
    };
    let handle = Box::new(sv_module { module });
    unsafe {
        *out_module = Box::into_raw(handle);
    }
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn sv_module_get_json(
    module: *mut sv_module,
    name: *const c_char,
    out_buf: *mut sv_buf,
    out_err: *mut *mut sv_error,
) -> i32 {
    let module = match borrow_module(module, out_err) {
        Ok(module) => module,
        Err(code) => return code,
    };
    let name = match parse_c_str(name, "name") {
        Ok(name) => name,
        Err(err) => return fail(out_err, err),
    };
    let member = match module.module.get(&name) {
        Ok(member) => member,
        Err(err) => return fail(out_err, err),
    };
    let text = match json::dump(&member) {
        Ok(text) => text,
        Err(err) => return fail(out_err, err),
    };
    if let Err(err) = write_buf(out_buf, text.into_bytes()) {
        return fail(out_err, err);
    }
    0
}

/// Calls a module function. `args_json` must be a JSON array; the result
/// comes back as JSON bytes.
#[unsafe(no_mangle)]
pub extern "C" fn sv_module_call_json(
    module: *mut sv_module,
    name: *const c_char,
    args_json: *const u8,
    args_len: usize,
    out_buf: *mut sv_buf,
    out_err: *mut *mut sv_error,
) -> i32 {
    let module = match borrow_module(module, out_err) {
        Ok(module) => module,
        Err(code) => return code,
    };
    let name = match parse_c_str(name, "name") {
        Ok(name) => name,
        Err(err) => return fail(out_err, err),
    };
    let args_value = match parse_json_bytes(args_json, args_len) {
        Ok(value) => value,
        Err(err) => return fail(out_err, err),
    };
    if !args_value.is_array() {
        return fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("args_json must be a json array"),
        );
    }
    let args = args_value.items();
    let result = match module.module.call(&name, &args) {
        Ok(result) => result,
        Err(err) => return fail(out_err, err),
    };
    let text = match json::dump(&result) {
        Ok(text) => text,
        Err(err) => return fail(out_err, err),
    };
    if let Err(err) = write_buf(out_buf, text.into_bytes()) {
        return fail(out_err, err);
    }
    0
}

#[unsafe(no_mangle)]
pub extern "C" fn sv_module_free(module: *mut sv_module) {
    if module.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(module));
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn sv_buf_free(buf: *mut sv_buf) {
    if buf.is_null() {
        return;
    }
    unsafe {
        let buf = &mut *buf;
        if !buf.data.is_null() && buf.len != 0 {
            drop(Vec::from_raw_parts(buf.data, buf.len, buf.len));
        }
        buf.data = ptr::null_mut();
        buf.len = 0;
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn sv_error_free(err: *mut sv_error) {
    if err.is_null() {
        return;
    }
    unsafe {
        let err = Box::from_raw(err);
        for text in [err.message, err.path, err.symbol, err.hint] {
            if !text.is_null() {
                drop(CString::from_raw(text));
            }
        }
    }
}

fn borrow_value<'a>(
    value: *mut sv_value,
    out_err: *mut *mut sv_error,
) -> Result<&'a mut sv_value, i32> {
    if value.is_null() {
        return Err(fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("value is null"),
        ));
    }
    unsafe { Ok(&mut *value) }
}

fn borrow_module<'a>(
    module: *mut sv_module,
    out_err: *mut *mut sv_error,
) -> Result<&'a mut sv_module, i32> {
    if module.is_null() {
        return Err(fail(
            out_err,
            Error::new(ErrorKind::Usage).with_message("module is null"),
        ));
    }
    unsafe { Ok(&mut *module) }
}

fn parse_c_str(input: *const c_char, what: &str) -> Result<String, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{what} is null")));
    }
    unsafe { CStr::from_ptr(input) }
        .to_str()
        .map(str::to_string)
        .map_err(|_| Error::new(ErrorKind::Usage).with_message(format!("{what} is not valid UTF-8")))
}

fn parse_json_bytes(bytes: *const u8, len: usize) -> Result<Value, Error> {
    if bytes.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message("json bytes are null"));
    }
    let slice = unsafe { std::slice::from_raw_parts(bytes, len) };
    let text = std::str::from_utf8(slice).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid json utf-8")
            .with_source(err)
    })?;
    json::parse_str(text)
}

fn write_buf(out_buf: *mut sv_buf, bytes: Vec<u8>) -> Result<(), Error> {
    if out_buf.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message("out_buf is null"));
    }
    unsafe {
        let buf = &mut *out_buf;
        let mut data = bytes.into_boxed_slice();
        buf.len = data.len();
        buf.data = data.as_mut_ptr();
        std::mem::forget(data);
    }
    Ok(())
}

fn fail(out_err: *mut *mut sv_error, err: Error) -> i32 {
    if out_err.is_null() {
        return -1;
    }
    let error = Box::new(sv_error {
        kind: error_kind_code(err.kind()),
        message: to_c_string(err.message().unwrap_or("")),
        path: err
            .path()
            .map(|path| to_c_string(path.to_string_lossy().as_ref()))
            .unwrap_or(ptr::null_mut()),
        symbol: err.symbol().map(to_c_string).unwrap_or(ptr::null_mut()),
        hint: err.hint().map(to_c_string).unwrap_or(ptr::null_mut()),
    });
    unsafe {
        *out_err = Box::into_raw(error);
    }
    -1
}

fn to_c_string(input: &str) -> *mut c_char {
    CString::new(input)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}

fn error_kind_code(kind: ErrorKind) -> i32 {
    crate::core::error::to_exit_code(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_dump_round_trip() {
        let json = br#"{"i":1,"s":"hello"}"#;
        let mut value: *mut sv_value = ptr::null_mut();
        let mut err: *mut sv_error = ptr::null_mut();
        assert_eq!(
            sv_value_parse_json(json.as_ptr(), json.len(), &mut value, &mut err),
            0
        );

        let mut buf = sv_buf {
            data: ptr::null_mut(),
            len: 0,
        };
        assert_eq!(sv_value_dump_json(value, 0, &mut buf, &mut err), 0);
        let text = unsafe { std::slice::from_raw_parts(buf.data, buf.len) };
        assert_eq!(text, br#"{"i":1,"s":"hello"}"#);

        sv_buf_free(&mut buf);
        sv_value_free(value);
    }

    #[test]
    fn invalid_json_produces_error() {
        let json = br#"{"i":}"#;
        let mut value: *mut sv_value = ptr::null_mut();
        let mut err: *mut sv_error = ptr::null_mut();
        assert_eq!(
            sv_value_parse_json(json.as_ptr(), json.len(), &mut value, &mut err),
            -1
        );
        assert!(!err.is_null());
        sv_error_free(err);
    }

    #[test]
    fn module_call_through_abi() {
        let spec = std::ffi::CString::new("sample").unwrap();
        let mut module: *mut sv_module = ptr::null_mut();
        let mut err: *mut sv_error = ptr::null_mut();
        assert_eq!(sv_module_load(spec.as_ptr(), &mut module, &mut err), 0);

        let name = std::ffi::CString::new("add").unwrap();
        let args = br#"[34, 3]"#;
        let mut buf = sv_buf {
            data: ptr::null_mut(),
            len: 0,
        };
        assert_eq!(
            sv_module_call_json(
                module,
                name.as_ptr(),
                args.as_ptr(),
                args.len(),
                &mut buf,
                &mut err
            ),
            0
        );
        let text = unsafe { std::slice::from_raw_parts(buf.data, buf.len) };
        assert_eq!(text, b"37");

        sv_buf_free(&mut buf);
        sv_module_free(module);
    }
}
