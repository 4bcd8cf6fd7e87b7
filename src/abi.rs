//! C ABI shared by the invoker and natively compiled handler modules.
//!
//! A native module is a shared library exporting, per handler,
//! `extern "C" fn(event_json: *const c_char) -> *mut c_char`. The returned
//! string is a result envelope:
//!
//! ```text
//! {"ok": true, "result": <value>}
//! {"ok": false, "kind": "handler", "errorMessage": "...", "errorType": "...", "stackTrace": [...]}
//! ```
//!
//! Optional exports: `invoke_free` releases returned strings and
//! `invoke_module_attributes` returns a static JSON object mapping attribute
//! names to kinds (`"function"` for handlers). [`export_handler!`] generates
//! all of them from plain Rust functions.

use crate::utils::error::{InvokeError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

pub type HandlerFn = unsafe extern "C" fn(event_json: *const c_char) -> *mut c_char;
pub type FreeFn = unsafe extern "C" fn(ptr: *mut c_char);
pub type AttributesFn = unsafe extern "C" fn() -> *const c_char;

pub const FREE_SYMBOL: &[u8] = b"invoke_free\0";
pub const ATTRIBUTES_SYMBOL: &[u8] = b"invoke_module_attributes\0";

/// Attribute kind marking a callable handler.
pub const FUNCTION_KIND: &str = "function";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The handler itself failed.
    Handler,
    /// The handler succeeded but its result could not be serialized.
    Result,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<String>,
}

impl Envelope {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            kind: None,
            error_message: None,
            error_type: None,
            stack_trace: Vec::new(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            kind: Some(kind),
            error_message: Some(message.into()),
            error_type: Some(error_type.into()),
            stack_trace: Vec::new(),
        }
    }

    /// Turns a decoded envelope into the handler's result or the matching error.
    pub fn into_result(self, handler: &str) -> Result<Value> {
        if self.ok {
            return Ok(self.result.unwrap_or(Value::Null));
        }

        let message = self
            .error_message
            .unwrap_or_else(|| format!("handler {} reported a failure", handler));
        match self.kind.unwrap_or(FailureKind::Handler) {
            FailureKind::Result => Err(InvokeError::NotSerializable { message }),
            FailureKind::Handler => Err(InvokeError::HandlerExecution {
                handler: handler.to_string(),
                message,
                error_type: self.error_type,
                stack: self.stack_trace,
            }),
        }
    }
}

/// Decodes the text a native handler returned.
pub fn decode_envelope(handler: &str, text: &str) -> Result<Value> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| InvokeError::NotSerializable {
            message: format!("handler {} returned invalid JSON: {}", handler, e),
        })?;
    envelope.into_result(handler)
}

/// Runs a typed Rust handler behind the C ABI and returns an owned envelope
/// string, to be released with [`free_string`].
///
/// # Safety
///
/// `event_json` must be null or point to a NUL-terminated string that stays
/// valid for the duration of the call.
pub unsafe fn call_handler<Ev, T, Er, F>(event_json: *const c_char, handler: F) -> *mut c_char
where
    Ev: DeserializeOwned,
    T: Serialize,
    Er: fmt::Display,
    F: FnOnce(Ev) -> std::result::Result<T, Er>,
{
    // unwinding across extern "C" aborts the host
    let envelope = match catch_unwind(AssertUnwindSafe(|| unsafe { run_handler(event_json, handler) })) {
        Ok(envelope) => envelope,
        Err(payload) => Envelope::failure(
            FailureKind::Handler,
            panic_message(payload.as_ref()),
            "Panic",
        ),
    };
    encode(&envelope)
}

unsafe fn run_handler<Ev, T, Er, F>(event_json: *const c_char, handler: F) -> Envelope
where
    Ev: DeserializeOwned,
    T: Serialize,
    Er: fmt::Display,
    F: FnOnce(Ev) -> std::result::Result<T, Er>,
{
    if event_json.is_null() {
        return Envelope::failure(FailureKind::Handler, "event pointer is null", "InvalidEvent");
    }
    let text = match unsafe { CStr::from_ptr(event_json) }.to_str() {
        Ok(text) => text,
        Err(e) => {
            return Envelope::failure(
                FailureKind::Handler,
                format!("event is not valid UTF-8: {}", e),
                "InvalidEvent",
            )
        }
    };
    let event: Ev = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            return Envelope::failure(
                FailureKind::Handler,
                format!("event does not match the handler input: {}", e),
                "InvalidEvent",
            )
        }
    };

    match handler(event) {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(value) => Envelope::success(value),
            Err(e) => Envelope::failure(FailureKind::Result, e.to_string(), "NotSerializableError"),
        },
        Err(err) => Envelope::failure(FailureKind::Handler, err.to_string(), short_type_name::<Er>()),
    }
}

fn encode(envelope: &Envelope) -> *mut c_char {
    serde_json::to_string(envelope)
        .ok()
        .and_then(|text| CString::new(text).ok())
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

/// Releases a string returned by [`call_handler`].
///
/// # Safety
///
/// `ptr` must be null or come from [`call_handler`] and not be freed twice.
pub unsafe fn free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr) });
}

/// Builds the `invoke_module_attributes` document: every handler is a
/// `"function"`, `others` are non-callable attributes with their kind.
pub fn attributes_json(handlers: &[&str], others: &[(&str, &str)]) -> CString {
    let map: Map<String, Value> = handlers
        .iter()
        .map(|name| (*name, FUNCTION_KIND))
        .chain(others.iter().copied())
        .map(|(name, kind)| (name.to_string(), Value::String(kind.to_string())))
        .collect();
    CString::new(Value::Object(map).to_string()).unwrap_or_default()
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Exports Rust functions as native handlers of a `cdylib` module.
///
/// Names after `;` are declared as non-callable attributes of the given kind.
///
/// ```ignore
/// fn add(event: serde_json::Value) -> anyhow::Result<i64> { ... }
///
/// invoke_local::export_handler!(add => add; VERSION: "string");
/// ```
#[macro_export]
macro_rules! export_handler {
    (
        $($symbol:ident => $handler:path),+ $(,)?
        $(; $($attribute:ident : $kind:literal),+ $(,)?)?
    ) => {
        $(
            #[no_mangle]
            #[allow(clippy::not_unsafe_ptr_arg_deref)]
            pub extern "C" fn $symbol(
                event_json: *const ::std::os::raw::c_char,
            ) -> *mut ::std::os::raw::c_char {
                // SAFETY: the invoker passes a NUL-terminated JSON string.
                unsafe { $crate::abi::call_handler(event_json, $handler) }
            }
        )+

        #[no_mangle]
        pub unsafe extern "C" fn invoke_free(ptr: *mut ::std::os::raw::c_char) {
            unsafe { $crate::abi::free_string(ptr) }
        }

        #[no_mangle]
        pub extern "C" fn invoke_module_attributes() -> *const ::std::os::raw::c_char {
            static ATTRIBUTES: ::std::sync::OnceLock<::std::ffi::CString> =
                ::std::sync::OnceLock::new();
            ATTRIBUTES
                .get_or_init(|| {
                    $crate::abi::attributes_json(
                        &[$(stringify!($symbol)),+],
                        &[$($((stringify!($attribute), $kind)),+)?],
                    )
                })
                .as_ptr()
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn call<Ev, T, Er, F>(event: &str, handler: F) -> Envelope
    where
        Ev: DeserializeOwned,
        T: Serialize,
        Er: fmt::Display,
        F: FnOnce(Ev) -> std::result::Result<T, Er>,
    {
        let input = CString::new(event).unwrap();
        unsafe {
            let out = call_handler(input.as_ptr(), handler);
            assert!(!out.is_null());
            let text = CStr::from_ptr(out).to_str().unwrap().to_string();
            free_string(out);
            serde_json::from_str(&text).unwrap()
        }
    }

    #[test]
    fn test_success_envelope() {
        let envelope = call(r#"{"a": 2, "b": 3}"#, |event: Value| {
            Ok::<_, String>(event["a"].as_i64().unwrap_or(0) + event["b"].as_i64().unwrap_or(0))
        });
        assert_eq!(envelope, Envelope::success(json!(5)));
        assert_eq!(envelope.into_result("math.ops.add").unwrap(), json!(5));
    }

    #[test]
    fn test_handler_error_envelope() {
        let envelope = call("{}", |_event: Value| Err::<Value, _>("boom".to_string()));
        assert!(!envelope.ok);
        assert_eq!(envelope.kind, Some(FailureKind::Handler));
        assert_eq!(envelope.error_type.as_deref(), Some("String"));

        let err = envelope.into_result("m.h").unwrap_err();
        assert_eq!(err.kind(), "HandlerExecutionError");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_typed_event_mismatch_is_handler_failure() {
        #[derive(Deserialize)]
        struct Pair {
            a: i64,
        }
        let envelope = call(r#"{"b": 1}"#, |pair: Pair| Ok::<_, String>(pair.a));
        assert_eq!(envelope.error_type.as_deref(), Some("InvalidEvent"));
    }

    #[test]
    fn test_unserializable_result_envelope() {
        // 非字串鍵的 map 無法轉成 JSON
        let envelope = call("null", |_event: Value| {
            let mut map = BTreeMap::new();
            map.insert((1, 2), "pair");
            Ok::<_, String>(map)
        });
        assert_eq!(envelope.kind, Some(FailureKind::Result));
        let err = envelope.into_result("m.h").unwrap_err();
        assert_eq!(err.kind(), "NotSerializableError");
    }

    #[test]
    fn test_panic_is_caught() {
        let envelope = call("null", |_event: Value| -> std::result::Result<Value, String> {
            panic!("kaboom")
        });
        assert_eq!(envelope.error_message.as_deref(), Some("kaboom"));
        assert_eq!(envelope.error_type.as_deref(), Some("Panic"));
    }

    #[test]
    fn test_null_event_pointer() {
        let out = unsafe { call_handler(ptr::null(), |event: Value| Ok::<_, String>(event)) };
        let text = unsafe { CStr::from_ptr(out) }.to_str().unwrap().to_string();
        unsafe { free_string(out) };
        let err = decode_envelope("m.h", &text).unwrap_err();
        assert!(err.to_string().contains("null"));
    }

    #[test]
    fn test_decode_rejects_invalid_text() {
        let err = decode_envelope("m.h", "{not json").unwrap_err();
        assert_eq!(err.kind(), "NotSerializableError");
    }

    #[test]
    fn test_attributes_json() {
        let doc = attributes_json(&["add", "identity"], &[("VERSION", "string")]);
        let value: Value = serde_json::from_str(doc.to_str().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"add": "function", "identity": "function", "VERSION": "string"})
        );
        assert_eq!(attributes_json(&["add"], &[]).to_str().unwrap(), r#"{"add":"function"}"#);
    }
}
