//! In-process loader for handler modules compiled as shared libraries.
//!
//! Loads the library with `libloading` and resolves handler symbols that
//! follow the ABI in [`crate::abi`].

use crate::abi::{self, AttributesFn, FreeFn, HandlerFn, FUNCTION_KIND};
use crate::adapters::attributes::AttributeTable;
use crate::domain::ports::{Attribute, Invocable, Module};
use crate::utils::error::{InvokeError, Result};
use libloading::{Library, Symbol};
use serde_json::Value;
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct NativeModule {
    name: String,
    path: PathBuf,
    lib: Arc<Library>,
    attributes: AttributeTable,
    free_fn: Option<FreeFn>,
}

impl NativeModule {
    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let load_error = |message: String| InvokeError::ModuleLoad {
            module: name.to_string(),
            path: path.display().to_string(),
            message,
        };

        match std::fs::metadata(path) {
            Ok(m) if m.is_file() => {}
            _ => return Err(load_error("library path is not a file".to_string())),
        }

        // SAFETY: loading runs the library's initializers; the module is
        // trusted user code by definition.
        let lib = unsafe { Library::new(path) }
            .map_err(|e| load_error(format!("not a loadable shared library: {}", e)))?;

        // 只解析屬性表宣告的名稱，dlsym 也會找到相依函式庫的符號
        let attributes = unsafe { read_attribute_table(&lib) }.map_err(load_error)?;
        let free_fn = unsafe { lib.get::<FreeFn>(abi::FREE_SYMBOL) }
            .ok()
            .map(|sym| *sym);

        tracing::debug!(
            "Loaded native module {} from {} with attributes {:?} (invoke_free: {})",
            name,
            path.display(),
            attributes.names(),
            free_fn.is_some()
        );

        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            lib: Arc::new(lib),
            attributes,
            free_fn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves the symbol of a handler declared in the attribute table.
    fn handler(&self, name: &str) -> Result<Attribute> {
        let missing = |message: String| InvokeError::ModuleLoad {
            module: self.name.clone(),
            path: self.path.display().to_string(),
            message,
        };

        let symbol = CString::new(name)
            .map_err(|_| missing(format!("'{}' is not a valid symbol name", name)))?;
        let call_fn = match unsafe { self.lib.get::<HandlerFn>(symbol.as_bytes_with_nul()) } {
            Ok(sym) => *sym,
            Err(e) => {
                return Err(missing(format!(
                    "'{}' is listed as a function but its symbol is missing: {}",
                    name, e
                )))
            }
        };

        let handler = NativeHandler {
            name: format!("{}.{}", self.name, name),
            call_fn,
            free_fn: self.free_fn,
            _lib: Some(self.lib.clone()),
        };
        Ok(Attribute::Callable(Arc::new(handler)))
    }
}

unsafe fn read_attribute_table(lib: &Library) -> std::result::Result<AttributeTable, String> {
    let sym: Symbol<AttributesFn> = unsafe { lib.get(abi::ATTRIBUTES_SYMBOL) }
        .map_err(|_| "module does not export invoke_module_attributes".to_string())?;
    let raw = unsafe { sym() };
    if raw.is_null() {
        return Err("invoke_module_attributes returned null".to_string());
    }
    let text = unsafe { CStr::from_ptr(raw) }
        .to_str()
        .map_err(|e| format!("invoke_module_attributes returned invalid UTF-8: {}", e))?;
    AttributeTable::parse(text)
}

impl Module for NativeModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn attribute(&self, name: &str) -> Result<Option<Attribute>> {
        match self.attributes.kind(name) {
            None => Ok(None),
            Some(kind) if kind == FUNCTION_KIND => self.handler(name).map(Some),
            Some(kind) => Ok(Some(Attribute::Opaque { kind })),
        }
    }
}

/// A resolved native handler symbol.
pub struct NativeHandler {
    name: String,
    call_fn: HandlerFn,
    free_fn: Option<FreeFn>,
    _lib: Option<Arc<Library>>,
}

impl NativeHandler {
    /// Wraps function pointers that are already linked into the process.
    pub fn from_raw(name: impl Into<String>, call_fn: HandlerFn, free_fn: Option<FreeFn>) -> Self {
        Self {
            name: name.into(),
            call_fn,
            free_fn,
            _lib: None,
        }
    }
}

impl Invocable for NativeHandler {
    fn invoke(&self, event: Value) -> Result<Value> {
        let event_json = CString::new(event.to_string()).map_err(|e| InvokeError::MalformedInput {
            message: format!("event contains a NUL byte: {}", e),
        })?;

        let text = unsafe {
            let out_ptr = (self.call_fn)(event_json.as_ptr());
            if out_ptr.is_null() {
                return Err(InvokeError::handler_failure(
                    &self.name,
                    format!("handler {} returned null", self.name),
                ));
            }
            let text = CStr::from_ptr(out_ptr).to_str().map(str::to_string);

            match self.free_fn {
                Some(free_fn) => free_fn(out_ptr),
                None => libc::free(out_ptr as *mut libc::c_void),
            }
            text
        };

        let text = text.map_err(|e| InvokeError::NotSerializable {
            message: format!("handler {} returned invalid UTF-8: {}", self.name, e),
        })?;
        abi::decode_envelope(&self.name, &text)
    }
}
