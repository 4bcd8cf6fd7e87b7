//! In-process module registry.
//!
//! Modules registered here are addressed by the same slash path used on the
//! command line and take precedence over anything found on disk.

use crate::abi::panic_message;
use crate::domain::model::ModulePath;
use crate::domain::ports::{Attribute, Invocable, Module, ModuleSource};
use crate::utils::error::{InvokeError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

type HandlerFn = dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync;

/// Adapts a Rust closure to [`Invocable`].
pub struct FnHandler {
    name: String,
    f: Box<HandlerFn>,
}

impl FnHandler {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Invocable for FnHandler {
    fn invoke(&self, event: Value) -> Result<Value> {
        match catch_unwind(AssertUnwindSafe(|| (self.f)(event))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(InvokeError::HandlerExecution {
                handler: self.name.clone(),
                message: err.to_string(),
                error_type: None,
                stack: err.chain().skip(1).map(|cause| cause.to_string()).collect(),
            }),
            Err(payload) => Err(InvokeError::HandlerExecution {
                handler: self.name.clone(),
                message: panic_message(payload.as_ref()),
                error_type: Some("Panic".to_string()),
                stack: Vec::new(),
            }),
        }
    }
}

/// A module assembled in Rust from closures and plain values.
#[derive(Clone)]
pub struct StaticModule {
    name: String,
    attributes: HashMap<String, Attribute>,
}

impl StaticModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn function<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let handler = FnHandler::new(format!("{}.{}", self.name, name), f);
        self.attributes
            .insert(name.to_string(), Attribute::Callable(Arc::new(handler)));
        self
    }

    /// Adds a non-callable attribute. Its kind is the JSON type of `value`.
    pub fn value(mut self, name: &str, value: Value) -> Self {
        let kind = json_type_name(&value).to_string();
        self.attributes
            .insert(name.to_string(), Attribute::Opaque { kind });
        self
    }
}

impl Module for StaticModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn attribute(&self, name: &str) -> Result<Option<Attribute>> {
        Ok(self.attributes.get(name).cloned())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module` under a slash path such as `math/ops`.
    pub fn register<M: Module + 'static>(&mut self, path: &str, module: M) {
        self.modules.insert(path.to_string(), Arc::new(module));
    }

    pub fn get(&self, path: &ModulePath) -> Option<Arc<dyn Module>> {
        self.modules.get(path.as_str()).cloned()
    }

    pub fn registered_paths(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }
}

impl ModuleSource for ModuleRegistry {
    fn resolve(&self, path: &ModulePath) -> Result<Arc<dyn Module>> {
        self.get(path).ok_or_else(|| InvokeError::ModuleNotFound {
            module: path.dotted(),
            root: "the module registry".to_string(),
        })
    }
}
