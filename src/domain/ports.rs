use crate::domain::model::ModulePath;
use crate::utils::error::Result;
use serde_json::Value;
use std::sync::Arc;

/// Something that can be called with one JSON event and returns one JSON value.
pub trait Invocable: Send + Sync {
    fn invoke(&self, event: Value) -> Result<Value>;
}

/// What a module exposes under a name.
#[derive(Clone)]
pub enum Attribute {
    Callable(Arc<dyn Invocable>),
    Opaque { kind: String },
}

pub trait Module: Send + Sync {
    /// Dotted module name, e.g. `math.ops`.
    fn name(&self) -> &str;

    fn attribute(&self, name: &str) -> Result<Option<Attribute>>;
}

pub trait ModuleSource {
    fn resolve(&self, path: &ModulePath) -> Result<Arc<dyn Module>>;
}
