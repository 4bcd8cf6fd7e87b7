pub mod event;
pub mod invoker;
pub mod output;

pub use crate::domain::model::{InvocationRequest, ModulePath};
pub use crate::domain::ports::{Attribute, Invocable, Module, ModuleSource};
pub use crate::utils::error::Result;
