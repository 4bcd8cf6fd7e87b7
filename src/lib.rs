pub mod abi;
pub mod adapters;
#[cfg(feature = "cli")]
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::InvokeConfig;

pub use adapters::registry::{ModuleRegistry, StaticModule};
pub use adapters::resolver::ModuleResolver;
pub use crate::core::invoker::Invoker;
pub use domain::model::{InvocationRequest, ModulePath};
pub use utils::error::{InvokeError, Result};
