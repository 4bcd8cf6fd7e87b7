// Adapters layer: concrete module loaders (registry, shared library, executable).

pub mod attributes;
pub mod external;
pub mod native;
pub mod registry;
pub mod resolver;
