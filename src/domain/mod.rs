// Domain layer: request model and the ports (traits) the loaders implement.

pub mod model;
pub mod ports;
