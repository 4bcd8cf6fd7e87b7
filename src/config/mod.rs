use crate::domain::model::InvocationRequest;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "invoke", version)]
#[command(about = "Runs a Lambda entry point (handler) with an event read from stdin")]
pub struct InvokeConfig {
    /// Path to the module containing the handler function, omitting the extension. IE: "path/to/module"
    pub handler_path: String,

    /// Name of the handler function
    pub handler_name: String,
}

impl InvokeConfig {
    pub fn to_request(&self) -> Result<InvocationRequest> {
        InvocationRequest::new(&self.handler_path, &self.handler_name)
    }
}

impl Validate for InvokeConfig {
    fn validate(&self) -> Result<()> {
        self.to_request().map(|_| ())
    }
}
