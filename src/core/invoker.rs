use crate::core::event::read_event;
use crate::core::output::render_result;
use crate::domain::model::InvocationRequest;
use crate::domain::ports::{Attribute, Invocable, Module, ModuleSource};
use crate::utils::error::{InvokeError, Result};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Instant;

pub struct Invoker<S: ModuleSource> {
    source: S,
}

impl<S: ModuleSource> Invoker<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Runs one invocation: resolve module, resolve function, parse the event
    /// from `input`, call the handler and write the rendered result to `output`.
    pub fn run<R: Read, W: Write>(
        &self,
        request: &InvocationRequest,
        input: R,
        mut output: W,
    ) -> Result<()> {
        tracing::info!("🚀 Invoking {}", request.qualified_name());

        let module = self.source.resolve(&request.module_path)?;
        let handler = resolve_function(module.as_ref(), &request.function_name)?;

        let event = read_event(input)?;

        let started = Instant::now();
        let result = handler.invoke(event)?;
        tracing::debug!(
            "Handler {} returned after {:?}",
            request.qualified_name(),
            started.elapsed()
        );

        let rendered = render_result(&result);
        output.write_all(rendered.as_bytes())?;
        output.flush()?;

        tracing::info!("✅ Invocation of {} completed", request.qualified_name());
        Ok(())
    }
}

pub fn resolve_function(module: &dyn Module, name: &str) -> Result<Arc<dyn Invocable>> {
    match module.attribute(name)? {
        Some(Attribute::Callable(handler)) => Ok(handler),
        Some(Attribute::Opaque { kind }) => Err(InvokeError::NotCallable {
            module: module.name().to_string(),
            name: name.to_string(),
            kind,
        }),
        None => Err(InvokeError::AttributeNotFound {
            module: module.name().to_string(),
            name: name.to_string(),
        }),
    }
}
