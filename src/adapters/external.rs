//! Out-of-process handler modules.
//!
//! An external module is an executable speaking JSON over stdio:
//! `<exe> describe` prints its attribute table, `<exe> call <name>` reads the
//! event on stdin and prints the result on stdout.

use crate::abi::{Envelope, FUNCTION_KIND};
use crate::adapters::attributes::AttributeTable;
use crate::domain::ports::{Attribute, Invocable, Module};
use crate::utils::error::{InvokeError, Result};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

pub struct ExternalModule {
    name: String,
    exe: PathBuf,
    attributes: AttributeTable,
}

impl ExternalModule {
    /// Runs `<exe> describe` and keeps the attribute table it prints.
    pub fn load(name: &str, exe: &Path) -> Result<Self> {
        let load_error = |message: String| InvokeError::ModuleLoad {
            module: name.to_string(),
            path: exe.display().to_string(),
            message,
        };

        let output = Command::new(exe)
            .arg("describe")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| load_error(format!("spawn failed: {}", e)))?;

        if !output.status.success() {
            return Err(load_error(format!(
                "describe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let attributes = AttributeTable::parse(&stdout).map_err(load_error)?;
        tracing::debug!(
            "Loaded external module {} from {} with attributes {:?}",
            name,
            exe.display(),
            attributes.names()
        );

        Ok(Self {
            name: name.to_string(),
            exe: exe.to_path_buf(),
            attributes,
        })
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }
}

impl Module for ExternalModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn attribute(&self, name: &str) -> Result<Option<Attribute>> {
        Ok(self.attributes.kind(name).map(|kind| {
            if kind == FUNCTION_KIND {
                Attribute::Callable(Arc::new(ExternalHandler {
                    name: format!("{}.{}", self.name, name),
                    function: name.to_string(),
                    exe: self.exe.clone(),
                }))
            } else {
                Attribute::Opaque { kind }
            }
        }))
    }
}

pub struct ExternalHandler {
    name: String,
    function: String,
    exe: PathBuf,
}

impl Invocable for ExternalHandler {
    fn invoke(&self, event: Value) -> Result<Value> {
        let mut child = Command::new(&self.exe)
            .arg("call")
            .arg(&self.function)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                InvokeError::handler_failure(
                    &self.name,
                    format!("spawn '{}': {}", self.exe.display(), e),
                )
            })?;

        // stdin must be fed concurrently with draining stdout/stderr
        let writer = match child.stdin.take() {
            Some(mut stdin) => {
                let body = serde_json::to_vec(&event)
                    .map_err(|e| InvokeError::handler_failure(&self.name, e.to_string()))?;
                let name = self.name.clone();
                Some(thread::spawn(move || {
                    // 子行程可能不讀 stdin 就結束，寫入失敗不視為錯誤
                    if let Err(e) = stdin.write_all(&body) {
                        tracing::debug!("Handler {} did not consume its event: {}", name, e);
                    }
                    // stdin drops here and the child sees EOF
                }))
            }
            None => None,
        };

        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            if writer.join().is_err() {
                tracing::warn!("Event writer for {} panicked", self.name);
            }
        }
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(self.failure(&stdout, &stderr, output.status.to_string()));
        }

        if !stderr.is_empty() {
            // 轉送 handler 的日誌
            eprint!("{}", stderr);
        }

        serde_json::from_str(&stdout).map_err(|e| InvokeError::NotSerializable {
            message: format!("handler {} printed invalid JSON: {}", self.name, e),
        })
    }
}

impl ExternalHandler {
    /// Prefers an error document on stdout, falling back to stderr.
    fn failure(&self, stdout: &str, stderr: &str, status: String) -> InvokeError {
        if let Ok(envelope) = serde_json::from_str::<Envelope>(stdout) {
            if envelope.error_message.is_some() {
                return match envelope.into_result(&self.name) {
                    Err(err) => err,
                    Ok(_) => InvokeError::handler_failure(&self.name, status),
                };
            }
        }

        let mut lines = stderr.lines().filter(|line| !line.trim().is_empty());
        let message = lines
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| format!("handler {} exited with {}", self.name, status));
        InvokeError::HandlerExecution {
            handler: self.name.clone(),
            message,
            error_type: None,
            stack: lines.map(str::to_string).collect(),
        }
    }
}
