use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("No module named '{module}' under {root}")]
    ModuleNotFound { module: String, root: String },

    #[error("Failed to load module '{module}' from {path}: {message}")]
    ModuleLoad {
        module: String,
        path: String,
        message: String,
    },

    #[error("module '{module}' has no attribute '{name}'")]
    AttributeNotFound { module: String, name: String },

    #[error("'{module}.{name}' is not callable (found {kind})")]
    NotCallable {
        module: String,
        name: String,
        kind: String,
    },

    #[error("Malformed event input: {message}")]
    MalformedInput { message: String },

    #[error("{message}")]
    HandlerExecution {
        handler: String,
        message: String,
        error_type: Option<String>,
        stack: Vec<String>,
    },

    #[error("Result is not JSON serializable: {message}")]
    NotSerializable { message: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidArgument {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Usage,
    Resolution,
    Input,
    Execution,
    Output,
}

impl InvokeError {
    pub fn handler_failure(handler: &str, message: impl Into<String>) -> Self {
        InvokeError::HandlerExecution {
            handler: handler.to_string(),
            message: message.into(),
            error_type: None,
            stack: Vec::new(),
        }
    }

    /// Error kind name as shown in the error report.
    pub fn kind(&self) -> &'static str {
        match self {
            InvokeError::ModuleNotFound { .. } => "ModuleNotFoundError",
            InvokeError::ModuleLoad { .. } => "ModuleLoadError",
            InvokeError::AttributeNotFound { .. } => "AttributeNotFoundError",
            InvokeError::NotCallable { .. } => "NotCallableError",
            InvokeError::MalformedInput { .. } => "MalformedInputError",
            InvokeError::HandlerExecution { .. } => "HandlerExecutionError",
            InvokeError::NotSerializable { .. } => "NotSerializableError",
            InvokeError::InvalidArgument { .. } => "InvalidArgumentError",
            InvokeError::Io(_) => "IoError",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            InvokeError::InvalidArgument { .. } => ErrorCategory::Usage,
            InvokeError::ModuleNotFound { .. }
            | InvokeError::ModuleLoad { .. }
            | InvokeError::AttributeNotFound { .. }
            | InvokeError::NotCallable { .. } => ErrorCategory::Resolution,
            InvokeError::MalformedInput { .. } => ErrorCategory::Input,
            InvokeError::HandlerExecution { .. } => ErrorCategory::Execution,
            InvokeError::NotSerializable { .. } | InvokeError::Io(_) => ErrorCategory::Output,
        }
    }

    /// 用法錯誤與 argparse 一致回傳 2，其餘一律 1
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Usage => 2,
            _ => 1,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            InvokeError::ModuleNotFound { .. } => {
                "Run invoke from the service directory and pass the module path without its extension (e.g. handlers/users)".to_string()
            }
            InvokeError::ModuleLoad { .. } => {
                "Check that the module is built for this platform and exports the handler ABI".to_string()
            }
            InvokeError::AttributeNotFound { .. } => {
                "Check the handler name; it must match an exported function of the module".to_string()
            }
            InvokeError::NotCallable { .. } => {
                "The handler name must refer to a function, not a value".to_string()
            }
            InvokeError::MalformedInput { .. } => {
                "Pipe a single JSON document on stdin, e.g. echo '{}' | invoke <path> <name>".to_string()
            }
            InvokeError::HandlerExecution { .. } => {
                "The handler itself failed; see the error message and stack trace above".to_string()
            }
            InvokeError::NotSerializable { .. } => {
                "Return only JSON values (objects, arrays, strings, numbers, booleans, null)".to_string()
            }
            InvokeError::InvalidArgument { .. } => "Run invoke --help for usage".to_string(),
            InvokeError::Io(_) => "Check that stdin and stdout are open and writable".to_string(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        match self {
            InvokeError::HandlerExecution {
                message,
                error_type,
                stack,
                ..
            } => ErrorReport {
                error_message: message.clone(),
                error_type: error_type
                    .clone()
                    .unwrap_or_else(|| self.kind().to_string()),
                stack_trace: stack.clone(),
            },
            _ => ErrorReport {
                error_message: self.to_string(),
                error_type: self.kind().to_string(),
                stack_trace: Vec::new(),
            },
        }
    }
}

impl From<serde_json::Error> for InvokeError {
    fn from(err: serde_json::Error) -> Self {
        InvokeError::MalformedInput {
            message: err.to_string(),
        }
    }
}

/// Error document written to stderr when an invocation fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<String>,
}

pub type Result<T> = std::result::Result<T, InvokeError>;
