use crate::utils::error::Result;
use crate::utils::validation::{validate_no_nul, validate_non_empty_string, validate_path_segment};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Slash-delimited module path as given on the command line (`math/ops`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModulePath {
    raw: String,
    segments: Vec<String>,
}

impl ModulePath {
    pub fn parse(raw: &str) -> Result<Self> {
        validate_non_empty_string("handler_path", raw)?;
        validate_no_nul("handler_path", raw)?;

        let segments = raw
            .split('/')
            .map(|segment| {
                validate_path_segment("handler_path", raw, segment)?;
                Ok(segment.to_string())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, i.e. the module's own name without its parents.
    pub fn stem(&self) -> &str {
        // parse() guarantees at least one segment
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Dotted module name (`math.ops`).
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    /// Directory holding the module, relative to the search root.
    pub fn parent_dir(&self) -> PathBuf {
        self.segments[..self.segments.len() - 1].iter().collect()
    }
}

impl FromStr for ModulePath {
    type Err = crate::utils::error::InvokeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub module_path: ModulePath,
    pub function_name: String,
}

impl InvocationRequest {
    pub fn new(module_path: &str, function_name: &str) -> Result<Self> {
        validate_non_empty_string("handler_name", function_name)?;
        validate_no_nul("handler_name", function_name)?;

        Ok(Self {
            module_path: ModulePath::parse(module_path)?,
            function_name: function_name.to_string(),
        })
    }

    /// Fully qualified handler name used in logs and error reports.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module_path.dotted(), self.function_name)
    }
}
