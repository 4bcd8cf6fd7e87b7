use crate::utils::error::{InvokeError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: &str, reason: impl Into<String>) -> InvokeError {
    InvokeError::InvalidArgument {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_no_nul(field_name: &str, value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(invalid(field_name, value, "Value contains null bytes"));
    }
    Ok(())
}

/// Checks one segment of a slash-delimited module path.
pub fn validate_path_segment(field_name: &str, path: &str, segment: &str) -> Result<()> {
    match segment {
        "" => Err(invalid(
            field_name,
            path,
            "Module path has an empty segment (leading, trailing or doubled '/')",
        )),
        "." | ".." => Err(invalid(
            field_name,
            path,
            format!("Relative segment '{}' is not allowed", segment),
        )),
        s if s.contains('\\') => Err(invalid(
            field_name,
            path,
            "Use '/' to separate module path segments",
        )),
        s if s.contains('.') => Err(invalid(
            field_name,
            path,
            format!("Segment '{}' contains '.'; omit the file extension", s),
        )),
        _ => Ok(()),
    }
}
