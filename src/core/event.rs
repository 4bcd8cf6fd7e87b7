use crate::utils::error::{InvokeError, Result};
use serde_json::Value;
use std::io::Read;

/// Reads the whole input stream and parses it as a single JSON document.
pub fn read_event<R: Read>(mut input: R) -> Result<Value> {
    let mut buf = Vec::new();
    input.read_to_end(&mut buf)?;
    tracing::debug!("Read {} bytes of event input", buf.len());
    parse_event(&buf)
}

pub fn parse_event(bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(InvokeError::MalformedInput {
            message: "Expecting value: input is empty".to_string(),
        });
    }

    serde_json::from_slice(bytes).map_err(|e| InvokeError::MalformedInput {
        message: e.to_string(),
    })
}
