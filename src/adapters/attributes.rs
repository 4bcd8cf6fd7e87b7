use serde_json::{Map, Value};

/// Attribute name → kind table published by a module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeTable {
    kinds: Map<String, Value>,
}

impl AttributeTable {
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(kinds)) => Ok(Self { kinds }),
            Ok(other) => Err(format!("attribute table must be a JSON object, got {}", other)),
            Err(e) => Err(format!("attribute table is not valid JSON: {}", e)),
        }
    }

    /// Kind of `name`, or `None` when the module has no such attribute.
    pub fn kind(&self, name: &str) -> Option<String> {
        self.kinds.get(name).map(|kind| match kind {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.kinds.keys().cloned().collect()
    }
}
