use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One labelled section of an agent's core memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub label: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl MemoryBlock {
    /// Reads blocks from a core-memory response: either `{"blocks": [...]}`
    /// or a bare array. Entries without a label are skipped.
    pub fn from_response(body: Value) -> Vec<Self> {
        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut object) => match object.remove("blocks") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()
    }
}
