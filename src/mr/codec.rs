//! Self-delimited `(key, value)` record stream: one `KEY VALUE\n` line per
//! record, decodable purely by scanning for EOF.
//!
//! Values are opaque text to this module; the finalizer is the only
//! consumer that interprets them as integers, and only for the word-count
//! aggregator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Encode records into the newline-delimited wire format.
pub fn encode(records: &[KeyValue]) -> String {
    let mut out = String::new();
    for kv in records {
        out.push_str(&kv.key);
        out.push(' ');
        out.push_str(&kv.value);
        out.push('\n');
    }
    out
}

/// Decode records until EOF. A line without a space separator is skipped,
/// since blank trailing lines are common after a final `\n`.
pub fn decode(contents: &str) -> Vec<KeyValue> {
    contents
        .split('\n')
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(' '))
        .map(|(key, value)| KeyValue::new(key, value))
        .collect()
}
