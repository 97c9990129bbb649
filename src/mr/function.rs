//! The example application exercising the engine: word count over plain
//! text files. A different map/reduce pair could be substituted via
//! `worker::MapFn`/`worker::ReduceFn` without touching anything else in
//! this crate.

/// Word Count application
pub mod wc {
    use crate::mr::codec::KeyValue;

    pub fn map(_filename: &str, contents: &str) -> Vec<KeyValue> {
        contents
            .split_whitespace()
            .map(|word| KeyValue::new(word, "1"))
            .collect()
    }

    pub fn reduce(_key: &str, values: Vec<&str>) -> String {
        values.len().to_string()
    }
}
