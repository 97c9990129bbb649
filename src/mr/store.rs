//! Flat filesystem namespace for intermediate shards, per-reducer output,
//! and the final merged file.
//!
//! Every write goes through a `.tmp` file followed by a rename so a reader
//! never observes a partially written shard.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::mr::codec::{self, KeyValue};
use crate::mr::error::MrError;

pub fn shard_path(work_dir: &Path, map_index: u32, reduce_index: u32) -> PathBuf {
    work_dir.join(format!("mapreduce-{}-{}.txt", map_index, reduce_index))
}

pub fn output_path(work_dir: &Path, reduce_index: u32) -> PathBuf {
    work_dir.join(format!("mapreduce-out-{}.txt", reduce_index))
}

pub fn final_path(work_dir: &Path) -> PathBuf {
    work_dir.join("mapreduce-out-final.txt")
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), MrError> {
    let tmp_path = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(|e| MrError::io(&tmp_path, e))?;
    file.write_all(contents.as_bytes())
        .await
        .map_err(|e| MrError::io(&tmp_path, e))?;
    file.flush().await.map_err(|e| MrError::io(&tmp_path, e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| MrError::io(path, e))?;
    Ok(())
}

pub async fn write_shard(
    work_dir: &Path,
    map_index: u32,
    reduce_index: u32,
    records: &[KeyValue],
) -> Result<String, MrError> {
    let path = shard_path(work_dir, map_index, reduce_index);
    write_atomic(&path, &codec::encode(records)).await?;
    Ok(path.to_string_lossy().into_owned())
}

pub async fn write_output(
    work_dir: &Path,
    reduce_index: u32,
    records: &[KeyValue],
) -> Result<String, MrError> {
    let path = output_path(work_dir, reduce_index);
    write_atomic(&path, &codec::encode(records)).await?;
    Ok(path.to_string_lossy().into_owned())
}

pub async fn write_final(work_dir: &Path, records: &[KeyValue]) -> Result<String, MrError> {
    let path = final_path(work_dir);
    write_atomic(&path, &codec::encode(records)).await?;
    Ok(path.to_string_lossy().into_owned())
}

pub async fn read_records(path: impl AsRef<Path>) -> Result<Vec<KeyValue>, MrError> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| MrError::io(path, e))?;
    Ok(codec::decode(&contents))
}

pub async fn read_file_contents(path: impl AsRef<Path>) -> Result<String, MrError> {
    let path = path.as_ref();
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| MrError::io(path, e))
}
